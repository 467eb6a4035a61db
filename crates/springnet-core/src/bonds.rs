//! Sum-typed force/break laws and structure-of-arrays bond storage.

use crate::error::{Error, Result};
use crate::nodes::LocalIndex;
use crate::tags::TagSet;
use crate::vec2::Vec2;
use serde::{Deserialize, Serialize};

/// Bonds shorter than this (in minimum-image distance) cannot be evaluated
/// as a harmonic spring: the direction `d/r` becomes numerically unstable.
pub const LENGTH_FLOOR: f64 = 1e-12;

/// The force law carried by a bond. Closed at compile time: dispatch is a
/// tagged match, never a virtual call, and adding a variant never
/// allocates per bond.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ForceLaw {
    /// Produces no force and no energy. The placeholder left behind once a
    /// bond breaks.
    Virtual,
    /// `F = -k (r - r0) / r * d`, `E = 1/2 k (r - r0)^2`.
    ///
    /// When constructed with `normalized = true`, the stiffness actually
    /// used in the formulas above is `k / r0`; [`ForceLaw::k`] still reports
    /// the caller-supplied, unscaled `k`.
    Harmonic {
        k_eff: f64,
        r0: f64,
        normalized: bool,
    },
}

impl ForceLaw {
    /// Construct a harmonic law. `k` is the caller-facing stiffness; when
    /// `normalized`, the internal stiffness is `k / r0`.
    #[must_use]
    pub fn harmonic(k: f64, r0: f64, normalized: bool) -> Self {
        let k_eff = if normalized { k / r0 } else { k };
        Self::Harmonic {
            k_eff,
            r0,
            normalized,
        }
    }

    /// The caller-facing stiffness (unscaled, even if `normalized`).
    #[must_use]
    pub fn k(&self) -> Option<f64> {
        match *self {
            Self::Virtual => None,
            Self::Harmonic {
                k_eff,
                r0,
                normalized,
            } => Some(if normalized { k_eff * r0 } else { k_eff }),
        }
    }

    #[must_use]
    pub fn r0(&self) -> Option<f64> {
        match *self {
            Self::Virtual => None,
            Self::Harmonic { r0, .. } => Some(r0),
        }
    }

    /// Force on the `dst` endpoint (pointing along `d = pos[dst] - pos[src]`).
    /// `None` for `Virtual`. Fails if `r` is below [`LENGTH_FLOOR`].
    pub fn force(&self, d: Vec2) -> Result<Option<Vec2>> {
        match *self {
            Self::Virtual => Ok(None),
            Self::Harmonic { k_eff, r0, .. } => {
                let r = d.norm();
                if r < LENGTH_FLOOR {
                    return Err(Error::GeometryDegenerate(format!(
                        "bond length {r} below floor {LENGTH_FLOOR}"
                    )));
                }
                Ok(Some(d * (-k_eff * (r - r0) / r)))
            }
        }
    }

    /// Potential energy of the bond at distance vector `d`. `None` for
    /// `Virtual`.
    pub fn energy(&self, d: Vec2) -> Result<Option<f64>> {
        match *self {
            Self::Virtual => Ok(None),
            Self::Harmonic { k_eff, r0, .. } => {
                let r = d.norm();
                if r < LENGTH_FLOOR {
                    return Err(Error::GeometryDegenerate(format!(
                        "bond length {r} below floor {LENGTH_FLOOR}"
                    )));
                }
                Ok(Some(0.5 * k_eff * (r - r0) * (r - r0)))
            }
        }
    }

    /// Diagnostic scalar (signed extension `s(d) = |d|/r0 - 1`).
    #[must_use]
    pub fn data(&self, d: Vec2) -> Option<f64> {
        match *self {
            Self::Virtual => None,
            Self::Harmonic { r0, .. } => Some(d.norm() / r0 - 1.0),
        }
    }

    /// The coarse kind this law belongs to, for grouping and reporting.
    #[must_use]
    pub fn kind(&self) -> BondKind {
        match self {
            Self::Virtual => BondKind::Virtual,
            Self::Harmonic { .. } => BondKind::Harmonic,
        }
    }
}

/// Coarse classification of a bond's force law, matching the original's
/// `bondType`-style grouping but keyed on force-law variant rather than tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondKind {
    /// Not currently load-bearing: broken, or never connected.
    Virtual,
    /// A harmonic spring.
    Harmonic,
}

impl BondKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Virtual => "Virtual",
            Self::Harmonic => "Harmonic",
        }
    }
}

/// The break law carried by a bond.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BreakLaw {
    /// The bond never breaks.
    None,
    /// Breaks once the extensional strain `s(d) = |d|/r0 - 1` exceeds
    /// `lambda`.
    StrainThreshold { lambda: f64, r0: f64 },
}

impl BreakLaw {
    #[must_use]
    pub fn strain_threshold(lambda: f64, r0: f64) -> Self {
        Self::StrainThreshold { lambda, r0 }
    }

    /// Signed distance above the break boundary; positive means broken.
    /// `None` when the law never breaks.
    #[must_use]
    pub fn threshold(&self, d: Vec2) -> Option<f64> {
        match *self {
            Self::None => None,
            Self::StrainThreshold { lambda, r0 } => Some(d.norm() / r0 - 1.0 - lambda),
        }
    }

    /// Strictly greater than zero, not equal: the boundary itself has not
    /// broken yet.
    #[must_use]
    pub fn should_break(&self, d: Vec2) -> bool {
        self.threshold(d).is_some_and(|t| t > 0.0)
    }

    #[must_use]
    pub fn data(&self, d: Vec2) -> Option<f64> {
        match *self {
            Self::None => None,
            Self::StrainThreshold { r0, .. } => Some(d.norm() / r0 - 1.0),
        }
    }
}

/// Endpoints and stable position of one bond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondInfo {
    pub src: LocalIndex,
    pub dst: LocalIndex,
    pub index: usize,
}

/// A record of a bond removed from service during force/break evaluation,
/// carrying enough state for the protocol to emit an event.
#[derive(Clone, Copy, Debug)]
pub struct BreakRecord {
    pub index: usize,
    pub prior_force_law: ForceLaw,
    pub prior_break_law: BreakLaw,
}

/// Structure-of-arrays bond storage.
#[derive(Clone, Debug, Default)]
pub struct BondStore {
    infos: Vec<BondInfo>,
    force_laws: Vec<ForceLaw>,
    break_laws: Vec<BreakLaw>,
    tags: Vec<TagSet>,
}

impl BondStore {
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            infos: Vec::with_capacity(n),
            force_laws: Vec::with_capacity(n),
            break_laws: Vec::with_capacity(n),
            tags: Vec::with_capacity(n),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn add_bond(
        &mut self,
        src: LocalIndex,
        dst: LocalIndex,
        force_law: ForceLaw,
        break_law: BreakLaw,
        tags: TagSet,
    ) -> usize {
        let index = self.infos.len();
        self.infos.push(BondInfo { src, dst, index });
        self.force_laws.push(force_law);
        self.break_laws.push(break_law);
        self.tags.push(tags);
        index
    }

    #[inline]
    #[must_use]
    pub fn infos(&self) -> &[BondInfo] {
        &self.infos
    }

    #[inline]
    #[must_use]
    pub fn force_laws(&self) -> &[ForceLaw] {
        &self.force_laws
    }

    #[inline]
    #[must_use]
    pub fn force_laws_mut(&mut self) -> &mut [ForceLaw] {
        &mut self.force_laws
    }

    #[inline]
    #[must_use]
    pub fn break_laws(&self) -> &[BreakLaw] {
        &self.break_laws
    }

    #[inline]
    #[must_use]
    pub fn break_laws_mut(&mut self) -> &mut [BreakLaw] {
        &mut self.break_laws
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[TagSet] {
        &self.tags
    }

    #[inline]
    #[must_use]
    pub fn tags_mut(&mut self) -> &mut [TagSet] {
        &mut self.tags
    }

    /// Remap every endpoint through `old_to_new[old_local_index]`.
    pub fn remap_endpoints(&mut self, old_to_new: &[LocalIndex]) {
        for info in &mut self.infos {
            info.src = old_to_new[info.src];
            info.dst = old_to_new[info.dst];
        }
    }

    /// Ensure `src <= dst` for every bond; the unordered pair is the
    /// semantic identity, so swapping endpoints is always safe.
    pub fn canonicalise_endpoints(&mut self) {
        for info in &mut self.infos {
            if info.src > info.dst {
                std::mem::swap(&mut info.src, &mut info.dst);
            }
        }
    }

    /// Jointly permute every per-bond array by `key(i)`, stable-sorted.
    /// `BondInfo.index` is rewritten to match the new position.
    pub fn reorder<F, K>(&mut self, mut key: F)
    where
        F: FnMut(usize) -> K,
        K: Ord,
    {
        let n = self.len();
        let mut perm: Vec<usize> = (0..n).collect();
        perm.sort_by_key(|&i| key(i));

        self.infos = perm
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| BondInfo {
                index: new_idx,
                ..self.infos[old_idx]
            })
            .collect();
        self.force_laws = perm.iter().map(|&i| self.force_laws[i]).collect();
        self.break_laws = perm.iter().map(|&i| self.break_laws[i]).collect();
        self.tags = perm.iter().map(|&i| self.tags[i]).collect();
    }

    /// Count bonds whose force law is not `Virtual`.
    #[must_use]
    pub fn count_connected(&self) -> usize {
        self.force_laws
            .iter()
            .filter(|l| !matches!(l, ForceLaw::Virtual))
            .count()
    }

    /// Count bonds tagged with every bit in `tags` and not `Virtual`.
    #[must_use]
    pub fn count_connected_with_tag(&self, tag: TagSet) -> usize {
        self.force_laws
            .iter()
            .zip(&self.tags)
            .filter(|(l, t)| !matches!(l, ForceLaw::Virtual) && t.has(tag))
            .count()
    }

    /// Count bonds whose force law is `kind`, matching the original's
    /// `connectedCount(bondType)` grouping by force-law variant.
    #[must_use]
    pub fn count_connected_of_kind(&self, kind: BondKind) -> usize {
        self.force_laws.iter().filter(|l| l.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmonic_at_rest_has_zero_force_and_energy() {
        let law = ForceLaw::harmonic(1.0, 2.0, false);
        let d = Vec2::new(2.0, 0.0);
        let f = law.force(d).unwrap().unwrap();
        assert!(f.norm() < 1e-12);
        assert!(law.energy(d).unwrap().unwrap().abs() < 1e-12);
    }

    #[test]
    fn normalized_k_reports_unscaled_value() {
        let law = ForceLaw::harmonic(4.0, 2.0, true);
        assert!((law.k().unwrap() - 4.0).abs() < 1e-12);
        // internal stiffness used for force is k/r0 = 2.0
        let d = Vec2::new(3.0, 0.0);
        let f = law.force(d).unwrap().unwrap();
        // F = -(k/r0)*(r-r0)/r * d = -2*(1)/3*(3,0) = (-2, 0)
        assert!((f.x + 2.0).abs() < 1e-9);
    }

    #[test]
    fn strain_threshold_break_boundary_is_strict() {
        let law = BreakLaw::strain_threshold(0.5, 2.0);
        let at_boundary = Vec2::new(3.0, 0.0); // r = r0*(1+lambda)
        assert!(!law.should_break(at_boundary));
        let just_over = Vec2::new(3.0001, 0.0);
        assert!(law.should_break(just_over));
    }

    #[test]
    fn force_fails_below_length_floor() {
        let law = ForceLaw::harmonic(1.0, 2.0, false);
        assert!(law.force(Vec2::ZERO).is_err());
    }

    #[test]
    fn count_connected_of_kind_groups_by_force_law() {
        let mut bs = BondStore::with_capacity(2);
        bs.add_bond(
            0,
            1,
            ForceLaw::harmonic(1.0, 2.0, false),
            BreakLaw::None,
            TagSet::EMPTY,
        );
        bs.add_bond(1, 2, ForceLaw::Virtual, BreakLaw::None, TagSet::EMPTY);
        assert_eq!(bs.count_connected_of_kind(BondKind::Harmonic), 1);
        assert_eq!(bs.count_connected_of_kind(BondKind::Virtual), 1);
        assert_eq!(bs.count_connected(), 1);
    }

    #[test]
    fn reorder_renumbers_index_field() {
        let mut bs = BondStore::with_capacity(2);
        bs.add_bond(0, 1, ForceLaw::Virtual, BreakLaw::None, TagSet::EMPTY);
        bs.add_bond(1, 2, ForceLaw::Virtual, BreakLaw::None, TagSet::EMPTY);
        bs.reorder(|i| std::cmp::Reverse(i));
        assert_eq!(bs.infos()[0].index, 0);
        assert_eq!(bs.infos()[0].src, 1);
        assert_eq!(bs.infos()[1].index, 1);
        assert_eq!(bs.infos()[1].src, 0);
    }

    #[test]
    fn canonicalise_sorts_endpoints() {
        let mut bs = BondStore::with_capacity(1);
        bs.add_bond(5, 2, ForceLaw::Virtual, BreakLaw::None, TagSet::EMPTY);
        bs.canonicalise_endpoints();
        assert_eq!(bs.infos()[0].src, 2);
        assert_eq!(bs.infos()[0].dst, 5);
    }
}
