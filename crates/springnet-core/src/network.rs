//! `Network`: owns the box, node/bond storage, stress bookkeeping, the
//! break queue, and the tag registry; computes forces, detects breaks, and
//! applies strain.

use crate::bonds::{BondKind, BondStore, BreakRecord, ForceLaw};
use crate::boxgeom::Box2;
use crate::error::Result;
use crate::nodes::NodeStore;
use crate::stress::StressAccumulator;
use crate::tags::TagRegistry;
use crate::vec2::Vec2;
use std::collections::VecDeque;

/// The reference (zero-strain) box geometry, used by area-preserving
/// elongation to compute absolute side lengths from a strain value.
pub type RestBox = Box2;

/// A 2D spring network embedded in a periodic sheared box.
#[derive(Clone, Debug)]
pub struct Network {
    box2: Box2,
    rest_box: RestBox,
    nodes: NodeStore,
    bonds: BondStore,
    stress: StressAccumulator,
    break_queue: VecDeque<BreakRecord>,
    tags: TagRegistry,
    energy: f64,
}

impl Network {
    /// Construct an empty network with the given box. The rest box is a
    /// copy of `box2` at construction time.
    #[must_use]
    pub fn new(box2: Box2) -> Self {
        Self {
            rest_box: box2,
            box2,
            nodes: NodeStore::with_capacity(0),
            bonds: BondStore::with_capacity(0),
            stress: StressAccumulator::new(),
            break_queue: VecDeque::new(),
            tags: TagRegistry::new(),
            energy: 0.0,
        }
    }

    #[must_use]
    pub fn with_capacity(box2: Box2, n_nodes: usize, n_bonds: usize) -> Self {
        Self {
            rest_box: box2,
            box2,
            nodes: NodeStore::with_capacity(n_nodes),
            bonds: BondStore::with_capacity(n_bonds),
            stress: StressAccumulator::new(),
            break_queue: VecDeque::new(),
            tags: TagRegistry::new(),
            energy: 0.0,
        }
    }

    #[inline]
    #[must_use]
    pub fn box2(&self) -> &Box2 {
        &self.box2
    }

    #[inline]
    #[must_use]
    pub fn rest_box(&self) -> &RestBox {
        &self.rest_box
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    #[inline]
    #[must_use]
    pub fn nodes_mut(&mut self) -> &mut NodeStore {
        &mut self.nodes
    }

    #[inline]
    #[must_use]
    pub fn bonds(&self) -> &BondStore {
        &self.bonds
    }

    #[inline]
    #[must_use]
    pub fn bonds_mut(&mut self) -> &mut BondStore {
        &mut self.bonds
    }

    #[inline]
    #[must_use]
    pub fn stress(&self) -> &StressAccumulator {
        &self.stress
    }

    #[inline]
    #[must_use]
    pub fn stress_mut(&mut self) -> &mut StressAccumulator {
        &mut self.stress
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    #[inline]
    #[must_use]
    pub fn tags_mut(&mut self) -> &mut TagRegistry {
        &mut self.tags
    }

    #[inline]
    #[must_use]
    pub fn energy(&self) -> f64 {
        self.energy
    }

    #[inline]
    #[must_use]
    pub fn shear_strain(&self) -> f64 {
        self.box2.shear_strain()
    }

    /// Componentwise `(domain - rest_domain) / rest_domain`.
    #[must_use]
    pub fn elongation_strain(&self) -> Vec2 {
        Vec2::new(
            self.box2.lx() / self.rest_box.lx() - 1.0,
            self.box2.ly() / self.rest_box.ly() - 1.0,
        )
    }

    /// Drain every record queued by the most recent `compute_forces` call,
    /// oldest first.
    pub fn drain_break_queue(&mut self) -> impl Iterator<Item = BreakRecord> + '_ {
        self.break_queue.drain(..)
    }

    #[must_use]
    pub fn pending_breaks(&self) -> usize {
        self.break_queue.len()
    }

    /// Count bonds whose force law is `kind`, matching the original's
    /// `connectedCount(bondType)` query.
    #[must_use]
    pub fn count_connected_of_kind(&self, kind: BondKind) -> usize {
        self.bonds.count_connected_of_kind(kind)
    }

    /// Apply an incremental shear strain: the box tilt updates and every
    /// node position receives the corresponding affine shift
    /// `x <- x + step * y`.
    pub fn shear(&mut self, step: f64) {
        self.box2.shear(step);
        for pos in self.nodes.positions_mut() {
            pos.x += step * pos.y;
        }
    }

    /// Replace the box wholesale, remapping every node position through
    /// the fractional mapping so that `lambda` coordinates are preserved.
    pub fn set_box(&mut self, new_box: Box2) {
        for pos in self.nodes.positions_mut() {
            let lambda = self.box2.x_to_lambda(*pos);
            *pos = new_box.lambda_to_x(lambda);
        }
        self.box2 = new_box;
    }

    /// Area-preserving elongation along y by strain `step`, relative to the
    /// box's current elongation strain.
    pub fn elongate(&mut self, step: f64) -> Result<()> {
        let new_strain = self.elongation_strain().y + step;
        let new_lx = self.rest_box.lx() / (1.0 + new_strain);
        let new_ly = self.rest_box.ly() * (1.0 + new_strain);
        let new_box = Box2::new(new_lx, new_ly, self.box2.xy())?;
        self.set_box(new_box);
        Ok(())
    }

    /// Fold every node position into the principal image.
    pub fn wrap_nodes(&mut self) {
        for pos in self.nodes.positions_mut() {
            *pos = self.box2.wrap(*pos);
        }
    }

    /// Zero energy and forces (and stress, if requested), then for each
    /// bond: detect a break against the *current* laws, queue and replace
    /// on detection, then compute force/energy/stress from the
    /// (possibly just-replaced) laws. A force-evaluation failure aborts the
    /// whole step; it indicates geometric collapse.
    pub fn compute_forces(&mut self, eval_break: bool, zero_stress: bool) -> Result<()> {
        self.energy = 0.0;
        self.nodes.zero_forces();
        if zero_stress {
            self.stress.zero();
        }

        for i in 0..self.bonds.len() {
            let info = self.bonds.infos()[i];
            let pos_src = self.nodes.positions()[info.src];
            let pos_dst = self.nodes.positions()[info.dst];
            let d = self.box2.min_image(pos_src, pos_dst);

            if eval_break {
                let break_law = self.bonds.break_laws()[i];
                if break_law.should_break(d) {
                    let prior_force_law = self.bonds.force_laws()[i];
                    self.break_queue.push_back(BreakRecord {
                        index: info.index,
                        prior_force_law,
                        prior_break_law: break_law,
                    });
                    self.bonds.force_laws_mut()[i] = ForceLaw::Virtual;
                    self.bonds.break_laws_mut()[i] = crate::bonds::BreakLaw::None;
                    let mut tags = self.bonds.tags()[i];
                    tags.set(TagRegistry::broken_mask());
                    self.bonds.tags_mut()[i] = tags;
                    tracing::debug!(bond = info.index, "bond broke");
                }
            }

            let force_law = self.bonds.force_laws()[i];
            if let Some(f) = force_law.force(d)? {
                self.nodes.forces_mut()[info.src] -= f;
                self.nodes.forces_mut()[info.dst] += f;
                let stress = f.outer(d) * self.box2.inv_area();
                self.stress.distribute(stress, self.bonds.tags()[i]);
            }
            if let Some(e) = force_law.energy(d)? {
                self.energy += e;
            }
        }
        Ok(())
    }

    /// Read-only total potential energy, without touching forces/stress/
    /// the break queue.
    pub fn compute_energy(&mut self) -> Result<f64> {
        let mut total = 0.0;
        for info in self.bonds.infos() {
            let pos_src = self.nodes.positions()[info.src];
            let pos_dst = self.nodes.positions()[info.dst];
            let d = self.box2.min_image(pos_src, pos_dst);
            let force_law = self.bonds.force_laws()[info.index];
            if let Some(e) = force_law.energy(d)? {
                total += e;
            }
        }
        self.energy = total;
        Ok(total)
    }

    /// Run only the break-detection pass: queues and replaces any bond
    /// whose extension has crossed its threshold, without touching forces,
    /// energy, or stress.
    pub fn compute_breaks(&mut self) -> Result<()> {
        for i in 0..self.bonds.len() {
            let info = self.bonds.infos()[i];
            let pos_src = self.nodes.positions()[info.src];
            let pos_dst = self.nodes.positions()[info.dst];
            let d = self.box2.min_image(pos_src, pos_dst);
            let break_law = self.bonds.break_laws()[i];
            if break_law.should_break(d) {
                let prior_force_law = self.bonds.force_laws()[i];
                self.break_queue.push_back(BreakRecord {
                    index: info.index,
                    prior_force_law,
                    prior_break_law: break_law,
                });
                self.bonds.force_laws_mut()[i] = ForceLaw::Virtual;
                self.bonds.break_laws_mut()[i] = crate::bonds::BreakLaw::None;
                let mut tags = self.bonds.tags()[i];
                tags.set(TagRegistry::broken_mask());
                self.bonds.tags_mut()[i] = tags;
            }
        }
        Ok(())
    }

    /// Scan every bond, returning the maximum `threshold(d)` across bonds
    /// with a break law, and the count of bonds that would break.
    #[must_use]
    pub fn break_data(&self) -> (f64, usize) {
        let mut max_threshold = f64::NEG_INFINITY;
        let mut broken_count = 0usize;
        for info in self.bonds.infos() {
            let pos_src = self.nodes.positions()[info.src];
            let pos_dst = self.nodes.positions()[info.dst];
            let d = self.box2.min_image(pos_src, pos_dst);
            let break_law = self.bonds.break_laws()[info.index];
            if let Some(t) = break_law.threshold(d) {
                max_threshold = max_threshold.max(t);
                if t > 0.0 {
                    broken_count += 1;
                }
            }
        }
        (max_threshold, broken_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonds::{BreakLaw, ForceLaw};
    use crate::tags::TagSet;

    fn rest_network() -> Network {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::with_capacity(b, 2, 1);
        net.nodes_mut().add_node(0, Vec2::new(4.0, 5.0), Vec2::ZERO, 1.0);
        net.nodes_mut().add_node(1, Vec2::new(6.0, 5.0), Vec2::ZERO, 1.0);
        net.bonds_mut().add_bond(
            0,
            1,
            ForceLaw::harmonic(1.0, 2.0, false),
            BreakLaw::strain_threshold(0.5, 2.0),
            TagSet::EMPTY,
        );
        net
    }

    #[test]
    fn single_bond_at_rest_has_zero_everything() {
        let mut net = rest_network();
        net.compute_forces(true, true).unwrap();
        assert!(net.energy().abs() < 1e-12);
        assert!(net.nodes().forces()[0].norm() < 1e-12);
        assert!(net.nodes().forces()[1].norm() < 1e-12);
        assert_eq!(net.pending_breaks(), 0);
        assert!(net.stress().total().xx.abs() < 1e-12);
    }

    #[test]
    fn stretched_past_threshold_breaks_and_zeroes_next_pass() {
        let mut net = rest_network();
        net.nodes_mut().positions_mut()[1] = Vec2::new(7.01, 5.0);
        net.compute_forces(true, true).unwrap();
        assert_eq!(net.pending_breaks(), 1);
        let record = net.drain_break_queue().next().unwrap();
        assert_eq!(record.index, 0);
        assert!(matches!(
            net.bonds().force_laws()[0],
            ForceLaw::Virtual
        ));

        net.compute_forces(false, true).unwrap();
        assert!(net.energy().abs() < 1e-12);
        assert!(net.nodes().forces()[0].norm() < 1e-12);
    }

    #[test]
    fn newtons_third_law_holds_after_compute_forces() {
        let mut net = rest_network();
        net.nodes_mut().positions_mut()[1] = Vec2::new(6.3, 5.0);
        net.compute_forces(false, true).unwrap();
        let total = net
            .nodes()
            .forces()
            .iter()
            .fold(Vec2::ZERO, |acc, f| acc + *f);
        assert!(total.norm() < 1e-9);
    }

    #[test]
    fn empty_network_stays_zero() {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::new(b);
        net.compute_forces(true, true).unwrap();
        assert_eq!(net.energy(), 0.0);
        assert_eq!(net.stress().total(), crate::vec2::Tensor2::ZERO);
    }

    #[test]
    fn shear_then_negative_shear_restores_positions() {
        let mut net = rest_network();
        let before = net.nodes().positions().to_vec();
        net.shear(0.1);
        net.shear(-0.1);
        for (a, b) in net.nodes().positions().iter().zip(before.iter()) {
            assert!((a.x - b.x).abs() < 1e-12);
            assert!((a.y - b.y).abs() < 1e-12);
        }
    }

    #[test]
    fn set_box_preserves_fractional_coordinates() {
        let mut net = rest_network();
        let lambda_before: Vec<Vec2> = net
            .nodes()
            .positions()
            .iter()
            .map(|&p| net.box2().x_to_lambda(p))
            .collect();
        let new_box = Box2::new(20.0, 10.0, 0.0).unwrap();
        net.set_box(new_box);
        for (p, lambda) in net.nodes().positions().iter().zip(lambda_before.iter()) {
            let back = net.box2().lambda_to_x(*lambda);
            assert!((p.x - back.x).abs() < 1e-9);
            assert!((p.y - back.y).abs() < 1e-9);
        }
    }
}
