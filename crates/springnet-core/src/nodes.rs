//! Structure-of-arrays storage for nodes.

use crate::error::{Error, Result};
use crate::vec2::Vec2;
use std::collections::HashMap;

/// A dense, reorderable index into the node arrays.
pub type LocalIndex = usize;

/// Structure-of-arrays node storage: position, velocity, force, mass, and a
/// stable external id, indexed by a dense local index that the partitioner
/// may permute.
#[derive(Clone, Debug, Default)]
pub struct NodeStore {
    ids: Vec<u64>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    forces: Vec<Vec2>,
    masses: Vec<f64>,
    id_to_local: Option<HashMap<u64, LocalIndex>>,
}

impl NodeStore {
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ids: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
            velocities: Vec::with_capacity(n),
            forces: Vec::with_capacity(n),
            masses: Vec::with_capacity(n),
            id_to_local: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add a node, returning its freshly minted local index. `id` defaults
    /// to the local index at insertion time when the caller has no external
    /// identifier to preserve.
    pub fn add_node(&mut self, id: u64, position: Vec2, velocity: Vec2, mass: f64) -> LocalIndex {
        let idx = self.ids.len();
        self.ids.push(id);
        self.positions.push(position);
        self.velocities.push(velocity);
        self.forces.push(Vec2::ZERO);
        self.masses.push(mass);
        self.id_to_local = None;
        idx
    }

    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    #[inline]
    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    #[inline]
    #[must_use]
    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    #[inline]
    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    #[inline]
    #[must_use]
    pub fn forces(&self) -> &[Vec2] {
        &self.forces
    }

    #[inline]
    #[must_use]
    pub fn forces_mut(&mut self) -> &mut [Vec2] {
        &mut self.forces
    }

    #[inline]
    #[must_use]
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn zero_forces(&mut self) {
        self.forces.iter_mut().for_each(|f| *f = Vec2::ZERO);
    }

    pub fn zero_velocities(&mut self) {
        self.velocities.iter_mut().for_each(|v| *v = Vec2::ZERO);
    }

    /// Build (or reuse) a stable-id -> local-index lookup table.
    pub fn local_index_of(&mut self, id: u64) -> Result<LocalIndex> {
        if self.id_to_local.is_none() {
            let map = self
                .ids
                .iter()
                .enumerate()
                .map(|(i, &id)| (id, i))
                .collect();
            self.id_to_local = Some(map);
        }
        self.id_to_local
            .as_ref()
            .and_then(|m| m.get(&id).copied())
            .ok_or_else(|| Error::InvalidInput(format!("unknown node id {id}")))
    }

    /// Jointly permute every array by `key(i)`, stable-sorted ascending.
    /// Returns the permutation applied (`perm[new_index] = old_index`), so
    /// callers (e.g. the bond store) can remap endpoints.
    pub fn reorder<F, K>(&mut self, mut key: F) -> Vec<LocalIndex>
    where
        F: FnMut(LocalIndex) -> K,
        K: Ord,
    {
        let n = self.len();
        let mut perm: Vec<LocalIndex> = (0..n).collect();
        perm.sort_by_key(|&i| key(i));

        self.ids = perm.iter().map(|&i| self.ids[i]).collect();
        self.positions = perm.iter().map(|&i| self.positions[i]).collect();
        self.velocities = perm.iter().map(|&i| self.velocities[i]).collect();
        self.forces = perm.iter().map(|&i| self.forces[i]).collect();
        self.masses = perm.iter().map(|&i| self.masses[i]).collect();
        self.id_to_local = None;
        perm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_returns_dense_indices() {
        let mut ns = NodeStore::with_capacity(2);
        let a = ns.add_node(10, Vec2::new(0.0, 0.0), Vec2::ZERO, 1.0);
        let b = ns.add_node(11, Vec2::new(1.0, 0.0), Vec2::ZERO, 1.0);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn local_index_of_resolves_stable_id() {
        let mut ns = NodeStore::with_capacity(2);
        ns.add_node(42, Vec2::ZERO, Vec2::ZERO, 1.0);
        ns.add_node(7, Vec2::ZERO, Vec2::ZERO, 1.0);
        assert_eq!(ns.local_index_of(7).unwrap(), 1);
        assert!(ns.local_index_of(999).is_err());
    }

    #[test]
    fn reorder_permutes_all_arrays_together() {
        let mut ns = NodeStore::with_capacity(3);
        ns.add_node(0, Vec2::new(2.0, 0.0), Vec2::ZERO, 1.0);
        ns.add_node(1, Vec2::new(0.0, 0.0), Vec2::ZERO, 2.0);
        ns.add_node(2, Vec2::new(1.0, 0.0), Vec2::ZERO, 3.0);
        let positions = ns.positions().to_vec();
        let perm = ns.reorder(|i| (positions[i].x * 1000.0) as i64);
        assert_eq!(perm, vec![1, 2, 0]);
        assert_eq!(ns.masses(), &[2.0, 3.0, 1.0]);
        assert_eq!(ns.ids(), &[1, 2, 0]);
    }

    #[test]
    fn zero_forces_and_velocities() {
        let mut ns = NodeStore::with_capacity(1);
        ns.add_node(0, Vec2::ZERO, Vec2::new(1.0, 1.0), 1.0);
        ns.forces_mut()[0] = Vec2::new(5.0, 5.0);
        ns.zero_forces();
        ns.zero_velocities();
        assert_eq!(ns.forces()[0], Vec2::ZERO);
        assert_eq!(ns.velocities()[0], Vec2::ZERO);
    }
}
