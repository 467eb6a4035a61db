//! Synthetic triangular-lattice network generator, used by tests and by the
//! CLI's `generate` subcommand when no BinV2 file is supplied.

use rand::{rngs::StdRng, Rng as _, SeedableRng};
use springnet_core::{BondStore, BreakLaw, Box2, ForceLaw, Network, TagSet, Vec2};

/// Build an `nx`-by-`ny` triangular lattice of unit cells `cell_w` wide and
/// `cell_h` tall, with nearest-neighbour harmonic bonds at their rest
/// length. A `dilution` fraction of bonds (seeded by `seed`) is tagged
/// `sacrificial` and given a strain-break threshold of `0.1`; the rest are
/// tagged `matrix` and never break.
#[must_use]
pub fn generate_triangular_lattice(
    nx: usize,
    ny: usize,
    cell_w: f64,
    cell_h: f64,
    dilution: f64,
    seed: u64,
) -> Network {
    let lx = cell_w * nx as f64;
    let ly = cell_h * ny as f64;
    let box2 = Box2::new(lx, ly, 0.0).expect("generator: lattice extents must be positive");

    let n_nodes = nx * ny;
    let mut net = Network::with_capacity(box2, n_nodes, n_nodes * 3);

    let index_of = |ix: usize, iy: usize| -> usize { iy * nx + ix };
    for iy in 0..ny {
        for ix in 0..nx {
            let row_shift = if iy % 2 == 1 { 0.5 * cell_w } else { 0.0 };
            let x = ix as f64 * cell_w + row_shift;
            let y = iy as f64 * cell_h;
            let id = index_of(ix, iy) as u64;
            net.nodes_mut()
                .add_node(id, Vec2::new(x, y), Vec2::ZERO, 1.0);
        }
    }

    let matrix = net.tags_mut().add("matrix").expect("tag table has room");
    let sacrificial = net
        .tags_mut()
        .add("sacrificial")
        .expect("tag table has room");
    net.stress_mut().init(matrix.union(sacrificial));

    let mut rng = StdRng::seed_from_u64(seed);
    let neighbour_offsets: [(isize, isize); 3] = [(1, 0), (0, 1), (-1, 1)];

    for iy in 0..ny {
        for ix in 0..nx {
            let src = index_of(ix, iy);
            for &(dx, dy) in &neighbour_offsets {
                let jx = ix as isize + dx;
                let jy = iy as isize + dy;
                if jy < 0 || jy as usize >= ny {
                    continue;
                }
                let jx = jx.rem_euclid(nx as isize) as usize;
                let jy = jy as usize;
                let dst = index_of(jx, jy);
                if dst == src {
                    continue;
                }

                let pos_src = net.nodes().positions()[src];
                let pos_dst = net.nodes().positions()[dst];
                let d = net.box2().min_image(pos_src, pos_dst);
                let r0 = d.norm();

                let sacrifice = rng.random_bool(dilution);
                let (force_law, break_law, tag) = if sacrifice {
                    (
                        ForceLaw::harmonic(1.0, r0, true),
                        BreakLaw::strain_threshold(0.1, r0),
                        sacrificial,
                    )
                } else {
                    (
                        ForceLaw::harmonic(1.0, r0, true),
                        BreakLaw::None,
                        matrix,
                    )
                };
                net.bonds_mut().add_bond(src, dst, force_law, break_law, tag);
            }
        }
    }

    net
}

/// Count bonds carrying each tag, used by tests to sanity-check dilution.
#[must_use]
pub fn tag_counts(bonds: &BondStore, tags: &[TagSet]) -> Vec<usize> {
    tags.iter()
        .map(|&t| bonds.count_connected_with_tag(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_has_expected_node_count() {
        let net = generate_triangular_lattice(4, 4, 1.0, 1.0, 0.2, 1);
        assert_eq!(net.nodes().len(), 16);
    }

    #[test]
    fn generation_is_deterministic_given_seed() {
        let a = generate_triangular_lattice(5, 5, 1.0, 1.0, 0.3, 99);
        let b = generate_triangular_lattice(5, 5, 1.0, 1.0, 0.3, 99);
        assert_eq!(a.bonds().len(), b.bonds().len());
        for (la, lb) in a
            .bonds()
            .break_laws()
            .iter()
            .zip(b.bonds().break_laws().iter())
        {
            assert_eq!(la, lb);
        }
    }

    #[test]
    fn all_bonds_start_at_rest_length() {
        let net = generate_triangular_lattice(6, 6, 1.2, 0.9, 0.15, 3);
        for info in net.bonds().infos() {
            let pos_src = net.nodes().positions()[info.src];
            let pos_dst = net.nodes().positions()[info.dst];
            let d = net.box2().min_image(pos_src, pos_dst);
            let r0 = net.bonds().force_laws()[info.index].r0().unwrap();
            assert!((d.norm() - r0).abs() < 1e-9);
        }
    }
}
