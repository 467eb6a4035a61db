//! The "BinV2" binary network format: little-endian, native-width scalars,
//! no framing beyond a flat sequence of counts, scalars, and records.

use springnet_core::{
    BondStore, Box2, BreakLaw, Error, ForceLaw, Network, Result, TagSet, Vec2,
};
use std::io::{Read, Write};

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

/// Load a [`Network`] from a BinV2 stream (spec §6).
pub fn load<R: Read>(mut r: R) -> Result<Network> {
    let n = read_u64(&mut r)? as usize;
    let b = read_u64(&mut r)? as usize;
    let lx = read_f64(&mut r)?;
    let ly = read_f64(&mut r)?;
    let shear_strain = read_f64(&mut r)?;
    let xy = shear_strain * ly;
    let box2 = Box2::new(lx, ly, xy)?;

    let mut net = Network::with_capacity(box2, n, b);
    for id in 0..n {
        let x = read_f64(&mut r)?;
        let y = read_f64(&mut r)?;
        net.nodes_mut()
            .add_node(id as u64, Vec2::new(x, y), Vec2::ZERO, 1.0);
    }

    let matrix = net.tags_mut().add("matrix")?;
    let sacrificial = net.tags_mut().add("sacrificial")?;
    net.stress_mut().init(matrix.union(sacrificial));

    for _ in 0..b {
        let src = read_u64(&mut r)? as usize;
        let dst = read_u64(&mut r)? as usize;
        let connected = read_u8(&mut r)?;
        let is_matrix = read_u8(&mut r)?;
        let r0 = read_f64(&mut r)?;
        let k = read_f64(&mut r)?;
        let lambda = read_f64(&mut r)?;

        if src >= n || dst >= n {
            return Err(Error::InvalidInput(format!(
                "bond endpoint out of range: src={src}, dst={dst}, N={n}"
            )));
        }

        let (force_law, break_law) = if connected != 0 {
            (
                ForceLaw::harmonic(k, r0, true),
                BreakLaw::strain_threshold(lambda, r0),
            )
        } else {
            (ForceLaw::Virtual, BreakLaw::None)
        };
        let tag = if is_matrix != 0 { matrix } else { sacrificial };
        net.bonds_mut().add_bond(src, dst, force_law, break_law, tag);
    }

    Ok(net)
}

/// Serialise a [`Network`] to a BinV2 stream, inverse of [`load`].
pub fn save<W: Write>(net: &Network, mut w: W) -> Result<()> {
    let n = net.nodes().len();
    let b = net.bonds().len();
    write_u64(&mut w, n as u64)?;
    write_u64(&mut w, b as u64)?;
    write_f64(&mut w, net.box2().lx())?;
    write_f64(&mut w, net.box2().ly())?;
    write_f64(&mut w, net.shear_strain())?;

    for pos in net.nodes().positions() {
        write_f64(&mut w, pos.x)?;
        write_f64(&mut w, pos.y)?;
    }

    let matrix = net.tags().get_mask("matrix").unwrap_or(TagSet::EMPTY);

    for (i, info) in net.bonds().infos().iter().enumerate() {
        write_u64(&mut w, info.src as u64)?;
        write_u64(&mut w, info.dst as u64)?;
        let connected = !matches!(net.bonds().force_laws()[i], ForceLaw::Virtual);
        write_u8(&mut w, u8::from(connected))?;
        let is_matrix = net.bonds().tags()[i].has(matrix);
        write_u8(&mut w, u8::from(is_matrix))?;
        let r0 = net.bonds().force_laws()[i].r0().unwrap_or(0.0);
        let k = net.bonds().force_laws()[i].k().unwrap_or(0.0);
        let lambda = match net.bonds().break_laws()[i] {
            BreakLaw::StrainThreshold { lambda, .. } => lambda,
            BreakLaw::None => 0.0,
        };
        write_f64(&mut w, r0)?;
        write_f64(&mut w, k)?;
        write_f64(&mut w, lambda)?;
    }
    Ok(())
}

/// Count bonds by connectivity, used by tests and by the CLI's `inspect`
/// path. Exposed separately so callers don't need a full [`BondStore`]
/// import just to sanity-check a loaded file.
#[must_use]
pub fn connected_bond_count(bonds: &BondStore) -> usize {
    bonds.count_connected()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_net() -> Network {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::with_capacity(b, 2, 1);
        net.nodes_mut().add_node(0, Vec2::new(1.0, 1.0), Vec2::ZERO, 1.0);
        net.nodes_mut().add_node(1, Vec2::new(3.0, 1.0), Vec2::ZERO, 1.0);
        let matrix = net.tags_mut().add("matrix").unwrap();
        let sacrificial = net.tags_mut().add("sacrificial").unwrap();
        net.stress_mut().init(matrix.union(sacrificial));
        net.bonds_mut().add_bond(
            0,
            1,
            ForceLaw::harmonic(1.0, 2.0, true),
            BreakLaw::strain_threshold(0.2, 2.0),
            matrix,
        );
        net
    }

    #[test]
    fn round_trips_through_bytes() {
        let net = sample_net();
        let mut buf = Vec::new();
        save(&net, &mut buf).unwrap();
        let loaded = load(Cursor::new(buf)).unwrap();
        assert_eq!(loaded.nodes().len(), net.nodes().len());
        assert_eq!(loaded.bonds().len(), net.bonds().len());
        assert!((loaded.box2().lx() - net.box2().lx()).abs() < 1e-12);
        assert_eq!(
            loaded.bonds().force_laws()[0].r0(),
            net.bonds().force_laws()[0].r0()
        );
    }

    #[test]
    fn rejects_out_of_range_endpoint() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 1).unwrap(); // N
        write_u64(&mut buf, 1).unwrap(); // B
        write_f64(&mut buf, 10.0).unwrap(); // Lx
        write_f64(&mut buf, 10.0).unwrap(); // Ly
        write_f64(&mut buf, 0.0).unwrap(); // shear_strain
        write_f64(&mut buf, 0.0).unwrap(); // node0.x
        write_f64(&mut buf, 0.0).unwrap(); // node0.y
        write_u64(&mut buf, 0).unwrap(); // bond.src (valid)
        write_u64(&mut buf, 5).unwrap(); // bond.dst (out of range, N=1)
        write_u8(&mut buf, 1).unwrap(); // connected
        write_u8(&mut buf, 1).unwrap(); // is_matrix
        write_f64(&mut buf, 1.0).unwrap(); // r0
        write_f64(&mut buf, 1.0).unwrap(); // k
        write_f64(&mut buf, 0.1).unwrap(); // lambda
        let err = load(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
