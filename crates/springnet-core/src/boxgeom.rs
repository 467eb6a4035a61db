//! Periodic sheared-box geometry and the minimum-image convention.

use crate::error::{Error, Result};
use crate::vec2::Vec2;
use serde::{Deserialize, Serialize};

/// A periodic, shear-capable simulation cell.
///
/// `Lx` and `Ly` are the (positive) side lengths; `xy` is the shear tilt of
/// the upper edge. Derived scalars are recomputed on every mutation so reads
/// never pay for them twice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box2 {
    lx: f64,
    ly: f64,
    xy: f64,
    inv_lx: f64,
    inv_ly: f64,
    inv_xy: f64,
    half_lx: f64,
    half_ly: f64,
    area: f64,
    inv_area: f64,
}

impl Box2 {
    /// Construct a box, validating `lx, ly > 0`.
    pub fn new(lx: f64, ly: f64, xy: f64) -> Result<Self> {
        if !(lx > 0.0) || !(ly > 0.0) {
            return Err(Error::GeometryDegenerate(format!(
                "box sides must be positive, got Lx={lx}, Ly={ly}"
            )));
        }
        let mut b = Self {
            lx,
            ly,
            xy,
            inv_lx: 0.0,
            inv_ly: 0.0,
            inv_xy: 0.0,
            half_lx: 0.0,
            half_ly: 0.0,
            area: 0.0,
            inv_area: 0.0,
        };
        b.recompute_derived();
        Ok(b)
    }

    fn recompute_derived(&mut self) {
        self.inv_lx = 1.0 / self.lx;
        self.inv_ly = 1.0 / self.ly;
        self.inv_xy = -self.xy / (self.lx * self.ly);
        self.half_lx = 0.5 * self.lx;
        self.half_ly = 0.5 * self.ly;
        self.area = self.lx * self.ly;
        self.inv_area = 1.0 / self.area;
    }

    #[inline]
    #[must_use]
    pub fn lx(&self) -> f64 {
        self.lx
    }

    #[inline]
    #[must_use]
    pub fn ly(&self) -> f64 {
        self.ly
    }

    #[inline]
    #[must_use]
    pub fn xy(&self) -> f64 {
        self.xy
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    #[inline]
    #[must_use]
    pub fn inv_area(&self) -> f64 {
        self.inv_area
    }

    #[inline]
    #[must_use]
    pub fn shear_strain(&self) -> f64 {
        self.xy / self.ly
    }

    pub fn set_lx(&mut self, lx: f64) -> Result<()> {
        if !(lx > 0.0) {
            return Err(Error::GeometryDegenerate(format!("invalid Lx={lx}")));
        }
        self.lx = lx;
        self.recompute_derived();
        Ok(())
    }

    pub fn set_ly(&mut self, ly: f64) -> Result<()> {
        if !(ly > 0.0) {
            return Err(Error::GeometryDegenerate(format!("invalid Ly={ly}")));
        }
        self.ly = ly;
        self.recompute_derived();
        Ok(())
    }

    pub fn set_xy(&mut self, xy: f64) {
        self.xy = xy;
        self.recompute_derived();
    }

    /// Apply an incremental shear `xy += step * Ly`.
    pub fn shear(&mut self, step: f64) {
        self.set_xy(self.xy + step * self.ly);
    }

    /// Fractional-to-Cartesian mapping.
    #[inline]
    #[must_use]
    pub fn lambda_to_x(&self, lambda: Vec2) -> Vec2 {
        Vec2::new(
            self.lx * lambda.x + self.xy * lambda.y,
            self.ly * lambda.y,
        )
    }

    /// Cartesian-to-fractional mapping.
    #[inline]
    #[must_use]
    pub fn x_to_lambda(&self, x: Vec2) -> Vec2 {
        Vec2::new(
            self.inv_lx * x.x + self.inv_xy * x.y,
            self.inv_ly * x.y,
        )
    }

    /// Fold a position into the principal `[0, 1) x [0, 1)` fractional image.
    #[must_use]
    pub fn wrap(&self, x: Vec2) -> Vec2 {
        let mut lambda = self.x_to_lambda(x);
        while lambda.x >= 1.0 {
            lambda.x -= 1.0;
        }
        while lambda.x < 0.0 {
            lambda.x += 1.0;
        }
        while lambda.y >= 1.0 {
            lambda.y -= 1.0;
        }
        while lambda.y < 0.0 {
            lambda.y += 1.0;
        }
        self.lambda_to_x(lambda)
    }

    /// Minimum-image displacement `p2 - p1`, folded through periodic
    /// replicas of a tilted box: `y` is folded first (dragging `x` by the
    /// tilt), then `x`.
    #[must_use]
    pub fn min_image(&self, p1: Vec2, p2: Vec2) -> Vec2 {
        let mut d = p2 - p1;
        while d.y.abs() > self.half_ly {
            if d.y > 0.0 {
                d.y -= self.ly;
                d.x -= self.xy;
            } else {
                d.y += self.ly;
                d.x += self.xy;
            }
        }
        while d.x.abs() > self.half_lx {
            if d.x > 0.0 {
                d.x -= self.lx;
            } else {
                d.x += self.lx;
            }
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_nonpositive_sides() {
        assert!(Box2::new(0.0, 1.0, 0.0).is_err());
        assert!(Box2::new(1.0, -1.0, 0.0).is_err());
    }

    #[test]
    fn lambda_round_trip() {
        let b = Box2::new(10.0, 8.0, 1.3).unwrap();
        let p = Vec2::new(4.2, -1.7);
        let lambda = b.x_to_lambda(p);
        let back = b.lambda_to_x(lambda);
        assert!((back.x - p.x).abs() < 1e-12);
        assert!((back.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn wrap_is_idempotent_and_in_principal_image() {
        let b = Box2::new(10.0, 8.0, 1.3).unwrap();
        let p = Vec2::new(23.5, -17.2);
        let w1 = b.wrap(p);
        let lambda = b.x_to_lambda(w1);
        assert!((-1e-9..1.0 + 1e-9).contains(&lambda.x));
        assert!((-1e-9..1.0 + 1e-9).contains(&lambda.y));
        let w2 = b.wrap(w1);
        assert!((w1.x - w2.x).abs() < 1e-9);
        assert!((w1.y - w2.y).abs() < 1e-9);
    }

    #[test]
    fn min_image_is_antisymmetric() {
        let b = Box2::new(10.0, 8.0, 2.0).unwrap();
        let p = Vec2::new(1.0, 1.0);
        let q = Vec2::new(9.5, 7.5);
        let d_pq = b.min_image(p, q);
        let d_qp = b.min_image(q, p);
        assert!((d_pq.x + d_qp.x).abs() < 1e-9);
        assert!((d_pq.y + d_qp.y).abs() < 1e-9);
    }

    #[test]
    fn shear_then_negative_shear_restores_xy() {
        let mut b = Box2::new(10.0, 8.0, 0.0).unwrap();
        let before = b.xy();
        b.shear(0.05);
        b.shear(-0.05);
        assert!((b.xy() - before).abs() < 1e-12);
    }

    proptest::proptest! {
        #[test]
        fn lambda_round_trip_holds_for_any_point(
            lx in 0.1f64..50.0,
            ly in 0.1f64..50.0,
            xy in -20.0f64..20.0,
            px in -200.0f64..200.0,
            py in -200.0f64..200.0,
        ) {
            let b = Box2::new(lx, ly, xy).unwrap();
            let p = Vec2::new(px, py);
            let back = b.lambda_to_x(b.x_to_lambda(p));
            prop_assert!((back.x - p.x).abs() < 1e-6);
            prop_assert!((back.y - p.y).abs() < 1e-6);
        }

        #[test]
        fn wrap_always_lands_in_principal_image(
            lx in 0.1f64..50.0,
            ly in 0.1f64..50.0,
            xy in -20.0f64..20.0,
            px in -500.0f64..500.0,
            py in -500.0f64..500.0,
        ) {
            let b = Box2::new(lx, ly, xy).unwrap();
            let p = Vec2::new(px, py);
            let w = b.wrap(p);
            let lambda = b.x_to_lambda(w);
            prop_assert!((-1e-6..1.0 + 1e-6).contains(&lambda.x));
            prop_assert!((-1e-6..1.0 + 1e-6).contains(&lambda.y));
        }

        #[test]
        fn min_image_never_exceeds_half_the_box(
            lx in 1.0f64..50.0,
            ly in 1.0f64..50.0,
            xy in -5.0f64..5.0,
            p1x in -500.0f64..500.0,
            p1y in -500.0f64..500.0,
            p2x in -500.0f64..500.0,
            p2y in -500.0f64..500.0,
        ) {
            let b = Box2::new(lx, ly, xy).unwrap();
            let d = b.min_image(Vec2::new(p1x, p1y), Vec2::new(p2x, p2y));
            prop_assert!(d.y.abs() <= 0.5 * ly + 1e-6);
        }
    }
}
