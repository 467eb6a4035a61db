//! ITP (Interpolate-Truncate-Project) bracketed root solver.
//!
//! See Oliveira & Takahashi, "An Enhanced Bisection Algorithm" (2020). The
//! caller maintains the sign invariant on `f`: `f(a) < 0 <= f(b)`.

use springnet_core::{Error, Result};

/// Tuning constants for one bracket.
#[derive(Clone, Copy, Debug)]
pub struct ItpParams {
    pub n0: usize,
    pub k1_scale: f64,
    pub k2: f64,
}

impl Default for ItpParams {
    fn default() -> Self {
        Self {
            n0: 1,
            k1_scale: 0.2,
            k2: 2.0,
        }
    }
}

/// A bracketed root search in progress.
#[derive(Clone, Debug)]
pub struct Itp {
    params: ItpParams,
    k1: f64,
    n_max: usize,
    iters: usize,
    tol: f64,
}

impl Itp {
    /// Construct a solver for bracket `[a, b]` (`a < b`) at tolerance `tol`.
    pub fn new(params: ItpParams, a: f64, b: f64, tol: f64) -> Result<Self> {
        if !(a < b) {
            return Err(Error::RootError(format!(
                "invalid bracket: a={a} must be < b={b}"
            )));
        }
        if !(tol > 0.0) {
            return Err(Error::RootError(format!("invalid tolerance {tol}")));
        }
        let n_half = ((b - a) / (2.0 * tol)).log2().ceil().max(0.0) as usize;
        Ok(Self {
            k1: params.k1_scale * (b - a),
            n_max: n_half + params.n0,
            params,
            iters: 0,
            tol,
        })
    }

    #[must_use]
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Re-bracket without resetting tuning parameters.
    pub fn reset(&mut self, a: f64, b: f64) -> Result<()> {
        if !(a < b) {
            return Err(Error::RootError(format!(
                "invalid bracket: a={a} must be < b={b}"
            )));
        }
        let n_half = ((b - a) / (2.0 * self.tol)).log2().ceil().max(0.0) as usize;
        self.k1 = self.params.k1_scale * (b - a);
        self.n_max = n_half + self.params.n0;
        self.iters = 0;
        Ok(())
    }

    /// Produce the next probe point inside `(a, b)`, given `f(a)`, `f(b)`
    /// with opposite signs.
    pub fn guess_root(&mut self, a: f64, b: f64, fa: f64, fb: f64) -> Result<f64> {
        let xhalf = 0.5 * (a + b);
        let r = self.tol * 2f64.powi((self.n_max - self.iters) as i32) - 0.5 * (b - a);
        let delta = self.k1 * (b - a).powf(self.params.k2);

        let xf = (fb * a - fa * b) / (fb - fa);
        let sigma = (xhalf - xf).signum();
        let xt = if delta <= (xf - xhalf).abs() {
            xf + sigma * delta
        } else {
            xhalf
        };
        let x_itp = if (xt - xhalf).abs() <= r {
            xt
        } else {
            xhalf - sigma * r
        };

        self.iters += 1;
        if x_itp <= a || x_itp >= b {
            return Err(Error::RootError(format!(
                "ITP guess {x_itp} left bracket ({a}, {b})"
            )));
        }
        Ok(x_itp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn converges_on_a_known_linear_root() {
        let f = |x: f64| x - 0.37;
        let mut solver = Itp::new(ItpParams::default(), 0.0, 1.0, 1e-10).unwrap();
        let mut a = 0.0;
        let mut b = 1.0;
        let mut fa = f(a);
        let mut fb = f(b);
        for _ in 0..solver.n_max() {
            let x = solver.guess_root(a, b, fa, fb).unwrap();
            let fx = f(x);
            if fx < 0.0 {
                a = x;
                fa = fx;
            } else {
                b = x;
                fb = fx;
            }
            if (b - a) < 2e-10 {
                break;
            }
        }
        assert!((b - 0.37).abs() < 1e-8);
    }

    #[test]
    fn rejects_unordered_bracket() {
        assert!(Itp::new(ItpParams::default(), 1.0, 0.0, 1e-6).is_err());
    }

    proptest::proptest! {
        #[test]
        fn converges_on_any_linear_root_in_bracket(root in 0.001f64..0.999) {
            let f = |x: f64| x - root;
            let tol = 1e-9;
            let mut solver = Itp::new(ItpParams::default(), 0.0, 1.0, tol).unwrap();
            let mut a = 0.0;
            let mut b = 1.0;
            let mut fa = f(a);
            let mut fb = f(b);
            for _ in 0..solver.n_max() {
                let x = solver.guess_root(a, b, fa, fb).unwrap();
                let fx = f(x);
                if fx < 0.0 {
                    a = x;
                    fa = fx;
                } else {
                    b = x;
                    fb = fx;
                }
                if (b - a) < 2.0 * tol {
                    break;
                }
            }
            prop_assert!((b - root).abs() < 1e-6);
        }
    }
}
