//! Derivative-free 1-D minimization: downhill bracketing plus Brent's method.
//!
//! Neither routine fails hard. Both report convergence as a `bool` and leave
//! the best point found in the [`Bracket`], so callers can keep going with a
//! best-effort estimate.

use serde::{Deserialize, Serialize};

/// Golden ratio used for step growth while bracketing
const GOLD: f64 = 1.618_034;
/// Maximum magnification allowed for a parabolic-fit step
const GLIMIT: f64 = 100.0;
/// Guards the parabolic denominator
const TINY: f64 = 1.0e-20;
/// Golden-section fraction used by Brent
const CGOLD: f64 = 0.381_966_0;
/// Absolute floor on the x tolerance, for minima at zero
const ZEPS: f64 = 1.0e-10;

/// Iteration budget of [`brack`]
pub const DEFAULT_BRACKET_ITERATIONS: usize = 100;

/// Tolerances and budget for [`brent`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinimizerParams {
    /// Relative tolerance on the bracket width
    pub tol_x: f64,
    /// Relative tolerance on the function values at the bracket ends
    pub tol_f: f64,
    /// Maximum Brent iterations
    pub max_iter: usize,
    /// Maximum bracket expansion steps
    pub bracket_iter: usize,
}

impl Default for MinimizerParams {
    fn default() -> Self {
        Self {
            tol_x: 1.0e-5,
            tol_f: 1.0e-5,
            max_iter: 1000,
            bracket_iter: DEFAULT_BRACKET_ITERATIONS,
        }
    }
}

/// Three abscissae with their function values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub lower_x: f64,
    pub lower_f: f64,
    pub minimum_x: f64,
    pub minimum_f: f64,
    pub upper_x: f64,
    pub upper_f: f64,
}

impl Bracket {
    /// Candidate interval `[lower_x, upper_x]` with its midpoint as the interior point
    pub fn new<F: Fn(f64) -> f64>(lower_x: f64, upper_x: f64, f: F) -> Self {
        let (lower_x, upper_x) = if lower_x <= upper_x {
            (lower_x, upper_x)
        } else {
            (upper_x, lower_x)
        };
        let minimum_x = 0.5 * (lower_x + upper_x);

        Self {
            lower_x,
            lower_f: f(lower_x),
            minimum_x,
            minimum_f: f(minimum_x),
            upper_x,
            upper_f: f(upper_x),
        }
    }

    /// True when the interior point is strictly inside and no higher than either end
    pub fn is_valid(&self) -> bool {
        self.lower_x < self.minimum_x
            && self.minimum_x < self.upper_x
            && self.minimum_f <= self.lower_f
            && self.minimum_f <= self.upper_f
    }

    fn set(&mut self, a: (f64, f64), b: (f64, f64), c: (f64, f64)) {
        let (lower, upper) = if a.0 <= c.0 { (a, c) } else { (c, a) };
        self.lower_x = lower.0;
        self.lower_f = lower.1;
        self.minimum_x = b.0;
        self.minimum_f = b.1;
        self.upper_x = upper.0;
        self.upper_f = upper.1;
    }
}

impl Default for Bracket {
    fn default() -> Self {
        Self {
            lower_x: 0.0,
            lower_f: 0.0,
            minimum_x: 0.0,
            minimum_f: 0.0,
            upper_x: 0.0,
            upper_f: 0.0,
        }
    }
}

#[inline]
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Bracket a minimum of `f` starting from the two points `x0` and `x1`.
///
/// Walks downhill with golden-ratio step growth and parabolic extrapolation.
/// Returns `true` once `lower_x < minimum_x < upper_x` with the interior point
/// no higher than both ends. On `false` the bracket holds the last triple.
pub fn brack<F: Fn(f64) -> f64>(f: F, x0: f64, x1: f64, bracket: &mut Bracket) -> bool {
    brack_with_limit(f, x0, x1, bracket, DEFAULT_BRACKET_ITERATIONS)
}

/// [`brack`] with an explicit expansion budget
pub fn brack_with_limit<F: Fn(f64) -> f64>(
    f: F,
    x0: f64,
    x1: f64,
    bracket: &mut Bracket,
    max_iter: usize,
) -> bool {
    if x0 == x1 {
        log::debug!("Cannot bracket from two identical points ({})", x0);
        return false;
    }

    let (mut a, mut b) = (x0, x1);
    let (mut fa, mut fb) = (f(a), f(b));
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLD * (b - a);
    let mut fc = f(c);

    let mut iter = 0;
    while fb > fc {
        if iter >= max_iter {
            bracket.set((a, fa), (b, fb), (c, fc));
            log::debug!("Bracketing budget of {} steps exhausted", max_iter);
            return false;
        }
        iter += 1;

        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let mut u = b - ((b - c) * q - (b - a) * r) / (2.0 * sign((q - r).abs().max(TINY), q - r));
        let ulim = b + GLIMIT * (c - b);
        let mut fu;

        if (b - u) * (u - c) > 0.0 {
            // Parabolic u lies between b and c
            fu = f(u);
            if fu < fc {
                bracket.set((b, fb), (u, fu), (c, fc));
                return bracket.is_valid();
            } else if fu > fb {
                bracket.set((a, fa), (b, fb), (u, fu));
                return bracket.is_valid();
            }
            u = c + GOLD * (c - b);
            fu = f(u);
        } else if (c - u) * (u - ulim) > 0.0 {
            // Parabolic u lies between c and its allowed limit
            fu = f(u);
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLD * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u);
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u);
        } else {
            u = c + GOLD * (c - b);
            fu = f(u);
        }

        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }

    bracket.set((a, fa), (b, fb), (c, fc));
    bracket.is_valid()
}

/// Refine a bracketed minimum with Brent's method.
///
/// Alternates golden-section steps with inverse parabolic interpolation until
/// the bracket width is within `tol_x` (relative to the abscissa) or the
/// end-point function values agree within `tol_f`, or `max_iter` is reached.
/// The bracket is updated in place; `minimum_x` is always the best point seen.
pub fn brent<F: Fn(f64) -> f64>(
    f: F,
    bracket: &mut Bracket,
    tol_x: f64,
    tol_f: f64,
    max_iter: usize,
) -> bool {
    let (mut a, mut fa, mut b, mut fb) = if bracket.lower_x <= bracket.upper_x {
        (bracket.lower_x, bracket.lower_f, bracket.upper_x, bracket.upper_f)
    } else {
        (bracket.upper_x, bracket.upper_f, bracket.lower_x, bracket.lower_f)
    };

    let mut x = bracket.minimum_x;
    let mut fx = bracket.minimum_f;
    let (mut w, mut fw) = (x, fx);
    let (mut v, mut fv) = (x, fx);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut converged = false;

    for _ in 0..max_iter {
        let xm = 0.5 * (a + b);
        let tol1 = tol_x * x.abs() + ZEPS;
        let tol2 = 2.0 * tol1;

        if (x - xm).abs() <= tol2 - 0.5 * (b - a)
            || (fb - fa).abs() <= tol_f * 0.5 * (fa.abs() + fb.abs())
        {
            converged = true;
            break;
        }

        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let etemp = e;
            e = d;

            if p.abs() >= (0.5 * q * etemp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = if x >= xm { a - x } else { b - x };
                d = CGOLD * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = sign(tol1, xm - x);
                }
            }
        } else {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 { x + d } else { x + sign(tol1, d) };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
                fa = fx;
            } else {
                b = x;
                fb = fx;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
                fa = fu;
            } else {
                b = u;
                fb = fu;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    bracket.lower_x = a;
    bracket.lower_f = fa;
    bracket.minimum_x = x;
    bracket.minimum_f = fx;
    bracket.upper_x = b;
    bracket.upper_f = fb;

    converged
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_brent_on_cosine() {
        let mut bracket = Bracket::new(2.0, 5.0, f64::cos);
        assert!(bracket.is_valid());

        let converged = brent(f64::cos, &mut bracket, 1.0e-8, 1.0e-14, 100);
        assert!(converged);
        assert_abs_diff_eq!(bracket.minimum_x, PI, epsilon = 1.0e-6);
        assert_abs_diff_eq!(bracket.minimum_f, -1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn test_brack_then_brent_on_cosine() {
        let mut bracket = Bracket::default();
        assert!(brack(f64::cos, 2.0, 3.0, &mut bracket));
        assert!(bracket.lower_x < PI && PI < bracket.upper_x);

        assert!(brent(f64::cos, &mut bracket, 1.0e-8, 1.0e-14, 100));
        assert_abs_diff_eq!(bracket.minimum_x, PI, epsilon = 1.0e-6);
    }

    #[test]
    fn test_brack_walks_downhill() {
        let f = |x: f64| (x - 7.25) * (x - 7.25) + 1.0;
        let mut bracket = Bracket::default();

        assert!(brack(f, 0.0, 1.0, &mut bracket));
        assert!(bracket.is_valid());
        assert!(bracket.lower_x < 7.25 && 7.25 < bracket.upper_x);

        assert!(brent(f, &mut bracket, 1.0e-5, 1.0e-5, 1000));
        assert_abs_diff_eq!(bracket.minimum_x, 7.25, epsilon = 1.0e-3);
    }

    #[test]
    fn test_brack_negative_direction() {
        let f = |x: f64| (x + 0.3).powi(2);
        let mut bracket = Bracket::default();

        assert!(brack(f, 0.0, 1.0, &mut bracket));
        assert!(brent(f, &mut bracket, 1.0e-8, 1.0e-12, 1000));
        assert_abs_diff_eq!(bracket.minimum_x, -0.3, epsilon = 1.0e-4);
    }

    #[test]
    fn test_brack_reports_failure_on_monotone_function() {
        let mut bracket = Bracket::default();
        let found = brack_with_limit(|x: f64| -x, 0.0, 1.0, &mut bracket, 5);

        assert!(!found);
        assert!(bracket.minimum_x.is_finite());
    }

    #[test]
    fn test_brent_reports_failure_when_budget_is_too_small() {
        let f = |x: f64| (x - 0.123_456).powi(2);
        let mut bracket = Bracket::new(-10.0, 10.0, f);

        let converged = brent(f, &mut bracket, 1.0e-12, 0.0, 2);
        assert!(!converged);
        // best effort is still inside the original interval
        assert!(bracket.minimum_x > -10.0 && bracket.minimum_x < 10.0);
    }
}
