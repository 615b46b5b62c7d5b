//! Quadrature rules for the one-dimensional domain `[-1, 1]`.
//!
//! All rules returned from this module have their points sorted in ascending order.

use crate::Rule;
use std::f64::consts::PI;

/// Maximum number of Newton iterations used when polishing a root.
const MAX_NEWTON_ITERATIONS: usize = 100;

/// Recurrence relation for Legendre polynomials.
///
/// Note: we use a formula for which derivatives are *not* defined at |x| == 1, so it is only
/// suitable for evaluation in the open interval (-1, 1).
#[derive(Debug, Default, Clone, Copy)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // The current value, i.e. p_n(x)
    p1: f64,
    // The previous value in the recurrence, i.e. p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    fn value(&self) -> f64 {
        self.p1
    }

    /// The value of the previous polynomial in the recurrence, p_{n - 1}(x).
    fn previous_value(&self) -> f64 {
        self.p2
    }

    fn derivative(&self) -> f64 {
        let Self { n, x, p1, p2 } = *self;
        let n = n as f64;
        // dp_n/dx (x) = n * (x * p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
        n * (x * p1 - p2) / (x * x - 1.0)
    }

    fn second_derivative(&self) -> f64 {
        let Self { n, x, p1, .. } = *self;
        let n = n as f64;
        // From Legendre's differential equation
        //  (1 - x^2) p_n'' - 2x p_n' + n (n + 1) p_n = 0
        (2.0 * x * self.derivative() - n * (n + 1.0) * p1) / (1.0 - x * x)
    }

    fn value_and_derivative(&self) -> (f64, f64) {
        (self.value(), self.derivative())
    }
}

/// Newton's method for `f`, given as a function returning value and derivative.
fn newton(f: impl Fn(f64) -> (f64, f64), mut x: f64) -> f64 {
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (fx, dfx) = f(x);
        let dx = -fx / dfx;
        if !dx.is_finite() {
            break;
        }
        x += dx;
        if dx.abs() <= 1e-15 {
            break;
        }
    }
    x
}

/// Polish the single root of `f` inside the bracket `[a, b]`, starting from `x`.
///
/// Should a Newton step leave the bracket, bisection is used instead.
fn polish_root(f: impl Fn(f64) -> (f64, f64), mut x: f64, mut a: f64, mut b: f64) -> f64 {
    let (fa, _) = f(a);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (fx, dfx) = f(x);
        if fx == 0.0 {
            return x;
        }
        // Maintain the bracket so that the safeguard remains valid
        if fx.signum() == fa.signum() {
            a = x;
        } else {
            b = x;
        }
        let mut x_next = x - fx / dfx;
        if !x_next.is_finite() || x_next <= a || x_next >= b {
            x_next = 0.5 * (a + b);
        }
        let dx = x_next - x;
        x = x_next;
        if dx.abs() <= 1e-15 {
            break;
        }
    }
    x
}

/// Find the `num_roots` simple roots of `f` in the open interval `(-1, 1)`.
///
/// Roots are bracketed by sign changes on a Chebyshev grid, which clusters samples near the
/// endpoints where roots of (derived) Legendre polynomials cluster as well.
fn roots_in_open_interval(f: impl Fn(f64) -> (f64, f64), num_roots: usize) -> Option<Vec<f64>> {
    if num_roots == 0 {
        return Some(Vec::new());
    }
    let num_samples = 64 * (num_roots + 1);
    let sample = |j: usize| -(PI * j as f64 / num_samples as f64).cos();

    let mut roots = Vec::with_capacity(num_roots);
    let mut x_prev = sample(1);
    let mut f_prev = f(x_prev).0;
    for j in 2..num_samples {
        let x = sample(j);
        let fx = f(x).0;
        if fx == 0.0 {
            roots.push(x);
        } else if f_prev != 0.0 && fx.signum() != f_prev.signum() {
            roots.push(polish_root(&f, 0.5 * (x_prev + x), x_prev, x));
        }
        x_prev = x;
        f_prev = fx;
    }

    (roots.len() == num_roots).then_some(roots)
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    // Loosely based on the procedure used in
    // Numerical Recipes, The art of Scientific Computing, Third Edition (2007)
    let m = (n + 1) / 2;
    let legendre = |x: f64| LegendreRecurrence::evaluate(n, x).value_and_derivative();

    let mut points = vec![[0.0]; n];
    let mut weights = vec![0.0; n];

    // Only find the roots in [0, 1). The remaining roots follow by symmetry
    for i in 0..m {
        let guess = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let x = newton(legendre, guess);
        let (_, dp) = legendre(x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        points[n - 1 - i] = [x];
        weights[n - 1 - i] = w;
        points[i] = [-x];
        weights[i] = w;
    }

    (weights, points)
}

/// Gauss-Lobatto quadrature for the reference interval [-1, 1].
///
/// The rule contains both endpoints and integrates polynomials of order up to `2 n - 3`
/// exactly. Returns `None` if fewer than two points are requested.
pub fn try_gauss_lobatto(num_points: usize) -> Option<Rule<1>> {
    let n = num_points;
    if n < 2 {
        return None;
    }

    // Interior points are the roots of p'_{n - 1}
    let interior = roots_in_open_interval(
        |x| {
            let p = LegendreRecurrence::evaluate(n - 1, x);
            (p.derivative(), p.second_derivative())
        },
        n - 2,
    )?;

    let nf = n as f64;
    let weight = |x: f64| {
        let p = LegendreRecurrence::evaluate(n - 1, x).value();
        2.0 / (nf * (nf - 1.0) * p * p)
    };

    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    points.push([-1.0]);
    weights.push(2.0 / (nf * (nf - 1.0)));
    for x in interior {
        points.push([x]);
        weights.push(weight(x));
    }
    points.push([1.0]);
    weights.push(2.0 / (nf * (nf - 1.0)));

    Some((weights, points))
}

/// Gauss-Radau quadrature for the reference interval [-1, 1], containing the right endpoint.
///
/// The rule integrates polynomials of order up to `2 n - 2` exactly. Returns `None` if zero
/// points are requested.
pub fn try_gauss_radau(num_points: usize) -> Option<Rule<1>> {
    let n = num_points;
    if n < 1 {
        return None;
    }
    let nf = n as f64;

    // The left-sided rule has its free points at the roots of p_{n - 1} + p_n,
    // the right-sided rule is its mirror image.
    let interior = roots_in_open_interval(
        |x| {
            let p = LegendreRecurrence::evaluate(n, x);
            let q = LegendreRecurrence::evaluate(n - 1, x);
            (p.value() + p.previous_value(), p.derivative() + q.derivative())
        },
        n - 1,
    )?;

    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for x in interior.into_iter().rev() {
        let p = LegendreRecurrence::evaluate(n - 1, x).value();
        points.push([-x]);
        weights.push((1.0 - x) / (nf * nf * p * p));
    }
    points.push([1.0]);
    weights.push(2.0 / (nf * nf));

    Some((weights, points))
}
