use fesdc_quadrature::integrate;
use fesdc_quadrature::univariate::{gauss, try_gauss_lobatto, try_gauss_radau};

use matrixcompare::assert_scalar_eq;

fn monomial_integral(alpha: i32) -> f64 {
    (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0)
}

/// Rounding in the weights of rules with fixed endpoints grows with the number of points.
fn rule_tolerance(num_points: usize) -> f64 {
    f64::max(1e-13, 2e-14 * num_points as f64)
}

#[test]
fn gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=64 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss(n);

        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0][0] < pair[1][0]));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x[0].powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn gauss_lobatto_rules_satisfy_expected_accuracy() {
    assert!(try_gauss_lobatto(0).is_none());
    assert!(try_gauss_lobatto(1).is_none());

    for n in 2..=24 {
        let expected_polynomial_degree = 2 * n - 3;
        let rule = try_gauss_lobatto(n).unwrap();

        // Check that rule contains endpoints, like Gauss-Lobatto should
        assert_eq!(rule.1.first().unwrap(), &[-1.0]);
        assert_eq!(rule.1.last().unwrap(), &[1.0]);
        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0][0] < pair[1][0]));

        let tol = rule_tolerance(n);
        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x[0].powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = tol);
        }
    }
}

#[test]
fn gauss_radau_rules_satisfy_expected_accuracy() {
    assert!(try_gauss_radau(0).is_none());

    for n in 1..=24 {
        let expected_polynomial_degree = 2 * n - 2;
        let rule = try_gauss_radau(n).unwrap();

        assert_eq!(rule.1.last().unwrap(), &[1.0]);
        assert!(rule.1.first().unwrap()[0] > -1.0);
        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0][0] < pair[1][0]));

        let weight_sum: f64 = rule.0.iter().sum();
        assert_scalar_eq!(weight_sum, 2.0, comp = abs, tol = rule_tolerance(n));

        let tol = rule_tolerance(n);
        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x[0].powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = tol);
        }
    }
}

#[test]
fn two_point_gauss_radau_rule_is_known() {
    let (weights, points) = try_gauss_radau(2).unwrap();
    assert_scalar_eq!(points[0][0], -1.0 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[0], 1.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weights[1], 0.5, comp = abs, tol = 1e-14);
}
