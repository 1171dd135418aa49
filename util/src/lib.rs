/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::{catch_unwind, AssertUnwindSafe};
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(AssertUnwindSafe(|| $e));
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Central finite difference `(f(x + h) - f(x - h)) / 2h` of a scalar function of one variable.
pub fn central_difference(f: impl Fn(f64) -> f64, x: f64, h: f64) -> f64 {
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Asserts that an analytic derivative matches a finite-difference estimate.
///
/// The tolerance is relative to `max(|analytic|, 1.0)`, so derivatives close to zero are compared
/// in an absolute sense.
pub fn assert_derivative_eq(analytic: f64, finite_difference: f64, reltol: f64, context: &str) {
    let scale = analytic.abs().max(1.0);
    let error = (analytic - finite_difference).abs();
    assert!(
        error <= reltol * scale,
        "{context}: analytic derivative {analytic:e} differs from finite difference {finite_difference:e} \
         (error {error:e}, tolerance {:e})",
        reltol * scale
    );
}
