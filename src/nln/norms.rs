//! Vector norms used by the convergence tests.
use crate::nln::NormType;
use mortar_sparse::Vector;

/// The norm of `v`. A scaled norm is divided by `n` for the one norm and by `√n` for the two
/// norm, where `n` is the length of `v`. The max norm is never scaled.
pub fn vector_norm(v: &Vector, norm: NormType, scaled: bool) -> f64 {
    let n = v.len() as f64;
    match norm {
        NormType::One => {
            let value = v.norm1();
            if scaled && n > 0.0 {
                value / n
            } else {
                value
            }
        }
        NormType::Two => {
            let value = v.norm2();
            if scaled && n > 0.0 {
                value / n.sqrt()
            } else {
                value
            }
        }
        NormType::Max => v.norm_inf(),
    }
}

/// The weighted root mean square `sqrt(Σᵢ (Δxᵢ / (atol + rtol |x_newᵢ|))² / n)` of the increment.
///
/// With `disable_weighting` the sum is not divided by the length `n`.
///
/// # Panics
///
/// Panics if `x_new` and `dx` are keyed by different maps.
pub fn root_mean_square_norm(atol: f64, rtol: f64, x_new: &Vector, dx: &Vector, disable_weighting: bool) -> f64 {
    assert_eq!(x_new.map().as_ref(), dx.map().as_ref(), "RMS norm requires identical maps");
    let sum: f64 = x_new
        .values()
        .iter()
        .zip(dx.values().iter())
        .map(|(x, d)| {
            let weighted = d / (atol + rtol * x.abs());
            weighted * weighted
        })
        .sum();
    let n = x_new.len();
    if disable_weighting || n == 0 {
        sum.sqrt()
    } else {
        (sum / n as f64).sqrt()
    }
}
