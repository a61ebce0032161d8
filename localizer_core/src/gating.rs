//! Divergence gating: decides whether a measurement is "close enough" to a
//! track's positional estimate to be used for its correction.
//!
//! # Gating criterion
//! Kullback–Leibler divergence of the measurement N(μ₀, Σ₀) from the track's
//! positional marginal N(μ₁, Σ₁), k = 3:
//!
//! D = ½ · ( tr(Σ₁⁻¹Σ₀) + (μ₁−μ₀)ᵀ Σ₁⁻¹ (μ₁−μ₀) − k + ln(det Σ₁ / det Σ₀) )
//!
//! Accept if D < gate threshold. Unlike a Mahalanobis gate this also
//! penalises a mismatch in spread, so a sharp measurement does not associate
//! with a track that has already grown very uncertain.

use crate::{
    error::{Result, TrackerError},
    types::{PosCov, PosVec},
};

/// Dimension of the compared Gaussians.
pub const DIM: f64 = 3.0;

/// Result of a gate check for one (track, measurement) pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateResult {
    pub divergence: f64,
    /// True if divergence < gate threshold
    pub passes: bool,
}

/// KL divergence D(N(mu0, sigma0) ‖ N(mu1, sigma1)).
///
/// Returns `NumericDegeneracy` if either covariance is singular (or not
/// positive definite) or the result is not finite. Such a value is never a
/// valid candidate for a minimum.
pub fn kl_divergence(mu0: &PosVec, sigma0: &PosCov, mu1: &PosVec, sigma1: &PosCov) -> Result<f64> {
    let det0 = sigma0.determinant();
    let det1 = sigma1.determinant();
    if !(det0 > 0.0) || !(det1 > 0.0) {
        return Err(TrackerError::NumericDegeneracy("singular covariance in divergence"));
    }
    sigma0
        .cholesky()
        .ok_or(TrackerError::NumericDegeneracy("measurement covariance not positive definite"))?;
    let sigma1_inv = sigma1
        .cholesky()
        .ok_or(TrackerError::NumericDegeneracy("track covariance not positive definite"))?
        .inverse();

    let diff = mu1 - mu0;
    let trace_term = (sigma1_inv * sigma0).trace();
    let mahalanobis = diff.dot(&(sigma1_inv * diff));
    let div = 0.5 * (trace_term + mahalanobis - DIM + (det1 / det0).ln());

    if div.is_finite() {
        Ok(div)
    } else {
        Err(TrackerError::NumericDegeneracy("non-finite divergence"))
    }
}

/// Divergence of measurement `(z, r)` from a track's position `(pos, pos_cov)`
/// tested against `gate_threshold`.
pub fn divergence_gate(
    z: &PosVec,
    r: &PosCov,
    pos: &PosVec,
    pos_cov: &PosCov,
    gate_threshold: f64,
) -> Result<GateResult> {
    let divergence = kl_divergence(z, r, pos, pos_cov)?;
    Ok(GateResult {
        divergence,
        passes: divergence < gate_threshold,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
