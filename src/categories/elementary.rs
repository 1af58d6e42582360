//! Single-input blocks
//!
//! `ln` and `sqrt` are the only partial functions here; everything else is
//! total over finite inputs.

use crate::core::block::DomainError;

pub fn exp(x: f64) -> Result<f64, DomainError> {
    Ok(x.exp())
}

pub fn abs(x: f64) -> Result<f64, DomainError> {
    Ok(x.abs())
}

/// Fails with [`DomainError::NonPositiveLog`] for `x <= 0`
pub fn ln(x: f64) -> Result<f64, DomainError> {
    if x <= 0.0 {
        return Err(DomainError::NonPositiveLog);
    }
    Ok(x.ln())
}

pub fn neg(x: f64) -> Result<f64, DomainError> {
    Ok(-x)
}

/// -1, 0 or 1; zero maps to zero (unlike `f64::signum`)
pub fn sign(x: f64) -> Result<f64, DomainError> {
    let s = if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(s)
}

pub fn square(x: f64) -> Result<f64, DomainError> {
    Ok(x * x)
}

/// Fails with [`DomainError::NegativeSqrt`] for `x < 0`
pub fn sqrt(x: f64) -> Result<f64, DomainError> {
    if x < 0.0 {
        return Err(DomainError::NegativeSqrt);
    }
    Ok(x.sqrt())
}
