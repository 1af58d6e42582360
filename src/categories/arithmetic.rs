//! Two-input arithmetic blocks

use crate::core::block::DomainError;

pub fn add(a: f64, b: f64) -> Result<f64, DomainError> {
    Ok(a + b)
}

pub fn subtract(a: f64, b: f64) -> Result<f64, DomainError> {
    Ok(a - b)
}

pub fn multiply(a: f64, b: f64) -> Result<f64, DomainError> {
    Ok(a * b)
}

/// Fails with [`DomainError::DivisionByZero`] when `b` is zero
pub fn divide(a: f64, b: f64) -> Result<f64, DomainError> {
    if b == 0.0 {
        return Err(DomainError::DivisionByZero);
    }
    Ok(a / b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        assert_eq!(add(2.0, 3.0), Ok(5.0));
        assert_eq!(subtract(2.0, 3.0), Ok(-1.0));
        assert_eq!(multiply(-2.0, 3.0), Ok(-6.0));
        assert_eq!(divide(6.0, 3.0), Ok(2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(divide(5.0, 0.0), Err(DomainError::DivisionByZero));
        assert_eq!(divide(5.0, -0.0), Err(DomainError::DivisionByZero));
        assert_eq!(divide(0.0, 5.0), Ok(0.0));
    }
}
