//! # Error Types
//!
//! Domain-specific error types for marquee-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  marquee-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations (invalid input class)   │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  marquee-checkout errors (separate crate)                              │
//! │  └── CheckoutError    - Session / payment / credential failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → Caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (seat id, quantity, points)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations and are all locally
/// recoverable: the caller re-prompts and no state has been mutated.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Seat identifier does not map to any pricing tier.
    ///
    /// ## When This Occurs
    /// - Seat id has no leading row letter (e.g. "17", "")
    /// - Row letter falls outside the configured band table
    #[error("Seat {0} has no known pricing tier")]
    UnknownSeatTier(String),

    /// Concession quantity is zero or negative where a positive count
    /// is required.
    #[error("Invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: String, quantity: i64 },

    /// Too many seats submitted for one session.
    #[error("A session cannot hold more than {max} seats")]
    TooManySeats { max: usize },

    /// Loyalty redemption must request at least one point.
    #[error("Redemption must request at least 1 point, got {requested}")]
    RedemptionNotPositive { requested: i64 },

    /// Loyalty redemption exceeds the actor's available balance.
    ///
    /// ## When This Occurs
    /// - Actor requests more points than their account holds
    ///
    /// A rejected redemption leaves any previously applied discount
    /// untouched.
    #[error("Redemption of {requested} points exceeds available balance of {available}")]
    RedemptionExceedsBalance { requested: i64, available: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet format requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., seat id without a row letter).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::RedemptionExceedsBalance {
            requested: 50,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Redemption of 50 points exceeds available balance of 12"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "seat_id".to_string(),
        };
        assert_eq!(err.to_string(), "seat_id is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
