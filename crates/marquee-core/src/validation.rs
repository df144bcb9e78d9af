//! # Validation Module
//!
//! Field-level input validation for Marquee.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI / API surface)                                    │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, field validation before business logic          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Business rules (pricing, redemption, session state)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_CONCESSION_QUANTITY, MAX_SEATS_PER_SESSION};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a seat identifier.
///
/// ## Rules
/// - Must not be empty
/// - At most 8 characters
/// - Must start with an ASCII row letter, remainder alphanumeric
///
/// ## Example
/// ```rust
/// use marquee_core::validation::validate_seat_id;
///
/// assert!(validate_seat_id("A1").is_ok());
/// assert!(validate_seat_id("17").is_err());
/// assert!(validate_seat_id("").is_err());
/// ```
pub fn validate_seat_id(seat_id: &str) -> ValidationResult<()> {
    let seat_id = seat_id.trim();

    if seat_id.is_empty() {
        return Err(ValidationError::Required {
            field: "seat_id".to_string(),
        });
    }

    if seat_id.len() > 8 {
        return Err(ValidationError::TooLong {
            field: "seat_id".to_string(),
            max: 8,
        });
    }

    let mut chars = seat_id.chars();
    let leads_with_row = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !leads_with_row || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "seat_id".to_string(),
            reason: "must be a row letter followed by alphanumerics".to_string(),
        });
    }

    Ok(())
}

/// Validates a concession item identifier.
pub fn validate_item_id(item_id: &str) -> ValidationResult<()> {
    let item_id = item_id.trim();

    if item_id.is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }

    if item_id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "item_id".to_string(),
            max: 64,
        });
    }

    Ok(())
}

// =============================================================================
// Quantity Validators
// =============================================================================

/// Validates a concession quantity.
///
/// Quantity 0 is accepted here: the cart treats it as line removal.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_CONCESSION_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_CONCESSION_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a seat-selection size against the per-session cap.
pub fn validate_seat_count(count: usize) -> ValidationResult<()> {
    if count > MAX_SEATS_PER_SESSION {
        return Err(ValidationError::OutOfRange {
            field: "seats".to_string(),
            min: 0,
            max: MAX_SEATS_PER_SESSION as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
