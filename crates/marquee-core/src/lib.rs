//! # marquee-core: Pure Business Logic for Marquee
//!
//! This crate is the **heart** of Marquee. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marquee Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Caller (API / UI surface)                       │   │
//! │  │   seat picker ──► concession picker ──► checkout ──► QR        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               marquee-checkout (orchestration)                  │   │
//! │  │     sessions, countdown, payment paths, credential issuer       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ marquee-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  pricing  │  │   │
//! │  │   │ CartLine  │  │   Money   │  │ Aggregator│  │ row bands │  │   │
//! │  │   │   Order   │  │ discounts │  │ dual-maps │  │ summaries │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CartLine, Order, LoyaltyRedemption, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Row-band seat pricing and discount math
//! - [`cart`] - Dual-producer cart aggregator
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Network, file system, and timer access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are i64 in the smallest unit
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use marquee_core::Money` instead of
// `use marquee_core::money::Money`

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::PriceTable;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum seats one session may hold.
///
/// ## Business Reason
/// Matches the per-showtime group-booking cap; anything larger goes
/// through the box office, not self-service checkout.
pub const MAX_SEATS_PER_SESSION: usize = 10;

/// Maximum quantity of a single concession item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 100 instead of 10).
pub const MAX_CONCESSION_QUANTITY: i64 = 20;

/// The only gateway provider response code recognized as success.
pub const PROVIDER_SUCCESS_CODE: &str = "00";
