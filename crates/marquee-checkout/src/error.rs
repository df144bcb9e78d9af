//! # Checkout Error Types
//!
//! Error taxonomy for the checkout orchestration layer.
//!
//! ## Recovery Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Error Classes                             │
//! │                                                                         │
//! │  Locally recoverable (re-prompt, nothing mutated)                      │
//! │  ├── Core(..)            bad line / quantity / redemption              │
//! │  └── NonPositiveTotal    fully-discounted carts cannot settle          │
//! │                                                                         │
//! │  Return to selection step                                              │
//! │  ├── EmptySelection      checkout with no seats held                   │
//! │  ├── SessionMissing      no live session for (showtime, actor)         │
//! │  └── SessionNotActive    session already terminal                      │
//! │                                                                         │
//! │  Retryable by re-initiating (session preserved)                        │
//! │  ├── GatewayUnreachable  network failure building the redirect         │
//! │  └── ProviderFailure     provider code other than "00"                 │
//! │                                                                         │
//! │  Terminal for the artifact                                             │
//! │  ├── RegenerationDenied  direct actor to manual check-in               │
//! │  └── AlreadyUsed         security-relevant, never swallowed            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use marquee_core::CoreError;

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors surfaced by the session, payment, and credential components.
///
/// Payment and credential errors always leave the session and any Order
/// in the last-known-consistent state, so an explicit caller retry is
/// safe. No component retries automatically.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout attempted with no seats held.
    #[error("No seats selected; return to seat selection")]
    EmptySelection,

    /// No live session exists for this (showtime, actor) pair.
    ///
    /// ## When This Occurs
    /// - Checkout after the hold expired (session discarded)
    /// - Checkout before any selection was made
    ///
    /// The caller must re-derive the session before retrying.
    #[error("No live session for showtime {showtime_id}, actor {actor_id}")]
    SessionMissing {
        showtime_id: String,
        actor_id: String,
    },

    /// The session exists but is no longer accepting this operation.
    #[error("Session is {state}, operation not allowed")]
    SessionNotActive { state: String },

    /// The discounted total is zero or negative; settlement is refused.
    #[error("Total {total} must be positive to settle")]
    NonPositiveTotal { total: String },

    /// Network failure while asking the gateway for a redirect target.
    /// The attempt is abandoned; the session stays active for retry.
    #[error("Payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// The provider answered with a non-success code.
    #[error("Provider declined payment with code {code}")]
    ProviderFailure { code: String },

    /// The payment attempt is not in a state that allows the operation.
    #[error("Payment attempt is {state}, cannot {operation}")]
    InvalidAttemptState { state: String, operation: String },

    /// No payment attempt is live for this session.
    #[error("No live payment attempt for this session")]
    AttemptMissing,

    /// Credential regeneration refused (not expired, or backend flag
    /// denies it). The actor must use manual check-in.
    #[error("Credential regeneration denied for order {order_id}")]
    RegenerationDenied { order_id: String },

    /// The credential was already consumed. Security-relevant: gates
    /// physical admission and must never be silently swallowed.
    #[error("Credential for order {order_id} was already used")]
    AlreadyUsed { order_id: String },

    /// No credential is available in a consumable/renewable state.
    #[error("Credential for order {order_id} is {state}")]
    CredentialUnavailable { order_id: String, state: String },

    /// Order lookup failed.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Domain-rule violation from the pricing/cart layer.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CheckoutError.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================
