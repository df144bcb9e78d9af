//! # Marquee Checkout
//!
//! Orchestration layer for the Marquee box-office checkout: reservation
//! sessions with timed holds, payment settlement over cash and gateway
//! paths, and the QR admission credential lifecycle.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       marquee-checkout                                  │
//! │                                                                         │
//! │  SessionManager            PaymentOrchestrator       CredentialIssuer  │
//! │  ┌──────────────────┐      ┌──────────────────┐     ┌───────────────┐  │
//! │  │ hold countdown   │ seal │ initiate/confirm │     │ issue/consume │  │
//! │  │ cart mutations   │◄─────│ callback + poll  │────►│ regenerate    │  │
//! │  │ redemption       │      │ try_settle gate  │     │               │  │
//! │  └────────┬─────────┘      └────────┬─────────┘     └───────┬───────┘  │
//! │           │                         │                       │          │
//! │           ▼                         ▼                       ▼          │
//! │    SeatLockRelease         SettlementBackend       CredentialBackend   │
//! │    (trait seam)            (trait seam)            (trait seam)        │
//! │                                                                         │
//! │  Pure domain rules (Money, Cart, pricing, validation) live in          │
//! │  marquee-core; this crate adds time, tasks, and collaborators.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each live session runs a 1-second countdown task; each redirected
//! gateway attempt runs a 3-second status-poll task. Both stop on the
//! first terminal transition, exactly once.

pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod payment;
pub mod session;

pub use backend::{
    CheckoutPayload, CredentialBackend, CredentialRecord, CredentialRequest, GatewayRedirect,
    NoOpRelease, PollStatus, SeatLockRelease, SettlementBackend, ShowtimeDetails,
};
pub use config::CheckoutConfig;
pub use credential::{CredentialIssuer, CredentialState, QrCredential};
pub use error::{CheckoutError, CheckoutResult};
pub use payment::{AttemptState, InitiateOutcome, PaymentAttempt, PaymentOrchestrator};
pub use session::{SessionKey, SessionManager, SessionSnapshot, SessionState};
