//! # External Collaborator Seams
//!
//! Trait boundaries for the services this core consumes but does not
//! implement: the checkout/settlement backend, the credential backend,
//! and the seat-lock release signal.
//!
//! ## Boundary Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    External Interfaces                                  │
//! │                                                                         │
//! │  PaymentOrchestrator ──► SettlementBackend                             │
//! │    create_redirect(payload)  → redirect URL + scannable payload        │
//! │    poll_status(payment_code) → Pending | Settled | Failed              │
//! │    confirm_cash(payload)     → synchronous receipt reference           │
//! │                                                                         │
//! │  CredentialIssuer ─────► CredentialBackend                             │
//! │    issue(request)      → payload record + expiry + regenerate flag    │
//! │    regenerate(order)   → fresh payload record                          │
//! │                                                                         │
//! │  SessionManager ───────► SeatLockRelease                               │
//! │    release(showtime, tickets) on expiry / cancel                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This core shapes requests and renders responses; the wire protocols
//! behind these traits are out of scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marquee_core::{ConcessionLine, Money};

use crate::error::CheckoutResult;

// =============================================================================
// Checkout Payload
// =============================================================================

/// The settlement request built at `initiate` time.
///
/// Snapshot semantics: every field is frozen from the session at the
/// moment the attempt starts; later cart mutations do not leak in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    /// Seat/ticket identifiers being purchased.
    pub ticket_ids: Vec<String>,

    /// Concession lines being purchased.
    pub concession_lines: Vec<ConcessionLine>,

    /// Total after discount (always positive; enforced at initiate).
    pub total: Money,

    /// Loyalty discount applied.
    pub discount: Money,

    /// Amount to charge. Equals `total`; kept separate because the
    /// gateway contract names both fields.
    pub amount: Money,

    /// Unique code correlating this attempt across redirect, callback,
    /// and polling.
    pub payment_code: String,

    pub showtime_id: String,
    pub actor_id: String,
}

// =============================================================================
// Gateway Responses
// =============================================================================

/// Redirect target returned by the gateway for an initiated attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRedirect {
    /// URL of the external payment surface.
    pub redirect_url: String,

    /// Equivalent scannable payload, when the gateway provides one.
    pub qr_payload: Option<String>,
}

/// Result of one status-poll query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    /// Payment not yet resolved; keep polling.
    Pending,

    /// Payment settled; carries the provider transaction reference.
    Settled { txn_ref: String },

    /// Provider resolved the attempt as failed with this code.
    Failed { code: String },
}

// =============================================================================
// Settlement Backend
// =============================================================================

/// The checkout/settlement backend.
///
/// Accepts the checkout payload and answers by attempt reference. Network
/// failures surface as `CheckoutError::GatewayUnreachable`; this core
/// never retries on its own.
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    /// Builds the gateway redirect for an initiated attempt.
    async fn create_redirect(&self, payload: &CheckoutPayload) -> CheckoutResult<GatewayRedirect>;

    /// Queries the settlement status of an attempt by payment code.
    async fn poll_status(&self, payment_code: &str) -> CheckoutResult<PollStatus>;

    /// Synchronously acknowledges physical cash receipt.
    /// Returns the receipt reference.
    async fn confirm_cash(&self, payload: &CheckoutPayload) -> CheckoutResult<String>;
}

// =============================================================================
// Credential Backend
// =============================================================================

/// Identifiers of the showtime a credential must name.
///
/// Sourced from the catalog collaborator by the caller; this core does
/// not browse the catalog itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeDetails {
    pub movie_title: String,
    pub room_name: String,
    pub starts_at: DateTime<Utc>,
}

/// Request shaped by the credential issuer.
///
/// Deliberately minimal and human-verifiable: identifying fields only,
/// never the payment record. Authoritative order state is re-validated
/// server-side at consumption time; the payload is not a security token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub order_id: String,
    pub holder_name: String,
    pub movie_title: String,
    pub room_name: String,
    pub seat_ids: Vec<String>,
    pub starts_at: DateTime<Utc>,
}

/// Payload record returned by the credential backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// The scannable payload to render.
    pub payload: String,

    /// Server-communicated validity window end, if any.
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether the backend permits regeneration after expiry.
    pub regenerate_allowed: bool,
}

/// The credential backend: issues and regenerates QR payload records.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Issues a credential record for a completed order.
    async fn issue(&self, request: &CredentialRequest) -> CheckoutResult<CredentialRecord>;

    /// Regenerates the credential record for an order whose credential
    /// expired.
    async fn regenerate(&self, order_id: &str) -> CheckoutResult<CredentialRecord>;
}

// =============================================================================
// Seat-Lock Release
// =============================================================================

/// Release signal for externally-held seat locks.
///
/// Seat-lock acquisition lives outside this core; on hold expiry or
/// cancel the session manager fires this signal so the store can free
/// the inventory.
pub trait SeatLockRelease: Send + Sync {
    /// Releases the locks for these tickets under this showtime.
    fn release(&self, showtime_id: &str, ticket_ids: &[String]);
}

/// No-op release for tests and callers that manage locks elsewhere.
pub struct NoOpRelease;

impl SeatLockRelease for NoOpRelease {
    fn release(&self, _showtime_id: &str, _ticket_ids: &[String]) {}
}

// =============================================================================
// Unit Tests
// =============================================================================
