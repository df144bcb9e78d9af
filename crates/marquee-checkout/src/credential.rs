//! # QR Credential Issuer
//!
//! Issues, renders, consumes, and regenerates the scannable admission
//! credential for completed orders.
//!
//! ## Credential State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Credential Lifecycle                                 │
//! │                                                                         │
//! │   NOT_ISSUED ──issue (order COMPLETED)──► VALID ──consume──► USED      │
//! │                                             │                  │        │
//! │                                     validity window        consume      │
//! │                                         elapses               again     │
//! │                                             │                  │        │
//! │                                             ▼                  ▼        │
//! │                                          EXPIRED          AlreadyUsed   │
//! │                                             │            (state kept)   │
//! │                            regenerate_allowed?                          │
//! │                            yes → fresh VALID payload                    │
//! │                            no  → RegenerationDenied                     │
//! │                                  (manual check-in)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The payload is identifying, not secret: holder name, movie, room,
//! seats, start time. Admission is authorized by the server-side order
//! check at scan time, never by payload possession alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use marquee_core::{Order, OrderStatus};

use crate::backend::{CredentialBackend, CredentialRequest, ShowtimeDetails};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Credential State
// =============================================================================

/// State of an order's admission credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    /// No credential exists for the order yet.
    NotIssued,
    /// Renderable and consumable.
    Valid,
    /// Validity window elapsed without consumption.
    Expired,
    /// Consumed at the venue. Final.
    Used,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CredentialState::NotIssued => "not_issued",
            CredentialState::Valid => "valid",
            CredentialState::Expired => "expired",
            CredentialState::Used => "used",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// QR Credential
// =============================================================================

/// The admission credential for one completed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCredential {
    pub order_id: String,

    /// The scannable payload to render.
    pub payload: String,

    pub issued_at: DateTime<Utc>,

    /// End of the validity window.
    pub expires_at: DateTime<Utc>,

    pub state: CredentialState,

    /// Whether the backend permits a fresh payload after expiry.
    pub regenerate_allowed: bool,
}

impl QrCredential {
    /// Rolls `Valid` over to `Expired` if the window has elapsed.
    fn refresh_expiry(&mut self, now: DateTime<Utc>) {
        if self.state == CredentialState::Valid && now >= self.expires_at {
            self.state = CredentialState::Expired;
        }
    }
}

// =============================================================================
// Credential Issuer
// =============================================================================

/// Issues and tracks admission credentials, one per order.
pub struct CredentialIssuer {
    backend: Arc<dyn CredentialBackend>,
    config: CheckoutConfig,
    credentials: Mutex<HashMap<String, QrCredential>>,
}

impl CredentialIssuer {
    pub fn new(backend: Arc<dyn CredentialBackend>, config: CheckoutConfig) -> Self {
        CredentialIssuer {
            backend,
            config,
            credentials: Mutex::new(HashMap::new()),
        }
    }

    /// Issues the credential for a completed order.
    ///
    /// Idempotent while a credential is already held: re-issuing returns
    /// the existing one unchanged. Only `Completed` orders qualify; a
    /// cancelled or pending order gets `CredentialUnavailable`.
    ///
    /// When the backend does not communicate a validity window, the
    /// configured grace window applies from issue time.
    pub async fn issue(
        &self,
        order: &Order,
        showtime: &ShowtimeDetails,
    ) -> CheckoutResult<QrCredential> {
        if order.status != OrderStatus::Completed {
            return Err(CheckoutError::CredentialUnavailable {
                order_id: order.order_id.clone(),
                state: CredentialState::NotIssued.to_string(),
            });
        }

        {
            let credentials = self.credentials.lock().expect("credential map poisoned");
            if let Some(existing) = credentials.get(&order.order_id) {
                return Ok(existing.clone());
            }
        }

        let request = CredentialRequest {
            order_id: order.order_id.clone(),
            holder_name: order.holder_name.clone(),
            movie_title: showtime.movie_title.clone(),
            room_name: showtime.room_name.clone(),
            seat_ids: order.source_ticket_ids.clone(),
            starts_at: showtime.starts_at,
        };

        // Backend call outside the lock.
        let record = self.backend.issue(&request).await?;

        let issued_at = Utc::now();
        let credential = QrCredential {
            order_id: order.order_id.clone(),
            payload: record.payload,
            issued_at,
            expires_at: record
                .expires_at
                .unwrap_or_else(|| issued_at + Duration::seconds(self.grace_secs())),
            state: CredentialState::Valid,
            regenerate_allowed: record.regenerate_allowed,
        };

        let mut credentials = self.credentials.lock().expect("credential map poisoned");
        let stored = credentials
            .entry(order.order_id.clone())
            .or_insert_with(|| credential.clone());

        info!(
            order_id = %order.order_id,
            expires_at = %stored.expires_at,
            "Credential issued"
        );
        Ok(stored.clone())
    }

    /// Regenerates an expired credential with a fresh payload.
    ///
    /// Only the `Expired` state with the backend's regenerate flag set
    /// qualifies; everything else is `RegenerationDenied` and the actor
    /// falls back to manual check-in.
    pub async fn regenerate(&self, order_id: &str) -> CheckoutResult<QrCredential> {
        {
            let mut credentials = self.credentials.lock().expect("credential map poisoned");
            let credential =
                credentials
                    .get_mut(order_id)
                    .ok_or_else(|| CheckoutError::RegenerationDenied {
                        order_id: order_id.to_string(),
                    })?;
            credential.refresh_expiry(Utc::now());

            if credential.state != CredentialState::Expired || !credential.regenerate_allowed {
                return Err(CheckoutError::RegenerationDenied {
                    order_id: order_id.to_string(),
                });
            }
        }

        let record = self.backend.regenerate(order_id).await?;

        let mut credentials = self.credentials.lock().expect("credential map poisoned");
        let credential =
            credentials
                .get_mut(order_id)
                .ok_or_else(|| CheckoutError::RegenerationDenied {
                    order_id: order_id.to_string(),
                })?;

        let issued_at = Utc::now();
        credential.payload = record.payload;
        credential.issued_at = issued_at;
        credential.expires_at = record
            .expires_at
            .unwrap_or_else(|| issued_at + Duration::seconds(self.grace_secs()));
        credential.state = CredentialState::Valid;
        credential.regenerate_allowed = record.regenerate_allowed;

        info!(order_id, expires_at = %credential.expires_at, "Credential regenerated");
        Ok(credential.clone())
    }

    /// Marks the credential consumed at the venue.
    ///
    /// `Valid → Used` on first consumption. A second consumption is the
    /// security-relevant case: the state stays `Used` and the caller gets
    /// `AlreadyUsed`, never a silent success.
    pub fn consume(&self, order_id: &str) -> CheckoutResult<QrCredential> {
        let mut credentials = self.credentials.lock().expect("credential map poisoned");
        let credential =
            credentials
                .get_mut(order_id)
                .ok_or_else(|| CheckoutError::CredentialUnavailable {
                    order_id: order_id.to_string(),
                    state: CredentialState::NotIssued.to_string(),
                })?;
        credential.refresh_expiry(Utc::now());

        match credential.state {
            CredentialState::Valid => {
                credential.state = CredentialState::Used;
                info!(order_id, "Credential consumed");
                Ok(credential.clone())
            }
            CredentialState::Used => {
                warn!(order_id, "Credential presented again after consumption");
                Err(CheckoutError::AlreadyUsed {
                    order_id: order_id.to_string(),
                })
            }
            state => Err(CheckoutError::CredentialUnavailable {
                order_id: order_id.to_string(),
                state: state.to_string(),
            }),
        }
    }

    /// Current view of the credential. Never errors: an unknown order
    /// reads as `NotIssued`, and an elapsed window reads as `Expired`.
    pub fn view(&self, order_id: &str) -> CredentialState {
        let mut credentials = self.credentials.lock().expect("credential map poisoned");
        match credentials.get_mut(order_id) {
            Some(credential) => {
                credential.refresh_expiry(Utc::now());
                credential.state
            }
            None => CredentialState::NotIssued,
        }
    }

    /// The held credential, if issued.
    pub fn credential(&self, order_id: &str) -> Option<QrCredential> {
        let mut credentials = self.credentials.lock().expect("credential map poisoned");
        credentials.get_mut(order_id).map(|credential| {
            credential.refresh_expiry(Utc::now());
            credential.clone()
        })
    }

    fn grace_secs(&self) -> i64 {
        i64::try_from(self.config.credential.grace_secs).unwrap_or(i64::MAX)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CredentialRecord;
    use async_trait::async_trait;
    use marquee_core::{Money, PaymentMethod};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCredentialBackend {
        regenerate_allowed: bool,
        /// Expiry the backend communicates, if any.
        expires_at: Mutex<Option<DateTime<Utc>>>,
        issue_count: AtomicUsize,
    }

    impl FakeCredentialBackend {
        fn new(regenerate_allowed: bool) -> Arc<Self> {
            Arc::new(FakeCredentialBackend {
                regenerate_allowed,
                expires_at: Mutex::new(None),
                issue_count: AtomicUsize::new(0),
            })
        }

        fn expiring_at(when: DateTime<Utc>, regenerate_allowed: bool) -> Arc<Self> {
            Arc::new(FakeCredentialBackend {
                regenerate_allowed,
                expires_at: Mutex::new(Some(when)),
                issue_count: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialBackend for FakeCredentialBackend {
        async fn issue(&self, request: &CredentialRequest) -> CheckoutResult<CredentialRecord> {
            let n = self.issue_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CredentialRecord {
                payload: format!("QR|{}|{}|gen{}", request.order_id, request.holder_name, n),
                expires_at: *self.expires_at.lock().unwrap(),
                regenerate_allowed: self.regenerate_allowed,
            })
        }

        async fn regenerate(&self, order_id: &str) -> CheckoutResult<CredentialRecord> {
            let n = self.issue_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CredentialRecord {
                payload: format!("QR|{}|regen{}", order_id, n),
                expires_at: None,
                regenerate_allowed: self.regenerate_allowed,
            })
        }
    }

    fn completed_order() -> Order {
        Order {
            order_id: "ord-1".to_string(),
            showtime_id: "st-204".to_string(),
            actor_id: "user-9".to_string(),
            holder_name: "Quang Tran".to_string(),
            source_ticket_ids: vec!["A1".to_string(), "A2".to_string()],
            concession_lines: vec![],
            total: Money::new(290_000),
            discount: Money::new(10_000),
            payment_method: PaymentMethod::Cash,
            payment_reference: Some("CASH-1".to_string()),
            earned_points: 29,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }

    fn showtime() -> ShowtimeDetails {
        ShowtimeDetails {
            movie_title: "The Long Goodbye".to_string(),
            room_name: "Room 5".to_string(),
            starts_at: Utc::now() + Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let issuer = CredentialIssuer::new(
            FakeCredentialBackend::new(false),
            CheckoutConfig::default(),
        );
        let order = completed_order();

        let credential = issuer.issue(&order, &showtime()).await.unwrap();
        assert_eq!(credential.state, CredentialState::Valid);
        assert!(credential.payload.contains("ord-1"));
        assert!(credential.payload.contains("Quang Tran"));

        let consumed = issuer.consume("ord-1").unwrap();
        assert_eq!(consumed.state, CredentialState::Used);
    }

    #[tokio::test]
    async fn test_double_consume_is_already_used() {
        let issuer = CredentialIssuer::new(
            FakeCredentialBackend::new(false),
            CheckoutConfig::default(),
        );
        issuer.issue(&completed_order(), &showtime()).await.unwrap();
        issuer.consume("ord-1").unwrap();

        let err = issuer.consume("ord-1").unwrap_err();
        assert!(matches!(err, CheckoutError::AlreadyUsed { order_id } if order_id == "ord-1"));
        // The state did not move off Used.
        assert_eq!(issuer.view("ord-1"), CredentialState::Used);
    }

    #[tokio::test]
    async fn test_issue_requires_completed_order() {
        let issuer = CredentialIssuer::new(
            FakeCredentialBackend::new(false),
            CheckoutConfig::default(),
        );
        let mut order = completed_order();
        order.status = OrderStatus::Cancelled;

        let err = issuer.issue(&order, &showtime()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::CredentialUnavailable { .. }));
        assert_eq!(issuer.view("ord-1"), CredentialState::NotIssued);
    }

    #[tokio::test]
    async fn test_reissue_returns_existing_credential() {
        let backend = FakeCredentialBackend::new(false);
        let issuer = CredentialIssuer::new(backend.clone(), CheckoutConfig::default());
        let order = completed_order();

        let first = issuer.issue(&order, &showtime()).await.unwrap();
        let second = issuer.issue(&order, &showtime()).await.unwrap();
        assert_eq!(first.payload, second.payload);
        assert_eq!(backend.issue_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_cannot_be_consumed() {
        let backend =
            FakeCredentialBackend::expiring_at(Utc::now() - Duration::seconds(1), false);
        let issuer = CredentialIssuer::new(backend, CheckoutConfig::default());
        issuer.issue(&completed_order(), &showtime()).await.unwrap();

        assert_eq!(issuer.view("ord-1"), CredentialState::Expired);
        let err = issuer.consume("ord-1").unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::CredentialUnavailable { state, .. } if state == "expired"
        ));
    }

    #[tokio::test]
    async fn test_regenerate_denied_without_flag() {
        let backend =
            FakeCredentialBackend::expiring_at(Utc::now() - Duration::seconds(1), false);
        let issuer = CredentialIssuer::new(backend, CheckoutConfig::default());
        issuer.issue(&completed_order(), &showtime()).await.unwrap();

        let err = issuer.regenerate("ord-1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::RegenerationDenied { .. }));
    }

    #[tokio::test]
    async fn test_regenerate_denied_while_still_valid() {
        let issuer = CredentialIssuer::new(
            FakeCredentialBackend::new(true),
            CheckoutConfig::default(),
        );
        issuer.issue(&completed_order(), &showtime()).await.unwrap();

        // Valid, not expired: regeneration does not apply.
        let err = issuer.regenerate("ord-1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::RegenerationDenied { .. }));
    }

    #[tokio::test]
    async fn test_regenerate_expired_credential() {
        let backend =
            FakeCredentialBackend::expiring_at(Utc::now() - Duration::seconds(1), true);
        let issuer = CredentialIssuer::new(backend, CheckoutConfig::default());
        let first = issuer.issue(&completed_order(), &showtime()).await.unwrap();
        assert_eq!(issuer.view("ord-1"), CredentialState::Expired);

        let fresh = issuer.regenerate("ord-1").await.unwrap();
        assert_eq!(fresh.state, CredentialState::Valid);
        assert_ne!(fresh.payload, first.payload);

        // The regenerated credential admits exactly once, like any other.
        issuer.consume("ord-1").unwrap();
        assert!(matches!(
            issuer.consume("ord-1").unwrap_err(),
            CheckoutError::AlreadyUsed { .. }
        ));
    }

    #[tokio::test]
    async fn test_grace_window_applies_when_backend_silent() {
        let issuer = CredentialIssuer::new(
            FakeCredentialBackend::new(false),
            CheckoutConfig::default(),
        );
        let credential = issuer.issue(&completed_order(), &showtime()).await.unwrap();

        let window = credential.expires_at - credential.issued_at;
        assert_eq!(window.num_seconds(), 900);
    }
}
