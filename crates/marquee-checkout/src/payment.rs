//! # Payment Orchestrator
//!
//! Drives settlement: builds the checkout payload, dispatches to one of
//! two payment paths, and reconciles to a terminal state exactly once.
//!
//! ## Attempt State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Payment Attempt Lifecycle                            │
//! │                                                                         │
//! │              ┌──► CASH_PENDING ──confirm──► SETTLED                    │
//! │  initiate ───┤                                  ▲                       │
//! │              └──► GATEWAY_INITIATED             │                       │
//! │                        │                        │                       │
//! │                        ▼                        │                       │
//! │                GATEWAY_REDIRECTED ──┬─ callback "00" ──┐               │
//! │                        │            │                   ├─► try_settle │
//! │                        │            └─ poll "settled" ──┘               │
//! │                        │                                                │
//! │                        ├──► FAILED     (provider code ≠ "00")          │
//! │                        └──► ABANDONED  (cancel / expiry / new method)  │
//! │                                                                         │
//! │  SETTLEMENT GATE (first-writer-wins):                                  │
//! │  ──────────────────────────────────                                    │
//! │  Callback and poll race; both call the same idempotent try_settle.     │
//! │  Writes serialize through one mutex, so the second signal finds the    │
//! │  attempt already SETTLED and is a no-op by construction, never a       │
//! │  duplicate Order.                                                       │
//! │                                                                         │
//! │  On SETTLED: Order(COMPLETED) built from the FROZEN initiate payload,  │
//! │  earned points computed, session sealed, poll driver stopped.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No automatic retries anywhere: retrying a settlement automatically
//! risks double-charge semantics, so every retry is an explicit caller
//! action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use marquee_core::{Money, Order, OrderStatus, PaymentMethod, PROVIDER_SUCCESS_CODE};

use crate::backend::{CheckoutPayload, GatewayRedirect, PollStatus, SettlementBackend};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::session::{SessionKey, SessionManager};

// =============================================================================
// Attempt State
// =============================================================================

/// The state of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Payload built, path not yet taken.
    New,
    /// Waiting for staff to attest physical cash receipt.
    CashPending,
    /// Redirect requested from the gateway.
    GatewayInitiated,
    /// Redirect issued; callback and polling both live.
    GatewayRedirected,
    /// Success terminal state; the Order exists.
    Settled,
    /// Provider declined.
    Failed,
    /// Discarded without settlement (cancel, expiry, method switch).
    Abandoned,
}

impl AttemptState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Settled | AttemptState::Failed | AttemptState::Abandoned
        )
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptState::New => "new",
            AttemptState::CashPending => "cash_pending",
            AttemptState::GatewayInitiated => "gateway_initiated",
            AttemptState::GatewayRedirected => "gateway_redirected",
            AttemptState::Settled => "settled",
            AttemptState::Failed => "failed",
            AttemptState::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Payment Attempt
// =============================================================================

/// One settlement attempt for one session. At most one is live per
/// session; a new method selection replaces it.
#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub attempt_id: String,
    pub method: PaymentMethod,
    pub state: AttemptState,
    /// Request snapshot frozen at initiate time. The Order is built from
    /// this, never from a re-read of the session.
    pub payload: CheckoutPayload,
    /// Gateway artifacts (redirect URL / QR). Discarded without backend
    /// side effects when a new method is selected.
    pub redirect: Option<GatewayRedirect>,
    /// Provider transaction reference or cash receipt reference.
    pub external_ref: Option<String>,
    /// Set once settled.
    pub order_id: Option<String>,
    /// Name the eventual credential is issued to.
    holder_name: String,
}

/// What `initiate` hands back to the caller.
#[derive(Debug, Clone)]
pub enum InitiateOutcome {
    /// Cash path: await the staff confirm step.
    CashPending { attempt_id: String, amount: Money },
    /// Gateway path: send the actor to the external payment surface.
    GatewayRedirect {
        attempt_id: String,
        redirect: GatewayRedirect,
    },
}

// =============================================================================
// Payment Orchestrator
// =============================================================================

struct OrchestratorInner {
    sessions: SessionManager,
    backend: Arc<dyn SettlementBackend>,
    config: CheckoutConfig,
    /// The settlement gate: every write to attempt/Order state serializes
    /// through this mutex. Never held across an await point.
    attempts: Mutex<HashMap<SessionKey, PaymentAttempt>>,
    /// Completed orders by order id.
    orders: Mutex<HashMap<String, Order>>,
    /// Shutdown senders for the per-attempt poll drivers.
    pollers: Mutex<HashMap<SessionKey, mpsc::Sender<()>>>,
}

/// Orchestrates cash and gateway settlement for live sessions.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl PaymentOrchestrator {
    pub fn new(
        sessions: SessionManager,
        backend: Arc<dyn SettlementBackend>,
        config: CheckoutConfig,
    ) -> Self {
        PaymentOrchestrator {
            inner: Arc::new(OrchestratorInner {
                sessions,
                backend,
                config,
                attempts: Mutex::new(HashMap::new()),
                orders: Mutex::new(HashMap::new()),
                pollers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts a settlement attempt for the session.
    ///
    /// Validates the session (live, holds seats, positive total), builds
    /// the frozen checkout payload, and dispatches on the method. Any
    /// previously live attempt for the session is discarded: its
    /// redirect/QR artifacts vanish with no backend side effects.
    ///
    /// ## Errors
    /// - `SessionMissing`: no live session (e.g. the hold expired)
    /// - `EmptySelection`: no seats held
    /// - `NonPositiveTotal`: fully-discounted carts cannot settle
    /// - `GatewayUnreachable`: redirect could not be built; the session
    ///   stays active so the actor may retry or pick the other method
    pub async fn initiate(
        &self,
        key: &SessionKey,
        method: PaymentMethod,
        holder_name: &str,
    ) -> CheckoutResult<InitiateOutcome> {
        debug!(showtime_id = %key.showtime_id, ?method, "initiate payment");

        let snapshot = self
            .inner
            .sessions
            .snapshot(key)
            .ok_or_else(|| CheckoutError::SessionMissing {
                showtime_id: key.showtime_id.clone(),
                actor_id: key.actor_id.clone(),
            })?;

        if snapshot.seat_ids.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        let total = snapshot.summary.total;
        if !total.is_positive() {
            return Err(CheckoutError::NonPositiveTotal {
                total: total.to_string(),
            });
        }

        let payload = CheckoutPayload {
            ticket_ids: snapshot.seat_ids.clone(),
            concession_lines: snapshot.concession_lines.clone(),
            total,
            discount: snapshot.summary.discount,
            amount: total,
            payment_code: generate_payment_code(),
            showtime_id: key.showtime_id.clone(),
            actor_id: key.actor_id.clone(),
        };

        // Discard any previously live attempt before taking the new path.
        self.discard_live_attempt(key);

        let attempt_id = Uuid::new_v4().to_string();
        match method {
            PaymentMethod::Cash => {
                let attempt = PaymentAttempt {
                    attempt_id: attempt_id.clone(),
                    method,
                    state: AttemptState::CashPending,
                    payload,
                    redirect: None,
                    external_ref: None,
                    order_id: None,
                    holder_name: holder_name.to_string(),
                };
                let amount = attempt.payload.amount;
                self.inner
                    .attempts
                    .lock()
                    .expect("attempt map poisoned")
                    .insert(key.clone(), attempt);

                info!(showtime_id = %key.showtime_id, %amount, "Cash attempt pending confirmation");
                Ok(InitiateOutcome::CashPending { attempt_id, amount })
            }

            PaymentMethod::Gateway => {
                // Backend call happens outside any lock.
                let redirect = match self.inner.backend.create_redirect(&payload).await {
                    Ok(redirect) => redirect,
                    Err(err) => {
                        // Attempt never goes live; session stays active
                        // so the actor can retry or switch method.
                        warn!(
                            showtime_id = %key.showtime_id,
                            error = %err,
                            "Gateway redirect failed; attempt not started"
                        );
                        return Err(err);
                    }
                };

                let attempt = PaymentAttempt {
                    attempt_id: attempt_id.clone(),
                    method,
                    state: AttemptState::GatewayRedirected,
                    payload,
                    redirect: Some(redirect.clone()),
                    external_ref: None,
                    order_id: None,
                    holder_name: holder_name.to_string(),
                };
                let payment_code = attempt.payload.payment_code.clone();
                self.inner
                    .attempts
                    .lock()
                    .expect("attempt map poisoned")
                    .insert(key.clone(), attempt);

                self.spawn_poll_driver(key.clone(), payment_code);
                info!(
                    showtime_id = %key.showtime_id,
                    redirect_url = %redirect.redirect_url,
                    "Gateway attempt redirected; polling started"
                );
                Ok(InitiateOutcome::GatewayRedirect {
                    attempt_id,
                    redirect,
                })
            }
        }
    }

    /// Staff attests physical cash receipt.
    ///
    /// Authoritative and final on first success: no callback exists on
    /// this path.
    pub async fn confirm_cash(&self, key: &SessionKey) -> CheckoutResult<Order> {
        let payload = {
            let attempts = self.inner.attempts.lock().expect("attempt map poisoned");
            let attempt = attempts.get(key).ok_or(CheckoutError::AttemptMissing)?;
            if attempt.state != AttemptState::CashPending {
                return Err(CheckoutError::InvalidAttemptState {
                    state: attempt.state.to_string(),
                    operation: "confirm cash".to_string(),
                });
            }
            attempt.payload.clone()
        };

        let reference = self.inner.backend.confirm_cash(&payload).await?;
        OrchestratorInner::try_settle(&self.inner, key, reference)
    }

    /// The gateway callback surface: the application is re-entered with
    /// a provider response code and transaction reference.
    ///
    /// Code `"00"` settles the attempt; any other code marks it failed
    /// without settling. A duplicate success signal (callback after poll
    /// or vice versa) is a safe no-op returning the already-built Order.
    pub async fn handle_callback(
        &self,
        key: &SessionKey,
        code: &str,
        txn_ref: &str,
    ) -> CheckoutResult<Order> {
        debug!(showtime_id = %key.showtime_id, code, "gateway callback");

        if code != PROVIDER_SUCCESS_CODE {
            let mut attempts = self.inner.attempts.lock().expect("attempt map poisoned");
            if let Some(attempt) = attempts.get_mut(key) {
                if !attempt.state.is_terminal() {
                    attempt.state = AttemptState::Failed;
                }
            }
            drop(attempts);
            self.stop_poll_driver(key);
            warn!(showtime_id = %key.showtime_id, code, "Provider declined payment");
            return Err(CheckoutError::ProviderFailure {
                code: code.to_string(),
            });
        }

        OrchestratorInner::try_settle(&self.inner, key, txn_ref.to_string())
    }

    /// Abandons the live attempt and cancels the session.
    ///
    /// Stops the poll driver, marks the attempt `Abandoned`, and tears
    /// the session down; no Order is ever left `Pending`.
    pub fn cancel(&self, key: &SessionKey) -> CheckoutResult<()> {
        self.stop_poll_driver(key);

        {
            let mut attempts = self.inner.attempts.lock().expect("attempt map poisoned");
            if let Some(attempt) = attempts.get_mut(key) {
                if !attempt.state.is_terminal() {
                    attempt.state = AttemptState::Abandoned;
                }
            }
        }

        self.inner.sessions.cancel(key)
    }

    /// Current attempt for the session, if any.
    pub fn attempt(&self, key: &SessionKey) -> Option<PaymentAttempt> {
        self.inner
            .attempts
            .lock()
            .expect("attempt map poisoned")
            .get(key)
            .cloned()
    }

    /// Looks up a completed order.
    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.inner
            .orders
            .lock()
            .expect("order map poisoned")
            .get(order_id)
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Drops a non-terminal attempt and its poll driver. The gateway is
    /// not notified: redirect artifacts simply stop being honored here.
    fn discard_live_attempt(&self, key: &SessionKey) {
        self.stop_poll_driver(key);
        let mut attempts = self.inner.attempts.lock().expect("attempt map poisoned");
        if let Some(attempt) = attempts.get(key) {
            if attempt.state.is_terminal() {
                return;
            }
            debug!(
                showtime_id = %key.showtime_id,
                state = %attempt.state,
                "Discarding live attempt for new method selection"
            );
            attempts.remove(key);
        }
    }

    /// Spawns the 3-second status-poll driver for a redirected attempt.
    fn spawn_poll_driver(&self, key: SessionKey, payment_code: String) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        {
            let mut pollers = self.inner.pollers.lock().expect("poller map poisoned");
            pollers.insert(key.clone(), shutdown_tx.clone());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(inner.config.gateway.poll_interval_secs);
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Stop the instant settlement (or failure) is
                        // observed on either channel.
                        let live = {
                            let attempts = inner.attempts.lock().expect("attempt map poisoned");
                            attempts
                                .get(&key)
                                .map(|a| !a.state.is_terminal())
                                .unwrap_or(false)
                        };
                        if !live {
                            break;
                        }

                        match inner.backend.poll_status(&payment_code).await {
                            Ok(PollStatus::Settled { txn_ref }) => {
                                match OrchestratorInner::try_settle(&inner, &key, txn_ref) {
                                    Ok(order) => {
                                        debug!(order_id = %order.order_id, "Poll observed settlement");
                                    }
                                    Err(err) => {
                                        // A racing callback may have won and
                                        // sealed everything; that is the
                                        // no-op this gate exists for.
                                        debug!(error = %err, "Poll settle was a no-op");
                                    }
                                }
                                break;
                            }
                            Ok(PollStatus::Failed { code }) => {
                                let mut attempts =
                                    inner.attempts.lock().expect("attempt map poisoned");
                                if let Some(attempt) = attempts.get_mut(&key) {
                                    if !attempt.state.is_terminal() {
                                        attempt.state = AttemptState::Failed;
                                    }
                                }
                                warn!(showtime_id = %key.showtime_id, code, "Poll observed provider failure");
                                break;
                            }
                            Ok(PollStatus::Pending) => {}
                            Err(err) => {
                                // Transient poll failure: the next cycle
                                // will ask again; no tighter retry loop.
                                warn!(error = %err, "Status poll failed");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!(showtime_id = %key.showtime_id, "Poll driver received shutdown");
                        break;
                    }
                }
            }

            // Deregister only our own sender: a replacement attempt may
            // already have registered its driver under this key.
            let mut pollers = inner.pollers.lock().expect("poller map poisoned");
            if pollers
                .get(&key)
                .is_some_and(|tx| tx.same_channel(&shutdown_tx))
            {
                pollers.remove(&key);
            }
            debug!(showtime_id = %key.showtime_id, "Poll driver stopped");
        });
    }

    /// Stops the poll driver, at most once.
    fn stop_poll_driver(&self, key: &SessionKey) {
        let sender = {
            let mut pollers = self.inner.pollers.lock().expect("poller map poisoned");
            pollers.remove(key)
        };
        if let Some(sender) = sender {
            let _ = sender.try_send(());
        }
    }
}

impl OrchestratorInner {
    /// The idempotent settlement gate. Both resolution channels call
    /// this; the attempt mutex serializes them and the state check makes
    /// the second caller a no-op that returns the existing Order.
    fn try_settle(
        inner: &Arc<OrchestratorInner>,
        key: &SessionKey,
        reference: String,
    ) -> CheckoutResult<Order> {
        let mut attempts = inner.attempts.lock().expect("attempt map poisoned");
        let attempt = attempts.get_mut(key).ok_or(CheckoutError::AttemptMissing)?;

        match attempt.state {
            AttemptState::Settled => {
                // First writer already won; hand back its Order.
                let order_id = attempt
                    .order_id
                    .clone()
                    .ok_or_else(|| CheckoutError::OrderNotFound("<unset>".to_string()))?;
                let orders = inner.orders.lock().expect("order map poisoned");
                return orders
                    .get(&order_id)
                    .cloned()
                    .ok_or(CheckoutError::OrderNotFound(order_id));
            }
            AttemptState::Failed | AttemptState::Abandoned => {
                return Err(CheckoutError::InvalidAttemptState {
                    state: attempt.state.to_string(),
                    operation: "settle".to_string(),
                });
            }
            _ => {}
        }

        // Seal the session. If it vanished (expired mid-payment), the
        // attempt is abandoned and no Order is created.
        if let Err(err) = inner.sessions.seal(key) {
            attempt.state = AttemptState::Abandoned;
            warn!(
                showtime_id = %key.showtime_id,
                error = %err,
                "Settlement arrived for a dead session; attempt abandoned"
            );
            return Err(err);
        }

        let payload = &attempt.payload;
        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            showtime_id: payload.showtime_id.clone(),
            actor_id: payload.actor_id.clone(),
            holder_name: attempt.holder_name.clone(),
            source_ticket_ids: payload.ticket_ids.clone(),
            concession_lines: payload.concession_lines.clone(),
            total: payload.total,
            discount: payload.discount,
            payment_method: attempt.method,
            payment_reference: Some(reference.clone()),
            earned_points: payload.total.earned_points(inner.config.loyalty.earn_divisor),
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        };

        attempt.state = AttemptState::Settled;
        attempt.external_ref = Some(reference);
        attempt.order_id = Some(order.order_id.clone());

        inner
            .orders
            .lock()
            .expect("order map poisoned")
            .insert(order.order_id.clone(), order.clone());

        // The poll driver observes the terminal state on its next wake,
        // but signal it anyway so it never fires again.
        let sender = {
            let mut pollers = inner.pollers.lock().expect("poller map poisoned");
            pollers.remove(key)
        };
        if let Some(sender) = sender {
            let _ = sender.try_send(());
        }

        info!(
            order_id = %order.order_id,
            showtime_id = %order.showtime_id,
            method = ?order.payment_method,
            total = %order.total,
            earned_points = order.earned_points,
            "Payment settled; order completed"
        );
        Ok(order)
    }
}

// =============================================================================
// Payment Code Generation
// =============================================================================

/// Correlates one attempt across redirect, callback, and polling.
fn generate_payment_code() -> String {
    let now = Utc::now();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("MQ-{}-{:04}", now.format("%y%m%d%H%M%S"), nanos % 10_000)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoOpRelease;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scriptable settlement backend for tests.
    struct FakeBackend {
        /// Polls answered `Pending` before a `Settled` answer.
        settle_after_polls: Option<usize>,
        poll_count: AtomicUsize,
        unreachable: bool,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(FakeBackend {
                settle_after_polls: None,
                poll_count: AtomicUsize::new(0),
                unreachable: false,
            })
        }

        fn settling_after(polls: usize) -> Arc<Self> {
            Arc::new(FakeBackend {
                settle_after_polls: Some(polls),
                poll_count: AtomicUsize::new(0),
                unreachable: false,
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(FakeBackend {
                settle_after_polls: None,
                poll_count: AtomicUsize::new(0),
                unreachable: true,
            })
        }
    }

    #[async_trait]
    impl SettlementBackend for FakeBackend {
        async fn create_redirect(
            &self,
            payload: &CheckoutPayload,
        ) -> CheckoutResult<GatewayRedirect> {
            if self.unreachable {
                return Err(CheckoutError::GatewayUnreachable("connect refused".into()));
            }
            Ok(GatewayRedirect {
                redirect_url: format!("https://pay.example/{}", payload.payment_code),
                qr_payload: Some(format!("PAY:{}", payload.payment_code)),
            })
        }

        async fn poll_status(&self, _payment_code: &str) -> CheckoutResult<PollStatus> {
            let n = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
            match self.settle_after_polls {
                Some(after) if n > after => Ok(PollStatus::Settled {
                    txn_ref: format!("TXN-POLL-{}", n),
                }),
                _ => Ok(PollStatus::Pending),
            }
        }

        async fn confirm_cash(&self, payload: &CheckoutPayload) -> CheckoutResult<String> {
            Ok(format!("CASH-{}", payload.payment_code))
        }
    }

    fn setup(backend: Arc<dyn SettlementBackend>) -> (SessionManager, PaymentOrchestrator, SessionKey) {
        let config = CheckoutConfig::default();
        let sessions = SessionManager::new(config.clone(), Arc::new(NoOpRelease));
        let orchestrator = PaymentOrchestrator::new(sessions.clone(), backend, config);
        (sessions, orchestrator, SessionKey::new("st-204", "user-9"))
    }

    /// Builds the reference cart: seats A1+A2, 2 concession units at
    /// 50,000, 10 points redeemed → total 290,000.
    fn build_reference_cart(sessions: &SessionManager, key: &SessionKey) {
        sessions.start(&key.showtime_id, &key.actor_id);
        sessions
            .upsert_seats(key, &["A1".to_string(), "A2".to_string()])
            .unwrap();
        sessions
            .upsert_concessions(
                key,
                vec![marquee_core::ConcessionLine {
                    item_id: "popcorn-l".into(),
                    name: "Popcorn (L)".into(),
                    unit_price: Money::new(50_000),
                    quantity: 2,
                }],
            )
            .unwrap();
        sessions.apply_redemption(key, 10, 120).unwrap();
    }

    #[tokio::test]
    async fn test_cash_checkout_settles_immediately() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        build_reference_cart(&sessions, &key);

        let outcome = orchestrator
            .initiate(&key, PaymentMethod::Cash, "Quang Tran")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            InitiateOutcome::CashPending { amount, .. } if amount == Money::new(290_000)
        ));

        let order = orchestrator.confirm_cash(&key).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total, Money::new(290_000));
        assert_eq!(order.discount, Money::new(10_000));
        assert_eq!(order.earned_points, 29);
        assert_eq!(order.payment_method, PaymentMethod::Cash);

        // Session is sealed and gone.
        assert!(sessions.snapshot(&key).is_none());
        // The attempt reached its success terminal state.
        assert_eq!(
            orchestrator.attempt(&key).unwrap().state,
            AttemptState::Settled
        );
    }

    #[tokio::test]
    async fn test_initiate_rejects_empty_selection() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        sessions.start(&key.showtime_id, &key.actor_id);

        let err = orchestrator
            .initiate(&key, PaymentMethod::Cash, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptySelection));
    }

    #[tokio::test]
    async fn test_initiate_rejects_missing_session() {
        let (_sessions, orchestrator, key) = setup(FakeBackend::new());
        let err = orchestrator
            .initiate(&key, PaymentMethod::Cash, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SessionMissing { .. }));
    }

    #[tokio::test]
    async fn test_initiate_rejects_zero_total() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        sessions.start(&key.showtime_id, &key.actor_id);
        sessions.upsert_seats(&key, &["A1".to_string()]).unwrap();
        // 100 points at 1,000 swallow the whole 100,000 subtotal.
        sessions.apply_redemption(&key, 100, 500).unwrap();

        let err = orchestrator
            .initiate(&key, PaymentMethod::Cash, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NonPositiveTotal { .. }));
        // Session untouched, actor can shrink the redemption and retry.
        assert!(sessions.snapshot(&key).is_some());
    }

    #[tokio::test]
    async fn test_gateway_unreachable_leaves_session_active() {
        let (sessions, orchestrator, key) = setup(FakeBackend::unreachable());
        build_reference_cart(&sessions, &key);

        let err = orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::GatewayUnreachable(_)));

        // Session preserved for retry; no attempt went live.
        assert!(sessions.snapshot(&key).is_some());
        assert!(orchestrator.attempt(&key).is_none());
    }

    #[tokio::test]
    async fn test_callback_success_settles_once() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "Quang Tran")
            .await
            .unwrap();

        let order = orchestrator
            .handle_callback(&key, "00", "TXN-CB-1")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.payment_reference.as_deref(), Some("TXN-CB-1"));

        // Duplicate settlement signal: safe no-op, same Order, no second
        // Order created.
        let again = orchestrator
            .handle_callback(&key, "00", "TXN-LATE-POLL")
            .await
            .unwrap();
        assert_eq!(again.order_id, order.order_id);
        assert_eq!(again.payment_reference.as_deref(), Some("TXN-CB-1"));
    }

    #[tokio::test]
    async fn test_callback_failure_code_fails_without_settling() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();

        let err = orchestrator
            .handle_callback(&key, "51", "TXN-NO")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProviderFailure { code } if code == "51"));
        assert_eq!(
            orchestrator.attempt(&key).unwrap().state,
            AttemptState::Failed
        );
        // No order was created.
        assert!(orchestrator.attempt(&key).unwrap().order_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_settles_after_two_cycles() {
        let backend = FakeBackend::settling_after(2);
        let (sessions, orchestrator, key) = setup(backend.clone());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "Quang Tran")
            .await
            .unwrap();

        // Two pending cycles at 3s, settlement on the third.
        tokio::time::sleep(Duration::from_secs(12)).await;

        let attempt = orchestrator.attempt(&key).unwrap();
        assert_eq!(attempt.state, AttemptState::Settled);
        let order = orchestrator.order(attempt.order_id.as_deref().unwrap()).unwrap();
        assert_eq!(order.total, Money::new(290_000));

        // Polling stopped at settlement: no further backend queries even
        // long after.
        let polls_at_settle = backend.poll_count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.poll_count.load(Ordering::SeqCst), polls_at_settle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_wins_then_poll_is_noop() {
        let backend = FakeBackend::settling_after(5);
        let (sessions, orchestrator, key) = setup(backend.clone());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();

        // Callback arrives before the first poll cycle.
        let order = orchestrator
            .handle_callback(&key, "00", "TXN-CB")
            .await
            .unwrap();

        // Give the poll driver plenty of cycles; it must observe the
        // terminal state and never settle a second time.
        tokio::time::sleep(Duration::from_secs(30)).await;

        let attempt = orchestrator.attempt(&key).unwrap();
        assert_eq!(attempt.order_id.as_deref(), Some(order.order_id.as_str()));
        assert_eq!(attempt.external_ref.as_deref(), Some("TXN-CB"));
    }

    #[tokio::test]
    async fn test_new_method_selection_discards_gateway_artifacts() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();
        assert!(orchestrator.attempt(&key).unwrap().redirect.is_some());

        // Switching to cash replaces the attempt; redirect/QR are gone.
        orchestrator
            .initiate(&key, PaymentMethod::Cash, "x")
            .await
            .unwrap();
        let attempt = orchestrator.attempt(&key).unwrap();
        assert_eq!(attempt.method, PaymentMethod::Cash);
        assert!(attempt.redirect.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitiate_keeps_replacement_poll_driver_registered() {
        let (sessions, orchestrator, key) = setup(FakeBackend::settling_after(100));
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();
        // Replace the attempt; the first driver is signalled to stop.
        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();

        // Let the first driver run its wind-down.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The replacement driver's shutdown sender must still be
        // registered, or settlement could not signal it.
        assert!(orchestrator.inner.pollers.lock().unwrap().contains_key(&key));

        orchestrator
            .handle_callback(&key, "00", "TXN-CB")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        // Settlement stopped the live driver and it deregistered itself.
        assert!(!orchestrator.inner.pollers.lock().unwrap().contains_key(&key));
    }

    #[tokio::test]
    async fn test_cancel_abandons_attempt_and_session() {
        let (sessions, orchestrator, key) = setup(FakeBackend::new());
        build_reference_cart(&sessions, &key);

        orchestrator
            .initiate(&key, PaymentMethod::Gateway, "x")
            .await
            .unwrap();
        orchestrator.cancel(&key).unwrap();

        assert_eq!(
            orchestrator.attempt(&key).unwrap().state,
            AttemptState::Abandoned
        );
        assert!(sessions.snapshot(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_then_checkout_fails_session_missing() {
        let backend = FakeBackend::new();
        let config = {
            let mut c = CheckoutConfig::default();
            c.hold.duration_secs = 2;
            c
        };
        let sessions = SessionManager::new(config.clone(), Arc::new(NoOpRelease));
        let orchestrator = PaymentOrchestrator::new(sessions.clone(), backend, config);
        let key = SessionKey::new("st-204", "user-9");

        sessions.start(&key.showtime_id, &key.actor_id);
        sessions.upsert_seats(&key, &["A1".to_string()]).unwrap();

        // Hold runs out with no checkout.
        tokio::time::sleep(Duration::from_secs(4)).await;

        let err = orchestrator
            .initiate(&key, PaymentMethod::Cash, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SessionMissing { .. }));
    }
}
