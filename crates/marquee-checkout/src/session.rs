//! # Reservation Session
//!
//! The exclusive, time-bounded hold a customer has over selected seats
//! before checkout.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reservation Session Lifecycle                        │
//! │                                                                         │
//! │  start(showtime, actor) ──► ACTIVE ──────┬──► CHECKED_OUT (settlement) │
//! │  (idempotent create)          │          ├──► CANCELLED   (explicit)   │
//! │                               │          └──► EXPIRED     (countdown)  │
//! │                               │                                         │
//! │     upsert_seats ─────────────┤  every mutation reprices the cart      │
//! │     upsert_concessions ───────┤  (summary never cached)                │
//! │     apply_redemption ─────────┘                                         │
//! │                                                                         │
//! │  COUNTDOWN DRIVER (one task per live session):                         │
//! │  ────────────────────────────────────────────                          │
//! │  every 1s ──► tick() ──► remaining−1 ──► 0 ──► EXPIRED                 │
//! │                                          │                              │
//! │                                          ├──► release seat locks       │
//! │                                          └──► discard session          │
//! │                                                                         │
//! │  The driver stops EXACTLY ONCE on any transition out of ACTIVE;        │
//! │  a lingering timer after teardown is a defect.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The hold window is fixed at session creation: cart activity does not
//! extend `expires_at`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use marquee_core::{
    pricing, validation, Cart, CartLine, ConcessionLine, LoyaltyRedemption, PriceSummary,
    MAX_SEATS_PER_SESSION,
};

use crate::backend::SeatLockRelease;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Session State
// =============================================================================

/// The state of a reservation session. Everything but `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Holding seats, accepting mutations, countdown running.
    Active,
    /// Settlement sealed the session.
    CheckedOut,
    /// The actor explicitly abandoned the session.
    Cancelled,
    /// The hold window ran out.
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::CheckedOut => write!(f, "checked_out"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Expired => write!(f, "expired"),
        }
    }
}

// =============================================================================
// Session Key
// =============================================================================

/// Identity of a session: one per (showtime, actor) pair, private to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub showtime_id: String,
    pub actor_id: String,
}

impl SessionKey {
    pub fn new(showtime_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        SessionKey {
            showtime_id: showtime_id.into(),
            actor_id: actor_id.into(),
        }
    }
}

// =============================================================================
// Reservation Session
// =============================================================================

/// The externally-held cart plus its countdown-gated hold.
#[derive(Debug, Clone)]
pub struct ReservationSession {
    pub key: SessionKey,
    pub cart: Cart,
    /// Currently applied loyalty redemption, if any. A rejected
    /// redemption never reaches this field.
    pub redemption: Option<LoyaltyRedemption>,
    pub created_at: DateTime<Utc>,
    pub hold_duration_secs: u64,
    remaining_secs: u64,
    pub state: SessionState,
}

impl ReservationSession {
    /// Creates a fresh active session with a full hold window.
    pub fn new(key: SessionKey, hold_duration_secs: u64) -> Self {
        ReservationSession {
            key,
            cart: Cart::new(),
            redemption: None,
            created_at: Utc::now(),
            hold_duration_secs,
            remaining_secs: hold_duration_secs,
            state: SessionState::Active,
        }
    }

    /// The fixed hold deadline: `created_at + hold_duration`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.hold_duration_secs as i64)
    }

    /// Seconds left on the hold.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Advances the countdown by one second.
    ///
    /// Returns `true` exactly when this call transitions the session
    /// from `Active` to `Expired`. Calls on a non-active session are
    /// no-ops, so the transition fires at most once.
    pub fn tick(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = SessionState::Expired;
            return true;
        }
        false
    }

    /// Seals the session for settlement.
    ///
    /// Valid only from `Active` with at least one seat held.
    pub fn checkout(&mut self) -> CheckoutResult<()> {
        if self.state != SessionState::Active {
            return Err(CheckoutError::SessionNotActive {
                state: self.state.to_string(),
            });
        }
        if !self.cart.has_seats() {
            return Err(CheckoutError::EmptySelection);
        }
        self.state = SessionState::CheckedOut;
        Ok(())
    }

    /// Abandons the session.
    pub fn cancel(&mut self) -> CheckoutResult<()> {
        if self.state != SessionState::Active {
            return Err(CheckoutError::SessionNotActive {
                state: self.state.to_string(),
            });
        }
        self.state = SessionState::Cancelled;
        Ok(())
    }

    /// Recomputes the derived price view from current lines.
    pub fn summary(&self) -> PriceSummary {
        pricing::summarize(&self.cart, self.redemption.as_ref())
    }

    fn ensure_active(&self) -> CheckoutResult<()> {
        if self.state != SessionState::Active {
            return Err(CheckoutError::SessionNotActive {
                state: self.state.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Session Snapshot
// =============================================================================

/// Read-only view of a session handed to callers and to the payment
/// orchestrator. Mutating the snapshot never touches the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub state: SessionState,
    pub lines: Vec<CartLine>,
    pub seat_ids: Vec<String>,
    pub concession_lines: Vec<ConcessionLine>,
    pub redemption: Option<LoyaltyRedemption>,
    pub summary: PriceSummary,
    pub expires_at: DateTime<Utc>,
    pub remaining_secs: u64,
}

impl From<&ReservationSession> for SessionSnapshot {
    fn from(session: &ReservationSession) -> Self {
        SessionSnapshot {
            key: session.key.clone(),
            state: session.state,
            lines: session.cart.lines(),
            seat_ids: session.cart.seat_ids(),
            concession_lines: session.cart.concession_lines(),
            redemption: session.redemption,
            summary: session.summary(),
            expires_at: session.expires_at(),
            remaining_secs: session.remaining_secs(),
        }
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Outcome of one driver tick, telling the countdown task whether to keep
/// running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Stop,
}

struct ManagerInner {
    config: CheckoutConfig,
    locks: Arc<dyn SeatLockRelease>,
    /// Live sessions keyed by (showtime, actor). Terminal sessions are
    /// removed immediately, so the map holds only `Active` entries.
    sessions: Mutex<HashMap<SessionKey, ReservationSession>>,
    /// Shutdown senders for the per-session countdown drivers. An entry
    /// is removed exactly once, on whichever terminal transition fires
    /// first.
    drivers: Mutex<HashMap<SessionKey, mpsc::Sender<()>>>,
}

/// Owns every reservation session and its countdown driver.
///
/// ## Thread Safety
/// Session state lives behind a `Mutex`-guarded map; the countdown
/// driver, the payment orchestrator, and caller mutations all serialize
/// through it. Locks are never held across an await point.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Creates a manager with the given config and seat-lock collaborator.
    pub fn new(config: CheckoutConfig, locks: Arc<dyn SeatLockRelease>) -> Self {
        SessionManager {
            inner: Arc::new(ManagerInner {
                config,
                locks,
                sessions: Mutex::new(HashMap::new()),
                drivers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates the session for (showtime, actor), or returns the existing
    /// one unchanged (idempotent).
    ///
    /// A new session spawns its 1-second countdown driver; calling
    /// `start` again never spawns a second one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, showtime_id: &str, actor_id: &str) -> SessionSnapshot {
        let key = SessionKey::new(showtime_id, actor_id);

        let (snapshot, created) = {
            let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
            match sessions.get(&key) {
                Some(existing) => (SessionSnapshot::from(existing), false),
                None => {
                    let session =
                        ReservationSession::new(key.clone(), self.inner.config.hold.duration_secs);
                    let snapshot = SessionSnapshot::from(&session);
                    sessions.insert(key.clone(), session);
                    (snapshot, true)
                }
            }
        };

        if created {
            info!(
                showtime_id = %key.showtime_id,
                actor_id = %key.actor_id,
                hold_secs = self.inner.config.hold.duration_secs,
                "Reservation session created"
            );
            self.spawn_countdown(key);
        } else {
            debug!(
                showtime_id = %key.showtime_id,
                actor_id = %key.actor_id,
                "Reservation session already live, returning it"
            );
        }

        snapshot
    }

    /// Returns a read-only view of the session, if live.
    pub fn snapshot(&self, key: &SessionKey) -> Option<SessionSnapshot> {
        let sessions = self.inner.sessions.lock().expect("session map poisoned");
        sessions.get(key).map(SessionSnapshot::from)
    }

    /// Replaces the full seat-line set for this session's showtime.
    ///
    /// The seat picker submits its complete current selection; this
    /// supersedes the prior seat set. Concession lines are untouched and
    /// the summary is recomputed.
    pub fn upsert_seats(&self, key: &SessionKey, seat_ids: &[String]) -> CheckoutResult<PriceSummary> {
        if seat_ids.len() > MAX_SEATS_PER_SESSION {
            return Err(marquee_core::CoreError::TooManySeats {
                max: MAX_SEATS_PER_SESSION,
            }
            .into());
        }

        let table = self.inner.config.price_table();
        let mut lines = Vec::with_capacity(seat_ids.len());
        for seat_id in seat_ids {
            validation::validate_seat_id(seat_id).map_err(marquee_core::CoreError::from)?;
            lines.push(table.seat_line(seat_id)?);
        }

        let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
        let session = sessions.get_mut(key).ok_or_else(|| self.missing(key))?;
        session.ensure_active()?;
        session.cart.merge_seats(lines);
        let summary = session.summary();
        debug!(
            showtime_id = %key.showtime_id,
            seats = session.cart.seat_count(),
            total = %summary.total,
            "Seat lines replaced"
        );
        Ok(summary)
    }

    /// Replaces the full concession-line set.
    ///
    /// Quantity 0 removes that line. Seat lines are untouched and the
    /// summary is recomputed.
    pub fn upsert_concessions(
        &self,
        key: &SessionKey,
        lines: Vec<ConcessionLine>,
    ) -> CheckoutResult<PriceSummary> {
        for line in &lines {
            validation::validate_item_id(&line.item_id).map_err(marquee_core::CoreError::from)?;
            validation::validate_quantity(line.quantity).map_err(marquee_core::CoreError::from)?;
        }

        let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
        let session = sessions.get_mut(key).ok_or_else(|| self.missing(key))?;
        session.ensure_active()?;
        session.cart.merge_concessions(lines)?;
        let summary = session.summary();
        debug!(
            showtime_id = %key.showtime_id,
            total = %summary.total,
            "Concession lines replaced"
        );
        Ok(summary)
    }

    /// Applies a loyalty redemption to the session.
    ///
    /// A rejected redemption (non-positive or over the available balance)
    /// returns the error and leaves any previously applied discount
    /// unchanged.
    pub fn apply_redemption(
        &self,
        key: &SessionKey,
        points_requested: i64,
        available_points: i64,
    ) -> CheckoutResult<PriceSummary> {
        let redemption = LoyaltyRedemption::new(
            points_requested,
            available_points,
            self.inner.config.loyalty.point_rate,
        )?;

        let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
        let session = sessions.get_mut(key).ok_or_else(|| self.missing(key))?;
        session.ensure_active()?;
        session.redemption = Some(redemption);
        let summary = session.summary();
        info!(
            showtime_id = %key.showtime_id,
            points = points_requested,
            discount = %summary.discount,
            "Loyalty redemption applied"
        );
        Ok(summary)
    }

    /// Explicitly abandons the session: stops the countdown, releases
    /// the seat locks, and discards the session.
    pub fn cancel(&self, key: &SessionKey) -> CheckoutResult<()> {
        let seat_ids = {
            let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
            let session = sessions.get_mut(key).ok_or_else(|| self.missing(key))?;
            session.cancel()?;
            let seat_ids = session.cart.seat_ids();
            sessions.remove(key);
            seat_ids
        };

        self.stop_countdown(key);
        self.inner.locks.release(&key.showtime_id, &seat_ids);
        info!(
            showtime_id = %key.showtime_id,
            actor_id = %key.actor_id,
            "Reservation session cancelled"
        );
        Ok(())
    }

    /// Seals the session at settlement: `Active → CheckedOut`, stops the
    /// countdown, and discards the session. The held seats are sold, so
    /// their locks are consumed rather than released.
    ///
    /// Called by the payment orchestrator, never by UI code.
    pub(crate) fn seal(&self, key: &SessionKey) -> CheckoutResult<SessionSnapshot> {
        let snapshot = {
            let mut sessions = self.inner.sessions.lock().expect("session map poisoned");
            let session = sessions.get_mut(key).ok_or_else(|| self.missing(key))?;
            session.checkout()?;
            let snapshot = SessionSnapshot::from(&*session);
            sessions.remove(key);
            snapshot
        };

        self.stop_countdown(key);
        info!(
            showtime_id = %key.showtime_id,
            actor_id = %key.actor_id,
            "Reservation session sealed at settlement"
        );
        Ok(snapshot)
    }

    fn missing(&self, key: &SessionKey) -> CheckoutError {
        CheckoutError::SessionMissing {
            showtime_id: key.showtime_id.clone(),
            actor_id: key.actor_id.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Countdown driver
    // -------------------------------------------------------------------------

    /// Spawns the per-session 1-second countdown task.
    fn spawn_countdown(&self, key: SessionKey) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        {
            let mut drivers = self.inner.drivers.lock().expect("driver map poisoned");
            drivers.insert(key.clone(), shutdown_tx.clone());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if ManagerInner::handle_tick(&inner, &key, &shutdown_tx) == TickOutcome::Stop {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!(
                            showtime_id = %key.showtime_id,
                            "Countdown driver received shutdown"
                        );
                        break;
                    }
                }
            }

            debug!(showtime_id = %key.showtime_id, "Countdown driver stopped");
        });
    }

    /// Stops the countdown driver, at most once: the sender is removed
    /// from the map before signalling, so a second caller finds nothing.
    fn stop_countdown(&self, key: &SessionKey) {
        let sender = {
            let mut drivers = self.inner.drivers.lock().expect("driver map poisoned");
            drivers.remove(key)
        };
        if let Some(sender) = sender {
            let _ = sender.try_send(());
        }
    }
}

impl ManagerInner {
    /// One countdown tick for one session. `own_tx` identifies the
    /// calling driver's shutdown channel.
    fn handle_tick(
        inner: &Arc<ManagerInner>,
        key: &SessionKey,
        own_tx: &mpsc::Sender<()>,
    ) -> TickOutcome {
        let expired_seats = {
            let mut sessions = inner.sessions.lock().expect("session map poisoned");
            let Some(session) = sessions.get_mut(key) else {
                // Session already torn down elsewhere; driver can stop.
                return TickOutcome::Stop;
            };

            if !session.tick() {
                return TickOutcome::Continue;
            }

            let seat_ids = session.cart.seat_ids();
            sessions.remove(key);
            seat_ids
        };

        // Drop our own shutdown sender so stop_countdown has nothing
        // left to signal. A restarted session may already have its own
        // driver registered under this key, which must stay.
        {
            let mut drivers = inner.drivers.lock().expect("driver map poisoned");
            if drivers.get(key).is_some_and(|tx| tx.same_channel(own_tx)) {
                drivers.remove(key);
            }
        }

        inner.locks.release(&key.showtime_id, &expired_seats);
        warn!(
            showtime_id = %key.showtime_id,
            actor_id = %key.actor_id,
            seats = expired_seats.len(),
            "Reservation hold expired; inventory released"
        );
        TickOutcome::Stop
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
