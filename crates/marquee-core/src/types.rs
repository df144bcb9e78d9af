//! # Domain Types
//!
//! Core domain types used throughout Marquee.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartLine     │   │     Order       │   │ PriceSummary    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Seat(line)     │   │  order_id       │   │  seat_subtotal  │       │
//! │  │  Concession(..) │   │  ticket ids     │   │  concession_sub │       │
//! │  │  keyed identity │   │  status         │   │  discount       │       │
//! │  └─────────────────┘   └─────────────────┘   │  total (≥ 0)    │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    SeatTier     │   │  PaymentMethod  │   │LoyaltyRedemption│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Standard       │   │  Cash           │   │  points × rate  │       │
//! │  │  Elevated       │   │  Gateway        │   │  = discount     │       │
//! │  │  Premium        │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Seat Tier
// =============================================================================

/// Pricing tier of a seat, derived from its row band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatTier {
    /// Front row band, base price.
    Standard,
    /// Middle row band.
    Elevated,
    /// Back row band (recliners, couples seats).
    Premium,
}

// =============================================================================
// Cart Lines
// =============================================================================

/// A seat line in the cart.
///
/// The unit price is frozen at selection time, so a later price-table
/// change never reprices a held seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLine {
    /// Seat/ticket identifier (e.g. "A1"). Unique within a session.
    pub seat_id: String,

    /// Pricing tier at time of selection (frozen).
    pub tier: SeatTier,

    /// Unit price at time of selection (frozen).
    pub unit_price: Money,
}

/// A concession line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcessionLine {
    /// Concession item identifier. Unique within a session.
    pub item_id: String,

    /// Display name at time of selection (frozen).
    pub name: String,

    /// Unit price at time of selection (frozen).
    pub unit_price: Money,

    /// Quantity, always ≥ 1 once stored (a submitted quantity of 0
    /// removes the line before it is stored).
    pub quantity: i64,
}

impl ConcessionLine {
    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// One line of an order-in-progress.
///
/// ## Invariant
/// At most one line per seat id / item id within a session. The cart
/// enforces this by keying each kind in its own sub-map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CartLine {
    Seat(SeatLine),
    Concession(ConcessionLine),
}

impl CartLine {
    /// The line's identity key (seat id or item id).
    pub fn key(&self) -> &str {
        match self {
            CartLine::Seat(s) => &s.seat_id,
            CartLine::Concession(c) => &c.item_id,
        }
    }

    /// Line total for this line.
    pub fn line_total(&self) -> Money {
        match self {
            CartLine::Seat(s) => s.unit_price,
            CartLine::Concession(c) => c.line_total(),
        }
    }
}

// =============================================================================
// Loyalty Redemption
// =============================================================================

/// Conversion of loyalty points into a monetary discount at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyRedemption {
    /// Points the actor chose to redeem.
    pub points_requested: i64,

    /// Monetary value of one point.
    pub point_rate: i64,
}

impl LoyaltyRedemption {
    /// Creates a redemption after checking it against the available balance.
    ///
    /// ## Invariant
    /// `0 < points_requested ≤ available_points`. A rejected redemption
    /// must leave any previously applied discount unchanged; this
    /// constructor mutates nothing, so rejection is naturally safe.
    pub fn new(points_requested: i64, available_points: i64, point_rate: i64) -> Result<Self, CoreError> {
        if points_requested <= 0 {
            return Err(CoreError::RedemptionNotPositive {
                requested: points_requested,
            });
        }
        if points_requested > available_points {
            return Err(CoreError::RedemptionExceedsBalance {
                requested: points_requested,
                available: available_points,
            });
        }
        Ok(LoyaltyRedemption {
            points_requested,
            point_rate,
        })
    }

    /// The monetary discount this redemption is worth.
    #[inline]
    pub fn discount(&self) -> Money {
        Money::new(self.points_requested * self.point_rate)
    }
}

// =============================================================================
// Price Summary
// =============================================================================

/// Derived pricing view of a cart. Never stored; recomputed after every
/// mutation so the displayed total is always consistent with current lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub seat_subtotal: Money,
    pub concession_subtotal: Money,
    pub discount: Money,
    /// `seat_subtotal + concession_subtotal − discount`, clamped at zero.
    pub total: Money,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a checkout is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Staff attests physical cash receipt; synchronous and final.
    Cash,
    /// External payment gateway via redirect + callback/polling.
    Gateway,
}

// =============================================================================
// Order
// =============================================================================

/// The status of a finalized order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

/// A settled cinema order.
///
/// Created by the payment orchestrator only after a payment attempt
/// reaches its success terminal state. Immutable once `Completed` except
/// for credential-related state held by the credential issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub showtime_id: String,
    pub actor_id: String,
    /// Name printed on the scannable credential.
    pub holder_name: String,
    /// Seat/ticket identifiers the order covers.
    pub source_ticket_ids: Vec<String>,
    /// Concession lines frozen at settlement time.
    pub concession_lines: Vec<ConcessionLine>,
    pub total: Money,
    pub discount: Money,
    pub payment_method: PaymentMethod,
    /// Gateway transaction reference or cash receipt reference.
    pub payment_reference: Option<String>,
    /// Loyalty points earned by this order (`total / earn_divisor`).
    pub earned_points: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redemption_discount() {
        let redemption = LoyaltyRedemption::new(10, 120, 1_000).unwrap();
        assert_eq!(redemption.discount(), Money::new(10_000));
    }

    #[test]
    fn test_redemption_rejects_zero_points() {
        let err = LoyaltyRedemption::new(0, 120, 1_000).unwrap_err();
        assert!(matches!(err, CoreError::RedemptionNotPositive { .. }));
    }

    #[test]
    fn test_redemption_rejects_over_balance() {
        let err = LoyaltyRedemption::new(121, 120, 1_000).unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedemptionExceedsBalance {
                requested: 121,
                available: 120
            }
        ));
    }

    #[test]
    fn test_cart_line_serializes_with_kind_tag() {
        let line = CartLine::Seat(SeatLine {
            seat_id: "A1".into(),
            tier: SeatTier::Standard,
            unit_price: Money::new(100_000),
        });
        let json = serde_json::to_string(&line).unwrap();
        assert!(json.contains("\"kind\":\"seat\""));
        assert!(json.contains("\"seatId\":\"A1\""));

        let parsed: CartLine = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, line);
    }

    #[test]
    fn test_cart_line_key_and_total() {
        let seat = CartLine::Seat(SeatLine {
            seat_id: "A1".into(),
            tier: SeatTier::Standard,
            unit_price: Money::new(100_000),
        });
        assert_eq!(seat.key(), "A1");
        assert_eq!(seat.line_total(), Money::new(100_000));

        let popcorn = CartLine::Concession(ConcessionLine {
            item_id: "popcorn-l".into(),
            name: "Popcorn (L)".into(),
            unit_price: Money::new(50_000),
            quantity: 2,
        });
        assert_eq!(popcorn.key(), "popcorn-l");
        assert_eq!(popcorn.line_total(), Money::new(100_000));
    }
}
