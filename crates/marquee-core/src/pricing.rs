//! # Pricing Engine
//!
//! Pure seat/concession pricing and loyalty discount math.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pricing Engine                                   │
//! │                                                                         │
//! │  seat id "E7" ──► row band table ──► SeatTier::Elevated ──► unit price │
//! │                                                                         │
//! │  concession lines ──► Σ unit_price × quantity ──► subtotal             │
//! │                                                                         │
//! │  redemption ──► points × rate ──► discount                             │
//! │                                                                         │
//! │  total = max(seat_subtotal + concession_subtotal − discount, 0)        │
//! │                                                                         │
//! │  PURE • SYNCHRONOUS • NO I/O • RE-RUN AFTER EVERY CART MUTATION        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The only failure modes are input validation: a seat id with no known
//! row band, or a non-positive concession quantity.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ConcessionLine, LoyaltyRedemption, PriceSummary, SeatLine, SeatTier};

// =============================================================================
// Row Band Table
// =============================================================================

/// Last row letter of the standard band (rows A..=D).
const STANDARD_BAND_END: char = 'D';

/// Last row letter of the elevated band (rows E..=H). Everything beyond
/// is premium.
const ELEVATED_BAND_END: char = 'H';

/// Derives the pricing tier from a seat identifier's row letter.
///
/// ## Band Table
/// - Rows A–D → `Standard`
/// - Rows E–H → `Elevated`
/// - Rows I and beyond → `Premium`
///
/// ## Errors
/// `CoreError::UnknownSeatTier` when the id does not start with an ASCII
/// row letter.
pub fn seat_tier(seat_id: &str) -> CoreResult<SeatTier> {
    let row = seat_id
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| CoreError::UnknownSeatTier(seat_id.to_string()))?;

    if row <= STANDARD_BAND_END {
        Ok(SeatTier::Standard)
    } else if row <= ELEVATED_BAND_END {
        Ok(SeatTier::Elevated)
    } else {
        Ok(SeatTier::Premium)
    }
}

// =============================================================================
// Price Table
// =============================================================================

/// Fixed per-tier seat prices.
///
/// Deterministic: the same seat id always prices the same against one
/// table. The amounts come from configuration, not from this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTable {
    pub standard: Money,
    pub elevated: Money,
    pub premium: Money,
}

impl PriceTable {
    /// Returns the unit price for a tier.
    #[inline]
    pub const fn price_for_tier(&self, tier: SeatTier) -> Money {
        match tier {
            SeatTier::Standard => self.standard,
            SeatTier::Elevated => self.elevated,
            SeatTier::Premium => self.premium,
        }
    }

    /// Prices a single seat by id.
    pub fn price_seat(&self, seat_id: &str) -> CoreResult<Money> {
        Ok(self.price_for_tier(seat_tier(seat_id)?))
    }

    /// Builds a priced seat line for a seat id.
    pub fn seat_line(&self, seat_id: &str) -> CoreResult<SeatLine> {
        let tier = seat_tier(seat_id)?;
        Ok(SeatLine {
            seat_id: seat_id.to_string(),
            tier,
            unit_price: self.price_for_tier(tier),
        })
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        PriceTable {
            standard: Money::new(100_000),
            elevated: Money::new(120_000),
            premium: Money::new(150_000),
        }
    }
}

// =============================================================================
// Subtotals and Discounts
// =============================================================================

/// Sums concession lines, validating each quantity.
pub fn concession_subtotal(lines: &[ConcessionLine]) -> CoreResult<Money> {
    let mut subtotal = Money::zero();
    for line in lines {
        if line.quantity < 1 {
            return Err(CoreError::InvalidQuantity {
                item_id: line.item_id.clone(),
                quantity: line.quantity,
            });
        }
        subtotal += line.line_total();
    }
    Ok(subtotal)
}

/// Applies a loyalty discount to a subtotal, clamping at zero.
///
/// A discount exceeding the subtotal yields a zero total rather than a
/// negative one. Whether such an order may settle is decided by the
/// payment orchestrator, which rejects non-positive totals.
pub fn apply_discount(subtotal: Money, redemption: Option<&LoyaltyRedemption>) -> Money {
    match redemption {
        Some(r) => subtotal.saturating_sub(r.discount()),
        None => subtotal,
    }
}

/// Builds the full derived price view of a cart.
///
/// Re-run after every cart mutation; the result is never cached by this
/// crate.
pub fn summarize(cart: &Cart, redemption: Option<&LoyaltyRedemption>) -> PriceSummary {
    let seat_subtotal = cart.seat_subtotal();
    let concession_subtotal = cart.concession_subtotal();
    let discount = redemption.map(|r| r.discount()).unwrap_or_else(Money::zero);

    PriceSummary {
        seat_subtotal,
        concession_subtotal,
        discount,
        total: apply_discount(seat_subtotal + concession_subtotal, redemption),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
