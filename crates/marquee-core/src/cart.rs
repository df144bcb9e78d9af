//! # Cart Aggregator
//!
//! One merged view of cart lines sourced from two independently-updating
//! producers: the seat picker and the concession picker.
//!
//! ## Dual-Producer Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cart Aggregator                                     │
//! │                                                                         │
//! │  Seat picker ──────► merge_seats(lines) ───────► seats sub-map         │
//! │  (full selection)                                 keyed by seat_id      │
//! │                                                                         │
//! │  Concession picker ► merge_concessions(lines) ──► concessions sub-map  │
//! │  (full selection)                                 keyed by item_id      │
//! │                                                                         │
//! │  Reading ──────────► lines() ──────────────────► union of both maps    │
//! │                                                                         │
//! │  INVARIANT: a mutation to one line kind NEVER touches the other.       │
//! │  Each producer submits its complete current selection, not a delta,    │
//! │  so each merge replaces exactly its own sub-map.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Modelled as two typed sub-maps merged on read, never a single flat
//! structure one producer could clobber.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, ConcessionLine, SeatLine};

/// The order-in-progress: seat lines and concession lines for one session.
///
/// ## Invariants
/// - At most one line per seat id and per item id (map keys)
/// - A concession quantity of 0 removes that line; negatives reject the
///   merge, so stored quantities are always >= 1
/// - `merge_seats` replaces only seat lines; `merge_concessions` replaces
///   only concession lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Seat lines keyed by seat id.
    seats: BTreeMap<String, SeatLine>,

    /// Concession lines keyed by item id.
    concessions: BTreeMap<String, ConcessionLine>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Replaces the full seat-line set.
    ///
    /// The seat picker always submits its complete current selection, so
    /// this supersedes the prior seat set rather than adding to it.
    /// Concession lines are untouched.
    pub fn merge_seats(&mut self, lines: Vec<SeatLine>) {
        self.seats = lines
            .into_iter()
            .map(|l| (l.seat_id.clone(), l))
            .collect();
    }

    /// Replaces the full concession-line set.
    ///
    /// Lines with quantity 0 are dropped (quantity 0 removes the line);
    /// a negative quantity rejects the whole merge and leaves the cart
    /// unchanged, so stored lines always satisfy `quantity >= 1`. Seat
    /// lines are untouched.
    pub fn merge_concessions(&mut self, lines: Vec<ConcessionLine>) -> CoreResult<()> {
        for line in &lines {
            if line.quantity < 0 {
                return Err(CoreError::InvalidQuantity {
                    item_id: line.item_id.clone(),
                    quantity: line.quantity,
                });
            }
        }
        self.concessions = lines
            .into_iter()
            .filter(|l| l.quantity != 0)
            .map(|l| (l.item_id.clone(), l))
            .collect();
        Ok(())
    }

    /// Returns the merged view: all seat lines followed by all
    /// concession lines.
    pub fn lines(&self) -> Vec<CartLine> {
        self.seats
            .values()
            .cloned()
            .map(CartLine::Seat)
            .chain(self.concessions.values().cloned().map(CartLine::Concession))
            .collect()
    }

    /// Seat lines currently held, in key order.
    pub fn seat_lines(&self) -> Vec<SeatLine> {
        self.seats.values().cloned().collect()
    }

    /// Concession lines currently held, in key order.
    pub fn concession_lines(&self) -> Vec<ConcessionLine> {
        self.concessions.values().cloned().collect()
    }

    /// Seat/ticket identifiers currently held.
    pub fn seat_ids(&self) -> Vec<String> {
        self.seats.keys().cloned().collect()
    }

    /// Number of seats held.
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// True when the cart holds at least one seat line.
    pub fn has_seats(&self) -> bool {
        !self.seats.is_empty()
    }

    /// True when the cart holds no lines of either kind.
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty() && self.concessions.is_empty()
    }

    /// Sum of seat unit prices.
    pub fn seat_subtotal(&self) -> Money {
        self.seats
            .values()
            .fold(Money::zero(), |acc, l| acc + l.unit_price)
    }

    /// Sum of concession line totals.
    pub fn concession_subtotal(&self) -> Money {
        self.concessions
            .values()
            .fold(Money::zero(), |acc, l| acc + l.line_total())
    }

    /// Clears both sub-maps.
    pub fn clear(&mut self) {
        self.seats.clear();
        self.concessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeatTier;

    fn seat(id: &str) -> SeatLine {
        SeatLine {
            seat_id: id.to_string(),
            tier: SeatTier::Standard,
            unit_price: Money::new(100_000),
        }
    }

    fn concession(id: &str, quantity: i64) -> ConcessionLine {
        ConcessionLine {
            item_id: id.to_string(),
            name: format!("Item {}", id),
            unit_price: Money::new(50_000),
            quantity,
        }
    }

    #[test]
    fn test_merge_seats_replaces_seat_set() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1"), seat("A2")]);
        cart.merge_seats(vec![seat("B5")]);

        assert_eq!(cart.seat_ids(), vec!["B5".to_string()]);
    }

    #[test]
    fn test_seat_merge_preserves_concessions() {
        let mut cart = Cart::new();
        cart.merge_concessions(vec![concession("popcorn-l", 2)]).unwrap();
        cart.merge_seats(vec![seat("A1"), seat("A2")]);

        // Concession written first must survive the seat merge.
        assert_eq!(cart.concession_lines().len(), 1);
        assert_eq!(cart.concession_lines()[0].item_id, "popcorn-l");
        assert_eq!(cart.seat_count(), 2);
    }

    #[test]
    fn test_concession_merge_preserves_seats() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1"), seat("A2")]);
        cart.merge_concessions(vec![concession("cola-m", 1)]).unwrap();

        // Seats written first must survive the concession merge.
        assert_eq!(cart.seat_ids(), vec!["A1".to_string(), "A2".to_string()]);
        assert_eq!(cart.concession_lines().len(), 1);
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = Cart::new();
        cart.merge_concessions(vec![concession("popcorn-l", 2), concession("cola-m", 1)]).unwrap();
        cart.merge_concessions(vec![concession("popcorn-l", 0), concession("cola-m", 1)]).unwrap();

        let remaining = cart.concession_lines();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].item_id, "cola-m");
    }

    #[test]
    fn test_negative_quantity_rejects_merge_and_keeps_cart() {
        let mut cart = Cart::new();
        cart.merge_concessions(vec![concession("popcorn-l", 2)]).unwrap();

        let err = cart
            .merge_concessions(vec![concession("popcorn-l", -2)])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidQuantity { quantity: -2, .. }
        ));

        // The rejected merge left the prior line set untouched, so the
        // subtotal can never go negative through the cart.
        assert_eq!(cart.concession_lines()[0].quantity, 2);
        assert_eq!(cart.concession_subtotal(), Money::new(100_000));
    }

    #[test]
    fn test_duplicate_keys_collapse_to_one_line() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1"), seat("A1")]);
        assert_eq!(cart.seat_count(), 1);
    }

    #[test]
    fn test_lines_returns_union() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1")]);
        cart.merge_concessions(vec![concession("cola-m", 1)]).unwrap();

        let lines = cart.lines();
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines[0], CartLine::Seat(_)));
        assert!(matches!(lines[1], CartLine::Concession(_)));
    }

    #[test]
    fn test_subtotals() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1"), seat("A2")]);
        cart.merge_concessions(vec![concession("popcorn-l", 2)]).unwrap();

        assert_eq!(cart.seat_subtotal(), Money::new(200_000));
        assert_eq!(cart.concession_subtotal(), Money::new(100_000));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.merge_seats(vec![seat("A1")]);
        cart.merge_concessions(vec![concession("cola-m", 1)]).unwrap();
        cart.clear();
        assert!(cart.is_empty());
    }
}
