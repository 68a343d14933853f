//! Order book maintenance: one side per venue is a price -> quantity map
//! backed by a `BTreeMap`, keyed directly on `Decimal` (it implements `Ord`,
//! so no wrapper like `OrderedFloat` is needed). The quantity a side reports
//! for a price is clamped against a [`ConsumedLedger`] to produce the
//! *effective* quantity the evaluator actually sees.
//!
//! A side fires a [`TopChange`] event only when its extremum over
//! positive-effective-quantity prices actually moves, never on every delta.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

/// One entry of a venue's order book update: absolute quantity at a price,
/// not a delta to add. A reported quantity of zero removes the level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LevelUpdate {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Emitted by [`OrderBookSide`] when applying an update changes the side's
/// best price. Carries the new extremum so the evaluator never needs to
/// re-query back into the side that produced it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TopChange {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Tracks, per price, how much quantity the strategy has already consumed
/// via simulated trades on one side of one venue. Subtracted from the raw
/// venue-reported quantity to get the quantity actually available to trade
/// against. Reset at a price when the venue itself reports that price as
/// gone (quantity 0) -- that is the venue's own signal the level is free to
/// be re-armed for a future re-posting.
#[derive(Clone, Debug, Default)]
pub struct ConsumedLedger {
    consumed: BTreeMap<Decimal, Decimal>,
}

impl ConsumedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn consumed_at(&self, price: Decimal) -> Decimal {
        self.consumed.get(&price).copied().unwrap_or(Decimal::ZERO)
    }

    fn add(&mut self, price: Decimal, qty: Decimal) {
        let entry = self.consumed.entry(price).or_insert(Decimal::ZERO);
        *entry += qty;
    }

    fn reset(&mut self, price: Decimal) {
        self.consumed.remove(&price);
    }

    /// Effective quantity remaining at `price` given a freshly reported raw
    /// quantity. A raw quantity of zero always clears the ledger at that
    /// price, regardless of what had previously been consumed there.
    fn effective(&mut self, price: Decimal, raw: Decimal) -> Decimal {
        if raw.is_zero() {
            self.reset(price);
            return Decimal::ZERO;
        }
        let remaining = raw - self.consumed_at(price);
        remaining.max(Decimal::ZERO)
    }
}

/// Which side of the book this is. Determines which end of the `BTreeMap`
/// holds the "best" price.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// One side (bids or asks) of one venue's order book.
///
/// `effective` holds only prices whose effective quantity is strictly
/// positive, so `get_best` is a single lookup at the appropriate edge of the
/// map rather than a scan. `raw` holds every price the venue has ever
/// reported a nonzero quantity for, needed to recompute `effective` after a
/// ledger update without re-deriving it from deltas.
#[derive(Clone, Debug)]
pub struct OrderBookSide {
    side: Side,
    raw: BTreeMap<Decimal, Decimal>,
    effective: BTreeMap<Decimal, Decimal>,
    ledger: ConsumedLedger,
}

impl OrderBookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            raw: BTreeMap::new(),
            effective: BTreeMap::new(),
            ledger: ConsumedLedger::new(),
        }
    }

    /// Best (price, effective quantity), or `None` if nothing is resting.
    pub fn best(&self) -> Option<(Decimal, Decimal)> {
        let (price, qty) = match self.side {
            Side::Bid => self.effective.iter().next_back()?,
            Side::Ask => self.effective.iter().next()?,
        };
        Some((*price, *qty))
    }

    fn set_effective(&mut self, price: Decimal, qty: Decimal) {
        if qty.is_zero() {
            self.effective.remove(&price);
        } else {
            self.effective.insert(price, qty);
        }
    }

    /// Apply a batch of absolute-quantity level updates. Used both for the
    /// initial REST snapshot and for streaming deltas: neither path clears
    /// prior state first, so a price this batch does not mention keeps
    /// whatever quantity it last had (see the module-level note on restart
    /// behaviour in the crate's design notes).
    ///
    /// Returns `Some(TopChange)` iff the side's best price changed as a
    /// result of the whole batch (compared once, before vs. after, not per
    /// entry).
    pub fn apply_deltas(&mut self, updates: &[LevelUpdate]) -> Option<TopChange> {
        let before = self.best();

        for update in updates {
            if update.quantity.is_zero() {
                self.raw.remove(&update.price);
            } else {
                self.raw.insert(update.price, update.quantity);
            }
            let effective = self.ledger.effective(update.price, update.quantity);
            self.set_effective(update.price, effective);
        }

        let after = self.best();
        top_change_if_different(before, after)
    }

    /// Record that `qty` was consumed by a simulated trade at `price`,
    /// shrinking the effective quantity there. May itself flip the
    /// extremum, in which case a [`TopChange`] is returned.
    pub fn apply_consumption(&mut self, price: Decimal, qty: Decimal) -> Option<TopChange> {
        let before = self.best();

        self.ledger.add(price, qty);
        let raw = self.raw.get(&price).copied().unwrap_or(Decimal::ZERO);
        let effective = self.ledger.effective(price, raw);
        self.set_effective(price, effective);

        let after = self.best();
        top_change_if_different(before, after)
    }
}

fn top_change_if_different(
    before: Option<(Decimal, Decimal)>,
    after: Option<(Decimal, Decimal)>,
) -> Option<TopChange> {
    if before.map(|(p, _)| p) == after.map(|(p, _)| p) {
        return None;
    }
    after.map(|(price, quantity)| TopChange { price, quantity })
}

/// Both sides of one venue's order book.
#[derive(Clone, Debug)]
pub struct OrderBook {
    pub bids: OrderBookSide,
    pub asks: OrderBookSide,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: OrderBookSide::new(Side::Bid),
            asks: OrderBookSide::new(Side::Ask),
        }
    }

    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.best()
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
