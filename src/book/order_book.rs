// Local order book
// Maintains current bid/ask price levels for one instrument from feed updates

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BookError;

/// Book side an update or level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Direction of a hypothetical order being costed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The book side a marketable order of this direction consumes.
    pub fn book_side(&self) -> Side {
        match self {
            TradeSide::Buy => Side::Ask,
            TradeSide::Sell => Side::Bid,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Wrapper for f64 to use as BTreeMap key (handles NaN/Inf properly)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct OrderedFloat(pub f64);

impl Eq for OrderedFloat {}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl From<f64> for OrderedFloat {
    fn from(f: f64) -> Self {
        OrderedFloat(f)
    }
}

/// A single price level: price and the aggregate resting size at that price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// One incremental change to a single price level.
///
/// `size == 0` removes the level; `size > 0` fully overwrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    pub sequence: Option<u64>,
}

/// Whether a feed message replaces the whole book or patches levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction {
    Snapshot,
    Update,
}

/// A parsed feed message: a batch of (price, size) changes for both sides.
#[derive(Debug, Clone)]
pub struct BookMessage {
    pub action: BookAction,
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
    pub timestamp: DateTime<Utc>,
    pub sequence: Option<u64>,
}

/// Point-in-time copy of the book, independently owned by the reader.
///
/// Levels are already in priority order: bids descending, asks ascending.
/// Once obtained, the snapshot never changes underfoot regardless of what
/// the feed does to the live book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub last_update: Option<DateTime<Utc>>,
    pub sequence: u64,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Levels consumed by a marketable order of the given direction, best
    /// price first.
    pub fn levels(&self, side: TradeSide) -> &[PriceLevel] {
        match side.book_side() {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn mid_price(&self) -> Result<f64, BookError> {
        let bid = self.best_bid().ok_or(BookError::Empty(Side::Bid))?;
        let ask = self.best_ask().ok_or(BookError::Empty(Side::Ask))?;
        Ok((bid.price + ask.price) / 2.0)
    }

    pub fn spread(&self) -> Result<f64, BookError> {
        let bid = self.best_bid().ok_or(BookError::Empty(Side::Bid))?;
        let ask = self.best_ask().ok_or(BookError::Empty(Side::Ask))?;
        Ok(ask.price - bid.price)
    }

    /// Spread as a fraction of the mid price.
    pub fn spread_fraction(&self) -> Result<f64, BookError> {
        Ok(self.spread()? / self.mid_price()?)
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Age of the snapshot relative to now, if any update has been seen.
    pub fn age(&self) -> Option<chrono::Duration> {
        self.last_update.map(|t| Utc::now() - t)
    }

    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        match self.age() {
            Some(age) => age > chrono::Duration::seconds(max_age_secs as i64),
            None => true,
        }
    }
}

/// Complete order book state for one instrument.
///
/// Mutated only by the ingestion path; readers take [`BookSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct PriceLevelBook {
    instrument: String,
    /// Bids keyed ascending by price; iterated in reverse for priority order.
    bids: BTreeMap<OrderedFloat, PriceLevel>,
    /// Asks keyed ascending by price, which is already priority order.
    asks: BTreeMap<OrderedFloat, PriceLevel>,
    last_update: Option<DateTime<Utc>>,
    sequence: u64,
    stale_updates: u64,
}

impl PriceLevelBook {
    /// Create a new empty book.
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update: None,
            sequence: 0,
            stale_updates: 0,
        }
    }

    /// Build a book directly from full level sets (e.g. a REST snapshot).
    pub fn from_levels(
        instrument: impl Into<String>,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
        timestamp: DateTime<Utc>,
        sequence: Option<u64>,
    ) -> Result<Self, BookError> {
        let mut book = Self::new(instrument);
        book.replace(bids, asks, timestamp, sequence)?;
        Ok(book)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Number of updates dropped due to sequence regression.
    pub fn stale_count(&self) -> u64 {
        self.stale_updates
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// A noisy feed can briefly cross the book; tolerated, but observable.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        match self.last_update {
            Some(t) => Utc::now() - t > chrono::Duration::seconds(max_age_secs as i64),
            None => true,
        }
    }

    /// Apply one incremental update.
    ///
    /// A record with `size == 0` removes the level (no-op when absent); a
    /// positive size fully overwrites the level at that price. An update
    /// whose sequence does not advance the book is dropped and reported as
    /// [`BookError::Stale`]; malformed records are rejected without touching
    /// the book.
    pub fn apply(&mut self, update: UpdateRecord) -> Result<(), BookError> {
        validate_level(update.price, update.size)?;
        self.advance_sequence(update.sequence)?;

        self.apply_level(update.side, update.price, update.size);
        self.last_update = Some(update.timestamp);
        Ok(())
    }

    /// Apply one parsed feed message.
    ///
    /// A `Snapshot` action replaces both sides atomically from the reader's
    /// point of view; an `Update` action patches the named levels. Returns
    /// the number of levels written or removed.
    pub fn apply_message(&mut self, message: &BookMessage) -> Result<usize, BookError> {
        match message.action {
            BookAction::Snapshot => {
                self.replace(&message.bids, &message.asks, message.timestamp, message.sequence)?;
                Ok(message.bids.len() + message.asks.len())
            }
            BookAction::Update => {
                for &(price, size) in message.bids.iter().chain(&message.asks) {
                    validate_level(price, size)?;
                }
                self.advance_sequence(message.sequence)?;

                for &(price, size) in &message.bids {
                    self.apply_level(Side::Bid, price, size);
                }
                for &(price, size) in &message.asks {
                    self.apply_level(Side::Ask, price, size);
                }
                self.last_update = Some(message.timestamp);
                Ok(message.bids.len() + message.asks.len())
            }
        }
    }

    /// Replace the whole book with new level sets.
    ///
    /// Both sides are rebuilt off to the side and swapped in, so an invalid
    /// level leaves the book in its last good state.
    pub fn replace(
        &mut self,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
        timestamp: DateTime<Utc>,
        sequence: Option<u64>,
    ) -> Result<(), BookError> {
        let new_bids = build_side(bids)?;
        let new_asks = build_side(asks)?;

        self.bids = new_bids;
        self.asks = new_asks;
        self.last_update = Some(timestamp);
        if let Some(seq) = sequence {
            self.sequence = seq;
        }
        debug!(
            instrument = %self.instrument,
            bids = self.bids.len(),
            asks = self.asks.len(),
            "book replaced from snapshot"
        );
        Ok(())
    }

    /// Re-seed a fresh book from a previously taken snapshot.
    pub fn restore(&mut self, snapshot: &BookSnapshot) -> Result<(), BookError> {
        let bids: Vec<(f64, f64)> = snapshot.bids.iter().map(|l| (l.price, l.size)).collect();
        let asks: Vec<(f64, f64)> = snapshot.asks.iter().map(|l| (l.price, l.size)).collect();
        let timestamp = snapshot.last_update.unwrap_or_else(Utc::now);
        self.replace(&bids, &asks, timestamp, Some(snapshot.sequence))
    }

    /// Get best bid (highest bid price).
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.iter().next_back().map(|(_, level)| level)
    }

    /// Get best ask (lowest ask price).
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.iter().next().map(|(_, level)| level)
    }

    pub fn mid_price(&self) -> Result<f64, BookError> {
        let bid = self.best_bid().ok_or(BookError::Empty(Side::Bid))?;
        let ask = self.best_ask().ok_or(BookError::Empty(Side::Ask))?;
        Ok((bid.price + ask.price) / 2.0)
    }

    pub fn spread(&self) -> Result<f64, BookError> {
        let bid = self.best_bid().ok_or(BookError::Empty(Side::Bid))?;
        let ask = self.best_ask().ok_or(BookError::Empty(Side::Ask))?;
        Ok(ask.price - bid.price)
    }

    /// Take a point-in-time copy of the book in priority order.
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            instrument: self.instrument.clone(),
            bids: self.bids.values().rev().copied().collect(),
            asks: self.asks.values().copied().collect(),
            last_update: self.last_update,
            sequence: self.sequence,
        }
    }

    fn apply_level(&mut self, side: Side, price: f64, size: f64) {
        let book_side = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if size > 0.0 {
            book_side.insert(OrderedFloat(price), PriceLevel { price, size });
        } else {
            book_side.remove(&OrderedFloat(price));
        }
    }

    /// Sequence gate: a sequenced update must advance the book once any
    /// positive sequence has been seen; unsequenced updates tick the local
    /// counter instead.
    fn advance_sequence(&mut self, sequence: Option<u64>) -> Result<(), BookError> {
        match sequence {
            Some(seq) if self.sequence > 0 && seq <= self.sequence => {
                self.stale_updates += 1;
                warn!(
                    instrument = %self.instrument,
                    last = self.sequence,
                    got = seq,
                    "dropping stale book update"
                );
                Err(BookError::Stale {
                    last: self.sequence,
                    got: seq,
                })
            }
            Some(seq) => {
                self.sequence = seq;
                Ok(())
            }
            None => {
                self.sequence += 1;
                Ok(())
            }
        }
    }
}

fn validate_level(price: f64, size: f64) -> Result<(), BookError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(BookError::Inconsistent(format!("bad price {price}")));
    }
    if !size.is_finite() || size < 0.0 {
        return Err(BookError::Inconsistent(format!("bad size {size}")));
    }
    Ok(())
}

fn build_side(levels: &[(f64, f64)]) -> Result<BTreeMap<OrderedFloat, PriceLevel>, BookError> {
    let mut side = BTreeMap::new();
    for &(price, size) in levels {
        validate_level(price, size)?;
        if size > 0.0 {
            side.insert(OrderedFloat(price), PriceLevel { price, size });
        }
    }
    Ok(side)
}

/// Cloneable shared handle over the book: one writer (the ingestion path),
/// any number of readers taking owned snapshots.
#[derive(Debug, Clone)]
pub struct SharedBook {
    inner: Arc<RwLock<PriceLevelBook>>,
}

impl SharedBook {
    pub fn new(book: PriceLevelBook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(book)),
        }
    }

    pub fn apply(&self, update: UpdateRecord) -> Result<(), BookError> {
        self.inner.write().unwrap().apply(update)
    }

    pub fn apply_message(&self, message: &BookMessage) -> Result<usize, BookError> {
        self.inner.write().unwrap().apply_message(message)
    }

    pub fn replace(
        &self,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
        timestamp: DateTime<Utc>,
        sequence: Option<u64>,
    ) -> Result<(), BookError> {
        self.inner.write().unwrap().replace(bids, asks, timestamp, sequence)
    }

    pub fn snapshot(&self) -> BookSnapshot {
        self.inner.read().unwrap().snapshot()
    }

    pub fn mid_price(&self) -> Result<f64, BookError> {
        self.inner.read().unwrap().mid_price()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().unwrap().last_update()
    }

    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        self.inner.read().unwrap().is_stale(max_age_secs)
    }

    pub fn depth(&self) -> (usize, usize) {
        self.inner.read().unwrap().depth()
    }

    pub fn stale_count(&self) -> u64 {
        self.inner.read().unwrap().stale_count()
    }
}
