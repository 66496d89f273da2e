//! Time bounding boxes and the total orders defined over them
//!
//! A `TimeBoundingBox` is a closed interval `[earliest, latest]` of trace
//! time (seconds, f64). Degenerate point boxes (`earliest == latest`) are
//! legal and are how EVENT drawables are represented.
//!
//! Range tests treat the *argument* of [`TimeBoundingBox::overlaps`] as a
//! half-open query window `[earliest, latest)`. A point window is tested
//! inclusively. Because the stored box stays closed, a node box that
//! contains a drawable box overlaps every window the drawable overlaps,
//! which is what tree pruning relies on.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Closed time interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBoundingBox {
    pub earliest: f64,
    pub latest: f64,
}

impl TimeBoundingBox {
    /// Window covering every representable time
    pub const ALL_TIME: TimeBoundingBox = TimeBoundingBox {
        earliest: f64::NEG_INFINITY,
        latest: f64::INFINITY,
    };

    /// Create a box
    ///
    /// # Panics
    /// Panics if earliest > latest
    pub fn new(earliest: f64, latest: f64) -> Self {
        assert!(
            earliest <= latest,
            "TimeBoundingBox: earliest must not exceed latest"
        );
        Self { earliest, latest }
    }

    /// Create a box, returning None if the bounds are inverted
    pub fn try_new(earliest: f64, latest: f64) -> Option<Self> {
        if earliest <= latest {
            Some(Self { earliest, latest })
        } else {
            None
        }
    }

    /// Box spanning two time points given in any order
    pub fn from_times(a: f64, b: f64) -> Self {
        Self {
            earliest: a.min(b),
            latest: a.max(b),
        }
    }

    /// Degenerate box at a single instant
    pub fn point(time: f64) -> Self {
        Self {
            earliest: time,
            latest: time,
        }
    }

    /// Accumulator that any `union` replaces
    pub fn empty() -> Self {
        Self {
            earliest: f64::INFINITY,
            latest: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.earliest > self.latest
    }

    pub fn is_point(&self) -> bool {
        self.earliest == self.latest
    }

    pub fn duration(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.latest - self.earliest
        }
    }

    /// Check if a time falls inside the half-open interval (points are inclusive)
    pub fn contains(&self, time: f64) -> bool {
        if self.is_point() {
            time == self.earliest
        } else {
            time >= self.earliest && time < self.latest
        }
    }

    /// Check if this box covers another box completely
    pub fn covers(&self, other: &TimeBoundingBox) -> bool {
        self.earliest <= other.earliest && other.latest <= self.latest
    }

    /// Check if this box intersects the half-open window `[window.earliest, window.latest)`
    pub fn overlaps(&self, window: &TimeBoundingBox) -> bool {
        if self.is_empty() || window.is_empty() {
            return false;
        }
        if window.is_point() {
            self.earliest <= window.earliest && window.earliest <= self.latest
        } else {
            self.earliest < window.latest && window.earliest <= self.latest
        }
    }

    /// Length of the intersection with another box, 0 when disjoint
    pub fn intersection_duration(&self, other: &TimeBoundingBox) -> f64 {
        let start = self.earliest.max(other.earliest);
        let end = self.latest.min(other.latest);
        if end > start {
            end - start
        } else {
            0.0
        }
    }

    /// Expand in place to cover `other`
    pub fn union(&mut self, other: &TimeBoundingBox) {
        if other.is_empty() {
            return;
        }
        self.earliest = self.earliest.min(other.earliest);
        self.latest = self.latest.max(other.latest);
    }

    /// Expand in place to cover a single time
    pub fn extend_to(&mut self, time: f64) {
        self.earliest = self.earliest.min(time);
        self.latest = self.latest.max(time);
    }
}

impl std::fmt::Display for TimeBoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.6}, {:.6}]", self.earliest, self.latest)
    }
}

/// Box operations exposed by anything that carries a `TimeBoundingBox`
pub trait TimeBounded {
    fn bbox(&self) -> &TimeBoundingBox;

    fn earliest_time(&self) -> f64 {
        self.bbox().earliest
    }

    fn latest_time(&self) -> f64 {
        self.bbox().latest
    }

    fn duration(&self) -> f64 {
        self.bbox().duration()
    }

    fn overlaps(&self, window: &TimeBoundingBox) -> bool {
        self.bbox().overlaps(window)
    }
}

impl TimeBounded for TimeBoundingBox {
    fn bbox(&self) -> &TimeBoundingBox {
        self
    }
}

/// Traversal orders over boxes
///
/// The canonical storage order is increasing start, then decreasing end, so an
/// enclosing interval sorts immediately before every interval it nests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawableOrder {
    IncreasingStartDecreasingEnd,
    IncreasingEnd,
    DecreasingStart,
    DecreasingEnd,
}

/// Lexicographic sort key; smaller keys come first in the traversal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderKey(pub f64, pub f64);

impl Eq for OrderKey {}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .total_cmp(&other.0)
            .then_with(|| self.1.total_cmp(&other.1))
    }
}

impl DrawableOrder {
    /// Forward traversal (the storage order)
    pub const FORWARD: DrawableOrder = DrawableOrder::IncreasingStartDecreasingEnd;
    /// Backward traversal
    pub const BACKWARD: DrawableOrder = DrawableOrder::DecreasingEnd;

    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            DrawableOrder::IncreasingStartDecreasingEnd | DrawableOrder::IncreasingEnd
        )
    }

    /// Key of a single box under this order
    pub fn sort_key(&self, b: &TimeBoundingBox) -> OrderKey {
        match self {
            DrawableOrder::IncreasingStartDecreasingEnd => OrderKey(b.earliest, -b.latest),
            DrawableOrder::IncreasingEnd => OrderKey(b.latest, b.earliest),
            DrawableOrder::DecreasingStart => OrderKey(-b.earliest, -b.latest),
            DrawableOrder::DecreasingEnd => OrderKey(-b.latest, -b.earliest),
        }
    }

    /// Smallest key any box covered by `node` can have
    pub fn lower_bound(&self, node: &TimeBoundingBox) -> OrderKey {
        match self {
            DrawableOrder::IncreasingStartDecreasingEnd => {
                OrderKey(node.earliest, -node.latest)
            }
            DrawableOrder::IncreasingEnd => OrderKey(node.earliest, node.earliest),
            DrawableOrder::DecreasingStart => OrderKey(-node.latest, -node.latest),
            DrawableOrder::DecreasingEnd => OrderKey(-node.latest, -node.latest),
        }
    }

    pub fn compare(&self, a: &TimeBoundingBox, b: &TimeBoundingBox) -> Ordering {
        self.sort_key(a).cmp(&self.sort_key(b))
    }
}

impl std::str::FromStr for DrawableOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" | "increasing-start" | "increasing-start-decreasing-end" => {
                Ok(DrawableOrder::IncreasingStartDecreasingEnd)
            }
            "increasing-end" => Ok(DrawableOrder::IncreasingEnd),
            "decreasing-start" => Ok(DrawableOrder::DecreasingStart),
            "backward" | "decreasing-end" => Ok(DrawableOrder::DecreasingEnd),
            other => Err(format!("unknown drawable order: {}", other)),
        }
    }
}
