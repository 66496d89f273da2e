//! Ordering of matched drawables before they reach the tree builder

use crate::convert::error::{ConvertError, ConvertResult};
use crate::model::{Drawable, TimeBounded};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::warn;

/// Holds drawables until no later record can end before them
///
/// Records arrive in time order, so once the stream has reached time `t`
/// every drawable still to come ends at `t` or later. Everything ending at or
/// before the watermark can be released in end-time order.
#[derive(Default)]
pub struct EndTimeQueue {
    heap: BinaryHeap<Reverse<ByEnd>>,
    seq: u64,
}

struct ByEnd {
    end: f64,
    seq: u64,
    drawable: Drawable,
}

impl PartialEq for ByEnd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByEnd {}

impl PartialOrd for ByEnd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByEnd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.end
            .total_cmp(&other.end)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl EndTimeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, drawable: Drawable) {
        let end = drawable.bbox().latest;
        self.heap.push(Reverse(ByEnd {
            end,
            seq: self.seq,
            drawable,
        }));
        self.seq += 1;
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop every drawable ending at or before `watermark`
    pub fn release(&mut self, watermark: f64) -> Vec<Drawable> {
        let mut out = Vec::new();
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.end > watermark {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                out.push(entry.drawable);
            }
        }
        out
    }

    /// Everything left, in end-time order
    pub fn drain(&mut self) -> Vec<Drawable> {
        self.release(f64::INFINITY)
    }
}

/// What to do when a drawable ends before the one written before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderCheck {
    Off,
    /// Abort the conversion
    Strict,
    /// Log and count
    #[default]
    Lenient,
}

impl std::str::FromStr for OrderCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(OrderCheck::Off),
            "strict" => Ok(OrderCheck::Strict),
            "lenient" | "warn" => Ok(OrderCheck::Lenient),
            other => Err(format!("unknown order check: {}", other)),
        }
    }
}

/// Verifies drawables arrive with non-decreasing end times
#[derive(Debug, Clone)]
pub struct OrderChecker {
    mode: OrderCheck,
    previous_end: f64,
    index: u64,
    violations: u64,
}

impl OrderChecker {
    pub fn new(mode: OrderCheck) -> Self {
        Self {
            mode,
            previous_end: f64::NEG_INFINITY,
            index: 0,
            violations: 0,
        }
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }

    pub fn check(&mut self, drawable: &Drawable) -> ConvertResult<()> {
        let index = self.index;
        self.index += 1;
        if self.mode == OrderCheck::Off {
            return Ok(());
        }

        let end = drawable.bbox().latest;
        if end >= self.previous_end {
            self.previous_end = end;
            return Ok(());
        }

        self.violations += 1;
        match self.mode {
            OrderCheck::Strict => Err(ConvertError::OrderViolation {
                index,
                previous_end: self.previous_end,
                current_end: end,
                drawable: drawable.bbox().to_string(),
            }),
            _ => {
                warn!(
                    "Drawable {} {} ends before the previous end {}",
                    index,
                    drawable.bbox(),
                    self.previous_end
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Primitive, Vertex};

    fn state(start: f64, end: f64) -> Drawable {
        Primitive::new(1, Vertex::new(0, start), Vertex::new(0, end)).into()
    }

    #[test]
    fn test_strict_flags_earlier_end() {
        let mut checker = OrderChecker::new(OrderCheck::Strict);
        checker.check(&state(0.0, 10.0)).unwrap();
        let err = checker.check(&state(2.0, 5.0)).unwrap_err();
        match err {
            ConvertError::OrderViolation {
                index,
                previous_end,
                current_end,
                ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(previous_end, 10.0);
                assert_eq!(current_end, 5.0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_lenient_counts_and_continues() {
        let mut checker = OrderChecker::new(OrderCheck::Lenient);
        checker.check(&state(0.0, 10.0)).unwrap();
        checker.check(&state(2.0, 5.0)).unwrap();
        checker.check(&state(3.0, 12.0)).unwrap();
        assert_eq!(checker.violations(), 1);

        let mut off = OrderChecker::new(OrderCheck::Off);
        off.check(&state(0.0, 10.0)).unwrap();
        off.check(&state(2.0, 5.0)).unwrap();
        assert_eq!(off.violations(), 0);
    }

    #[test]
    fn test_queue_releases_up_to_watermark() {
        let mut queue = EndTimeQueue::new();
        queue.push(state(0.0, 10.0));
        queue.push(state(2.0, 5.0));
        queue.push(state(1.0, 7.0));

        let first = queue.release(7.0);
        let ends: Vec<f64> = first.iter().map(|d| d.bbox().latest).collect();
        assert_eq!(ends, vec![5.0, 7.0]);
        assert_eq!(queue.len(), 1);

        let rest = queue.drain();
        assert_eq!(rest.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_order_check_from_str() {
        assert_eq!("STRICT".parse::<OrderCheck>().unwrap(), OrderCheck::Strict);
        assert_eq!("off".parse::<OrderCheck>().unwrap(), OrderCheck::Off);
        assert!("sometimes".parse::<OrderCheck>().is_err());
    }
}
