//! Media segments, buffer operations and buffered time ranges
//!
//! All media times are seconds as `f64`, matching the playback surface's
//! time register.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Tolerance when deciding whether two ranges touch
const CONTIGUITY_EPSILON: f64 = 1e-3;

/// One opaque chunk from the segment source
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Arrival order within a session
    pub sequence: u64,
    /// Media start time in seconds
    pub start: f64,
    /// Media duration in seconds
    pub duration: f64,
    pub payload: Bytes,
}

impl Segment {
    pub fn new(sequence: u64, start: f64, duration: f64, payload: impl Into<Bytes>) -> Self {
        Segment {
            sequence,
            start,
            duration,
            payload: payload.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A mutation against the buffer resource
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Append(Segment),
    /// Drop buffered media in `[start, end)`
    Remove { start: f64, end: f64 },
}

impl Operation {
    pub fn is_remove(&self) -> bool {
        matches!(self, Operation::Remove { .. })
    }

    pub fn is_append(&self) -> bool {
        matches!(self, Operation::Append(_))
    }

    /// Sequence number of an append
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Operation::Append(segment) => Some(segment.sequence),
            Operation::Remove { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Append(_) => "append",
            Operation::Remove { .. } => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Append(segment) => write!(
                f,
                "append(#{} {:.2}s+{:.2}s, {} bytes)",
                segment.sequence,
                segment.start,
                segment.duration,
                segment.len()
            ),
            Operation::Remove { start, end } => write!(f, "remove({:.2}s..{:.2}s)", start, end),
        }
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        TimeRange { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Disjoint, ordered ranges currently held by the buffer resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferedExtent {
    ranges: Vec<TimeRange>,
}

impl BufferedExtent {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from ranges in any order; touching or overlapping ranges are merged
    pub fn from_ranges(mut ranges: Vec<TimeRange>) -> Self {
        ranges.retain(|r| r.end > r.start);
        ranges.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end + CONTIGUITY_EPSILON => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        BufferedExtent { ranges: merged }
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Start of the first range
    pub fn start(&self) -> Option<f64> {
        self.ranges.first().map(|r| r.start)
    }

    /// End of the last range
    pub fn end(&self) -> Option<f64> {
        self.ranges.last().map(|r| r.end)
    }

    pub fn contains(&self, t: f64) -> bool {
        self.range_containing(t).is_some()
    }

    pub fn range_containing(&self, t: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.contains(t))
    }

    /// Total buffered media, gaps excluded
    pub fn duration(&self) -> f64 {
        self.ranges.iter().map(TimeRange::duration).sum()
    }
}

impl fmt::Display for BufferedExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => write!(f, "Buf: {:.1}s - {:.1}s", start, end),
            _ => write!(f, "Buf: empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_end_and_len() {
        let seg = Segment::new(3, 1.5, 0.1, vec![0u8; 42]);
        assert!((seg.end() - 1.6).abs() < 1e-9);
        assert_eq!(seg.len(), 42);
        assert!(!seg.is_empty());
        assert!(Segment::new(0, 0.0, 0.1, Vec::new()).is_empty());
    }

    #[test]
    fn test_operation_kind() {
        let append = Operation::Append(Segment::new(7, 0.0, 0.1, vec![1u8]));
        let remove = Operation::Remove { start: 0.0, end: 5.0 };
        assert!(append.is_append());
        assert_eq!(append.sequence(), Some(7));
        assert!(remove.is_remove());
        assert_eq!(remove.sequence(), None);
        assert_eq!(remove.to_string(), "remove(0.00s..5.00s)");
    }

    #[test]
    fn test_extent_merges_contiguous_ranges() {
        let extent = BufferedExtent::from_ranges(vec![
            TimeRange::new(0.1, 0.2),
            TimeRange::new(0.0, 0.1),
            TimeRange::new(0.5, 0.6),
        ]);
        assert_eq!(extent.ranges().len(), 2);
        assert_eq!(extent.start(), Some(0.0));
        assert_eq!(extent.end(), Some(0.6));
        assert!((extent.duration() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_extent_gap_lookup() {
        let extent =
            BufferedExtent::from_ranges(vec![TimeRange::new(0.0, 1.0), TimeRange::new(2.0, 3.0)]);
        assert!(extent.contains(0.5));
        assert!(!extent.contains(1.5));
        assert_eq!(extent.range_containing(2.5), Some(TimeRange::new(2.0, 3.0)));
        assert!(!extent.contains(3.0));
    }

    #[test]
    fn test_empty_extent() {
        let extent = BufferedExtent::empty();
        assert!(extent.is_empty());
        assert_eq!(extent.end(), None);
        assert_eq!(extent.to_string(), "Buf: empty");
    }
}
