use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-open event-time interval `[start, end)` in epoch milliseconds.
///
/// Ordered by `(end, start)` so that scans in ascending order visit the
/// windows that become complete first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Largest timestamp that still belongs to the window.
    pub fn max_timestamp(&self) -> i64 {
        self.end - 1
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl Ord for TimeWindow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.end
            .cmp(&other.end)
            .then_with(|| self.start.cmp(&other.start))
    }
}

impl PartialOrd for TimeWindow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_timestamp_is_end_minus_one() {
        assert_eq!(TimeWindow::new(0, 10).max_timestamp(), 9);
    }

    #[test]
    fn half_open_containment() {
        let w = TimeWindow::new(0, 10);
        assert!(w.contains(0));
        assert!(w.contains(9));
        assert!(!w.contains(10));
        assert!(!w.contains(-1));
    }

    #[test]
    fn ordered_by_end_then_start() {
        let mut ws = vec![
            TimeWindow::new(5, 15),
            TimeWindow::new(0, 10),
            TimeWindow::new(-5, 15),
        ];
        ws.sort();
        assert_eq!(
            ws,
            vec![
                TimeWindow::new(0, 10),
                TimeWindow::new(-5, 15),
                TimeWindow::new(5, 15),
            ]
        );
    }

    #[test]
    fn display() {
        assert_eq!(TimeWindow::new(0, 10).to_string(), "[0, 10)");
    }
}
