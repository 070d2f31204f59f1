//! Monthly bureau balance status vocabulary.
//!
//! RULE: The status vocabulary is closed. Every raw STATUS value maps to
//! exactly one BalanceStatus, and anything unrecognised lands in Other.
//! The status pivot therefore always has the same columns, whatever the
//! input data contains.
//!
//! Ordinal codes 0..=5 are days-past-due buckets (0 = current,
//! 5 = 120+ days or written off). C (closed) and X (unknown) are
//! categorical markers with no numeric value. A non-negative integer
//! code outside 0..=5 pivots into OTHER but keeps its ordinal, so it
//! still counts toward the delinquency statistics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BalanceStatus {
    Dpd0,
    Dpd1,
    Dpd2,
    Dpd3,
    Dpd4,
    Dpd5,
    Closed,
    Unknown,
    /// Outside the vocabulary. Carries the ordinal when the raw code was one.
    Other(Option<u32>),
}

impl BalanceStatus {
    pub const COUNT: usize = 9;

    /// Every status in column order. NEVER reorder, column order follows it.
    pub const ALL: [BalanceStatus; Self::COUNT] = [
        Self::Dpd0,
        Self::Dpd1,
        Self::Dpd2,
        Self::Dpd3,
        Self::Dpd4,
        Self::Dpd5,
        Self::Closed,
        Self::Unknown,
        Self::Other(None),
    ];

    /// Map a raw STATUS value onto the vocabulary.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "C" | "c" => Self::Closed,
            "X" | "x" => Self::Unknown,
            other => match crate::ratio::coerce_i64(other) {
                Some(value) => Self::from_ordinal(value)
                    .unwrap_or_else(|| Self::Other(u32::try_from(value).ok())),
                None => Self::Other(None),
            },
        }
    }

    /// The vocabulary bucket for an ordinal in 0..=5.
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Dpd0),
            1 => Some(Self::Dpd1),
            2 => Some(Self::Dpd2),
            3 => Some(Self::Dpd3),
            4 => Some(Self::Dpd4),
            5 => Some(Self::Dpd5),
            _ => None,
        }
    }

    /// Days past due, or None for categorical markers and non-numeric codes.
    pub fn ordinal(self) -> Option<u32> {
        match self {
            Self::Dpd0 => Some(0),
            Self::Dpd1 => Some(1),
            Self::Dpd2 => Some(2),
            Self::Dpd3 => Some(3),
            Self::Dpd4 => Some(4),
            Self::Dpd5 => Some(5),
            Self::Closed | Self::Unknown => None,
            Self::Other(ordinal) => ordinal,
        }
    }

    /// True when the month was reported with any days past due.
    pub fn is_delinquent(self) -> bool {
        self.ordinal().is_some_and(|dpd| dpd > 0)
    }

    pub fn is_other(self) -> bool {
        matches!(self, Self::Other(_))
    }

    /// Stable token used in column names.
    pub fn token(self) -> &'static str {
        match self {
            Self::Dpd0     => "0",
            Self::Dpd1     => "1",
            Self::Dpd2     => "2",
            Self::Dpd3     => "3",
            Self::Dpd4     => "4",
            Self::Dpd5     => "5",
            Self::Closed   => "C",
            Self::Unknown  => "X",
            Self::Other(_) => "OTHER",
        }
    }

    /// Text written to the source table. `parse` reads it back unchanged.
    pub fn source_text(self) -> String {
        match self {
            Self::Other(Some(ordinal)) => ordinal.to_string(),
            status => status.token().to_string(),
        }
    }

    /// Pivot column position.
    pub fn index(self) -> usize {
        match self {
            Self::Dpd0     => 0,
            Self::Dpd1     => 1,
            Self::Dpd2     => 2,
            Self::Dpd3     => 3,
            Self::Dpd4     => 4,
            Self::Dpd5     => 5,
            Self::Closed   => 6,
            Self::Unknown  => 7,
            Self::Other(_) => 8,
        }
    }
}

/// Per-status record counts for one loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally([u64; BalanceStatus::COUNT]);

impl StatusTally {
    pub fn add(&mut self, status: BalanceStatus) {
        self.0[status.index()] += 1;
    }

    pub fn get(&self, status: BalanceStatus) -> u64 {
        self.0[status.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// (status, count) in column order.
    pub fn iter(&self) -> impl Iterator<Item = (BalanceStatus, u64)> + '_ {
        BalanceStatus::ALL.iter().map(|s| (*s, self.0[s.index()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinal_and_categorical_codes() {
        assert_eq!(BalanceStatus::parse("0"), BalanceStatus::Dpd0);
        assert_eq!(BalanceStatus::parse(" 3 "), BalanceStatus::Dpd3);
        assert_eq!(BalanceStatus::parse("5.0"), BalanceStatus::Dpd5);
        assert_eq!(BalanceStatus::parse("C"), BalanceStatus::Closed);
        assert_eq!(BalanceStatus::parse("X"), BalanceStatus::Unknown);
    }

    #[test]
    fn unseen_codes_fall_into_other() {
        for raw in ["-1", "Z", "", "2.5", "closed"] {
            assert_eq!(BalanceStatus::parse(raw), BalanceStatus::Other(None), "raw={raw:?}");
        }
        assert_eq!(BalanceStatus::Other(None).ordinal(), None);
    }

    #[test]
    fn out_of_range_ordinals_pivot_to_other_but_keep_their_value() {
        let status = BalanceStatus::parse("7");
        assert_eq!(status, BalanceStatus::Other(Some(7)));
        assert!(status.is_other());
        assert_eq!(status.ordinal(), Some(7));
        assert!(status.is_delinquent());
        assert_eq!(status.index(), BalanceStatus::Other(None).index());
        assert_eq!(status.token(), "OTHER");
        assert_eq!(BalanceStatus::parse(&status.source_text()), status);
        assert_eq!(BalanceStatus::parse(&BalanceStatus::Other(None).source_text()), BalanceStatus::Other(None));
    }

    #[test]
    fn vocabulary_order_matches_index() {
        for (i, status) in BalanceStatus::ALL.iter().enumerate() {
            assert_eq!(status.index(), i);
        }
    }

    #[test]
    fn only_positive_ordinals_are_delinquent() {
        assert!(!BalanceStatus::Dpd0.is_delinquent());
        assert!(BalanceStatus::Dpd1.is_delinquent());
        assert!(!BalanceStatus::Closed.is_delinquent());
        assert!(!BalanceStatus::Unknown.is_delinquent());
        assert!(!BalanceStatus::Other(None).is_delinquent());
    }
}
