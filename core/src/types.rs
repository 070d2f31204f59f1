//! Shared primitive types used across every rollup.

/// Current-application client identifier (`SK_ID_CURR`).
pub type ClientId = i64;

/// Bureau credit line identifier (`SK_ID_BUREAU`).
pub type LoanId = i64;

/// Previous application identifier (`SK_ID_PREV`).
pub type ApplicationId = i64;

/// Originating row identifier. Secondary key for deterministic tie-breaks.
pub type RecordId = i64;

/// Month offset relative to the reference date. Always <= 0.
pub type MonthOffset = i64;

/// Day offset relative to the reference date. Always <= 0.
pub type DayOffset = i64;

/// The canonical run identifier.
pub type RunId = String;
