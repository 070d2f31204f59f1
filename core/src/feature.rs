//! Tabular export seam shared by every output table.
//!
//! Column names follow `<SOURCE>_<METRIC>[_<STAT>]` in upper case.
//! Values are exported as f64; counts and flags are whole numbers.

pub const CLIENT_KEY: &str = "SK_ID_CURR";
pub const LOAN_KEY: &str = "SK_ID_BUREAU";

/// One row of an output feature table.
pub trait FeatureRow {
    /// Name of the key column.
    fn key_column() -> &'static str
    where
        Self: Sized;

    fn key(&self) -> i64;

    /// (column, value) pairs in stable column order, key excluded.
    fn features(&self) -> Vec<(String, f64)>;
}

/// Column names of a table, taken from its first row.
pub fn column_names<R: FeatureRow>(rows: &[R]) -> Vec<String> {
    rows.first()
        .map(|row| row.features().into_iter().map(|(name, _)| name).collect())
        .unwrap_or_default()
}

/// True for proportion columns, which must lie in [0, 1].
pub fn is_ratio_column(name: &str) -> bool {
    name.ends_with("_RATIO")
}

pub(crate) fn flag(value: bool) -> u8 {
    u8::from(value)
}
