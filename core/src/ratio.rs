//! Zero-safe arithmetic shared by every rollup.
//!
//! RULE: No rollup divides directly. Every ratio, proportion and mean
//! goes through this module, so no output column can hold NaN or inf.

/// `num / den`, or 0 when the denominator is zero or either side is not finite.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        return 0.0;
    }
    let ratio = num / den;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// `safe_div` over possibly-missing operands. A missing side yields 0.
pub fn safe_div_opt(num: Option<f64>, den: Option<f64>) -> f64 {
    match (num, den) {
        (Some(n), Some(d)) => safe_div(n, d),
        _ => 0.0,
    }
}

/// `safe_div_opt` clamped to [0, 1], for proportions whose numerator is
/// not guaranteed to be part of the denominator (debt over credit line).
pub fn safe_share(num: Option<f64>, den: Option<f64>) -> f64 {
    safe_div_opt(num, den).clamp(0.0, 1.0)
}

/// Coerce raw text to a number. Anything unparseable or non-finite is missing.
pub fn coerce_f64(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Coerce raw text to a whole number. Accepts "12" and "12.0", rejects "12.5".
pub fn coerce_i64(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    coerce_f64(trimmed).and_then(whole_number)
}

/// A float that holds an exact integer, as i64.
pub fn whole_number(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Missing-aware running statistics over one numeric column.
///
/// Missing values are skipped entirely: they add nothing to the sum and
/// do not count toward the mean's denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericAgg {
    count: u64,
    sum:   f64,
    min:   Option<f64>,
    max:   Option<f64>,
}

impl NumericAgg {
    pub fn push(&mut self, value: Option<f64>) {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return;
        };
        self.count += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// Number of non-missing values seen.
    pub fn count(&self) -> u64 { self.count }

    /// Sum with a minimum count of one: missing when nothing was observed.
    pub fn sum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| safe_div(self.sum, self.count as f64))
    }

    pub fn min(&self) -> Option<f64> { self.min }
    pub fn max(&self) -> Option<f64> { self.max }
}

/// Min/max over an integer column, skipping missing values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeAgg {
    min: Option<i64>,
    max: Option<i64>,
}

impl RangeAgg {
    pub fn push(&mut self, value: Option<i64>) {
        let Some(v) = value else { return };
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    pub fn min(&self) -> Option<i64> { self.min }
    pub fn max(&self) -> Option<i64> { self.max }

    /// max − min, or missing when nothing was observed.
    pub fn span(&self) -> Option<i64> {
        Some(self.max? - self.min?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominator_yields_zero() {
        assert_eq!(safe_div(5.0, 0.0), 0.0);
        assert_eq!(safe_div(0.0, 0.0), 0.0);
        assert_eq!(safe_div(f64::NAN, 2.0), 0.0);
        assert_eq!(safe_div(3.0, f64::INFINITY), 0.0);
        assert_eq!(safe_div_opt(Some(1.0), None), 0.0);
        assert_eq!(safe_div_opt(None, Some(4.0)), 0.0);
        assert_eq!(safe_div(1.0, 4.0), 0.25);
    }

    #[test]
    fn share_is_clamped_to_unit_interval() {
        assert_eq!(safe_share(Some(150.0), Some(100.0)), 1.0);
        assert_eq!(safe_share(Some(-20.0), Some(100.0)), 0.0);
        assert_eq!(safe_share(Some(25.0), Some(100.0)), 0.25);
        assert_eq!(safe_share(Some(25.0), Some(0.0)), 0.0);
    }

    #[test]
    fn coercion_rejects_garbage() {
        assert_eq!(coerce_f64(" 12.5 "), Some(12.5));
        assert_eq!(coerce_f64("abc"), None);
        assert_eq!(coerce_f64("inf"), None);
        assert_eq!(coerce_f64(""), None);
        assert_eq!(coerce_i64("-365"), Some(-365));
        assert_eq!(coerce_i64("-12.0"), Some(-12));
        assert_eq!(coerce_i64("-12.5"), None);
    }

    #[test]
    fn numeric_agg_skips_missing() {
        let mut agg = NumericAgg::default();
        assert_eq!(agg.sum(), None, "sum needs at least one value");
        assert_eq!(agg.mean(), None);

        agg.push(Some(2.0));
        agg.push(None);
        agg.push(Some(4.0));
        agg.push(Some(f64::NAN));

        assert_eq!(agg.count(), 2);
        assert_eq!(agg.sum(), Some(6.0));
        assert_eq!(agg.mean(), Some(3.0));
        assert_eq!(agg.min(), Some(2.0));
        assert_eq!(agg.max(), Some(4.0));
    }

    #[test]
    fn range_span_is_non_negative() {
        let mut range = RangeAgg::default();
        assert_eq!(range.span(), None);
        range.push(Some(-10));
        assert_eq!(range.span(), Some(0));
        range.push(None);
        range.push(Some(-2));
        range.push(Some(-40));
        assert_eq!(range.min(), Some(-40));
        assert_eq!(range.max(), Some(-2));
        assert_eq!(range.span(), Some(38));
    }
}
