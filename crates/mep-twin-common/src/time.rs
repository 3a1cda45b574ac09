//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Calendar helpers for month-stepped simulation."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use chrono::{Datelike, Months, NaiveDate};

/// Mean Julian year, used for every day/year conversion.
pub const DAYS_PER_YEAR: f64 = 365.25;
pub const HOURS_PER_YEAR: f64 = DAYS_PER_YEAR * 24.0;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    add_months(month_start(date), 1)
        .pred_opt()
        .unwrap_or(date)
}

/// Calendar month arithmetic, clamping the day to the target month's length and saturating
/// at [`NaiveDate::MAX`].
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// `"YYYY-MM"` key used for monthly records.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Parse a `"YYYY-MM"` key back into the first day of that month.
pub fn parse_month_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d").ok()
}

/// Signed elapsed time in years between two dates.
pub fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / DAYS_PER_YEAR
}
