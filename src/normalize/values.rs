use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<T> {
    Value(T),
    Missing,
    Invalid,
}

pub const MAX_CELL_VALUE: u64 = 1_000_000_000_000_000;

const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%m-%d-%Y",
    "%Y%m%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

#[derive(Debug, Clone)]
pub struct ValueParser {
    amount_noise: Regex,
    iso_date: Regex,
    us_date: Regex,
}

impl ValueParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            amount_noise: Regex::new(r"[\s,$€£¥]|(?i:usd|eur|gbp)")
                .context("failed to compile amount cleanup regex")?,
            iso_date: Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$")
                .context("failed to compile ISO date regex")?,
            us_date: Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$")
                .context("failed to compile M/D/YYYY date regex")?,
        })
    }

    /// Parses a money or count cell after stripping currency symbols and
    /// thousands separators. Negative values and values above
    /// [`MAX_CELL_VALUE`] are reported as invalid.
    pub fn parse_amount(&self, raw: &str) -> Cell<Decimal> {
        let trimmed = raw.trim().trim_matches('"');
        if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
            return Cell::Missing;
        }

        let cleaned = self.amount_noise.replace_all(trimmed, "");
        let cleaned = cleaned.trim_start_matches('+');
        if cleaned.is_empty() {
            return Cell::Invalid;
        }

        let parsed = Decimal::from_str(cleaned).or_else(|_| Decimal::from_scientific(cleaned));
        match parsed {
            Ok(value) if value.is_sign_negative() && !value.is_zero() => Cell::Invalid,
            Ok(value) if value > Decimal::from(MAX_CELL_VALUE) => Cell::Invalid,
            Ok(value) => Cell::Value(value.normalize()),
            Err(_) => Cell::Invalid,
        }
    }

    pub fn parse_count(&self, raw: &str) -> Cell<u64> {
        match self.parse_amount(raw) {
            Cell::Value(value) => value
                .trunc()
                .to_u64()
                .map_or(Cell::Invalid, Cell::Value),
            Cell::Missing => Cell::Missing,
            Cell::Invalid => Cell::Invalid,
        }
    }

    pub fn parse_date(&self, raw: &str) -> Cell<NaiveDate> {
        let trimmed = raw.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }

        if let Some(captures) = self.iso_date.captures(trimmed) {
            return ymd_cell(&captures[1], &captures[2], &captures[3]);
        }
        if let Some(captures) = self.us_date.captures(trimmed) {
            return ymd_cell(&captures[3], &captures[1], &captures[2]);
        }

        parse_date_fallback(trimmed).map_or(Cell::Invalid, Cell::Value)
    }
}

fn ymd_cell(year: &str, month: &str, day: &str) -> Cell<NaiveDate> {
    let (Ok(year), Ok(month), Ok(day)) = (
        year.parse::<i32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return Cell::Invalid;
    };
    NaiveDate::from_ymd_opt(year, month, day).map_or(Cell::Invalid, Cell::Value)
}

fn parse_date_fallback(value: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc2822(value) {
        return Some(timestamp.date_naive());
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|timestamp| timestamp.date())
        })
}
