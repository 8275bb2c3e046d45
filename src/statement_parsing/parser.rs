use std::str::FromStr;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
    utils::non_empty,
};

/// Per-parser settings from the parsers file. Every map is "substring or raw
/// value" to account id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    pub file_patterns: IndexMap<String, String>,
    pub first_line_patterns: IndexMap<String, String>,
    pub account_aliases: IndexMap<String, String>,
}

impl ParserSettings {
    pub fn account_for_file(&self, file_name: &str) -> Option<&str> {
        find_pattern(&self.file_patterns, file_name)
    }

    pub fn account_for_first_line(&self, line: &str) -> Option<&str> {
        find_pattern(&self.first_line_patterns, line)
    }

    pub fn alias(&self, account: &str) -> Option<&str> {
        self.account_aliases.get(account).map(String::as_str)
    }
}

fn find_pattern<'a>(patterns: &'a IndexMap<String, String>, haystack: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern.as_str()))
        .map(|(_, account)| account.as_str())
}

/// What a parser knows about the file a line came from.
#[derive(Debug, Clone, Default)]
pub struct LineContext {
    pub file_name: String,
    pub account: Option<String>,
}

pub trait BankFormatParser: Sync + Send {
    fn identifier(&self) -> &'static str;

    /// Zone naive source dates are in. `None` when the source carries offsets.
    fn timezone(&self) -> Option<Tz>;

    fn date_format(&self) -> &'static str;

    fn unique_columns(&self) -> &'static [&'static str];

    fn must_exist_before_saving(&self) -> &'static [&'static str];

    fn settings(&self) -> &ParserSettings;

    fn matches_file_name(&self, file_name: &str) -> bool {
        self.settings().account_for_file(file_name).is_some()
    }

    /// `Ok(None)` drops the row without counting it.
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError>;

    /// Column names for exports without a header row.
    fn headers(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn reverse_rows(&self) -> bool {
        false
    }

    fn convert_to_local_time(&self, raw: &str) -> Result<DateTime<FixedOffset>, RowError> {
        convert_to_local_time(raw, self.date_format(), self.timezone())
    }

    /// Date column to `datetime`; an empty cell is left for validation to reject.
    fn date_column(
        &self,
        row: &RawRow,
        column: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RowError> {
        match cell(row, column) {
            Some(raw) => self.convert_to_local_time(raw).map(Some),
            None => Ok(None),
        }
    }
}

pub fn convert_to_local_time(
    raw: &str,
    format: &str,
    timezone: Option<Tz>,
) -> Result<DateTime<FixedOffset>, RowError> {
    let raw = raw.trim();

    let Some(tz) = timezone else {
        return DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, format))
            .map_err(|err| RowError::date(raw, err));
    };

    let naive = match NaiveDateTime::parse_from_str(raw, format) {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(raw, format)
            .map_err(|err| RowError::date(raw, err))?
            .and_time(NaiveTime::default()),
    };

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.fixed_offset()),
        LocalResult::Ambiguous(_, _) => Err(RowError::date(raw, format!("ambiguous in {tz}"))),
        LocalResult::None => Err(RowError::date(raw, format!("does not exist in {tz}"))),
    }
}

pub fn cell<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    non_empty(row.get(column).map(String::as_str))
}

pub fn text_cell(row: &RawRow, column: &str) -> Option<String> {
    cell(row, column).map(str::to_owned)
}

pub fn format_amount(amount: &str) -> String {
    let amount = amount.replace(&['–', '—', '−'][..], "-");
    let amount = amount.replace(&['$', ',', '+', '"', ' '][..], "");
    amount.trim().to_string()
}

/// Signed amount from a decorated cell: `$1,234.50`, `+$469.99`, `−5`, `(50.00)`.
pub fn parse_amount(row: &RawRow, column: &str) -> Result<Option<Decimal>, RowError> {
    let Some(raw) = cell(row, column) else {
        return Ok(None);
    };

    let cleaned = format_amount(raw);
    let (cleaned, negate) = match cleaned
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (inner.to_owned(), true),
        None => (cleaned, false),
    };

    if cleaned.is_empty() {
        return Ok(None);
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| RowError::InvalidAmount {
        column: column.to_owned(),
        value: raw.to_owned(),
    })?;

    Ok(Some(if negate { -value } else { value }))
}

/// Unsigned amount; zero counts as absent so only the side that applies is set.
pub fn parse_magnitude(row: &RawRow, column: &str) -> Result<Option<Decimal>, RowError> {
    Ok(parse_amount(row, column)?
        .map(|value| value.abs())
        .filter(|value| !value.is_zero()))
}

/// Split a signed amount into `(debit, credit)`.
pub fn split_signed(amount: Option<Decimal>) -> (Option<Decimal>, Option<Decimal>) {
    match amount {
        Some(value) if value.is_sign_negative() && !value.is_zero() => (Some(value.abs()), None),
        Some(value) => (None, Some(value)),
        None => (None, None),
    }
}
