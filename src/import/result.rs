use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Earliest and latest date seen for one range descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub low: DateTime<Utc>,
    pub high: DateTime<Utc>,
}

impl DateRange {
    /// Inverted bounds, so any real date tightens both sides.
    fn unbounded() -> Self {
        Self {
            low: DateTime::<Utc>::MAX_UTC,
            high: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn observe(&mut self, date: DateTime<Utc>) {
        if date < self.low {
            self.low = date;
        }
        if date > self.high {
            self.high = date;
        }
    }
}

/// Counters and date spans for one file import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub lines: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub dates: IndexMap<String, DateRange>,
    pub inserted_ids: Vec<String>,
    pub file: String,
    pub parser: String,
    pub account: Option<String>,
    pub run_id: String,
}

impl ImportResult {
    pub fn new(file: &str, parser: &str, account: Option<&str>) -> Self {
        Self {
            file: file.to_owned(),
            parser: parser.to_owned(),
            account: account.map(str::to_owned),
            run_id: ulid::Ulid::new().to_string(),
            ..Default::default()
        }
    }

    pub fn insert(&mut self, id: &str) {
        self.inserted += 1;
        self.inserted_ids.push(id.to_owned());
    }

    pub fn set_min_max_date(&mut self, range_descriptor: &str, date: DateTime<Utc>) {
        self.dates
            .entry(range_descriptor.to_owned())
            .or_insert_with(DateRange::unbounded)
            .observe(date);
    }

    pub fn range(&self, range_descriptor: &str) -> Option<&DateRange> {
        self.dates.get(range_descriptor)
    }

    pub fn had_inserts(&self) -> bool {
        self.inserted > 0
    }

    pub fn is_success(&self) -> bool {
        self.invalid == 0
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.parser, self.file)?;

        if self.lines == 0 {
            return write!(f, "\n   No transactions in file");
        }

        let percent = self.inserted * 100 / self.lines;
        write!(
            f,
            "\n   {} of {}, {}% imported ({} skipped)",
            self.inserted, self.lines, percent, self.skipped
        )?;

        if self.invalid > 0 {
            write!(f, "\n   {} invalid", self.invalid)?;
        }

        if let Some(range) = self.range("in_file") {
            write!(
                f,
                "\n   {} to {}",
                range.low.format("%Y-%m-%d"),
                range.high.format("%Y-%m-%d")
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, d, 13, 0, 0).unwrap()
    }

    #[test]
    fn first_date_sets_both_bounds() {
        let mut result = ImportResult::default();
        result.set_min_max_date("in_file", day(11));

        let range = result.range("in_file").unwrap();
        assert_eq!(range.low, day(11));
        assert_eq!(range.high, day(11));
    }

    #[test]
    fn bounds_are_min_and_max_of_everything_fed() {
        let fed = [day(14), day(3), day(27), day(3), day(9), day(28), day(1)];

        let mut result = ImportResult::default();
        for date in fed {
            result.set_min_max_date("acct", date);
        }

        let range = result.range("acct").unwrap();
        assert_eq!(range.low, *fed.iter().min().unwrap());
        assert_eq!(range.high, *fed.iter().max().unwrap());
        assert!(fed.iter().all(|d| range.low <= *d && *d <= range.high));
        assert!(result.range("other").is_none());
    }

    #[test]
    fn success_and_inserts_are_derived() {
        let mut result = ImportResult::new("bankwest.csv", "bankwest", None);
        assert!(result.is_success());
        assert!(!result.had_inserts());
        assert_eq!(result.run_id.len(), 26);

        result.insert("abc");
        result.invalid += 1;
        assert!(result.had_inserts());
        assert!(!result.is_success());
        assert_eq!(result.inserted_ids, vec!["abc".to_owned()]);
    }

    #[test]
    fn summary_lines() {
        let empty = ImportResult::new("a.csv", "cba", None);
        assert_eq!(empty.to_string(), "cba a.csv\n   No transactions in file");

        let mut result = ImportResult::new("b.csv", "bankwest", None);
        result.lines = 4;
        result.inserted = 3;
        result.skipped = 1;
        result.set_min_max_date("in_file", day(11));
        result.set_min_max_date("in_file", day(20));
        assert_eq!(
            result.to_string(),
            "bankwest b.csv\n   3 of 4, 75% imported (1 skipped)\n   2024-02-11 to 2024-02-20"
        );
    }
}
