use chrono_tz::Tz;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, cell, parse_amount, parse_magnitude,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

pub struct CommsecFormatParser {
    settings: ParserSettings,
}

impl CommsecFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for CommsecFormatParser {
    fn identifier(&self) -> &'static str {
        "commsec"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Sydney)
    }

    fn date_format(&self) -> &'static str {
        "%d/%m/%Y"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["datetime", "description", "balance"]
    }

    fn must_exist_before_saving(&self) -> &'static [&'static str] {
        &[
            "datetime",
            "account",
            "description",
            "debit or credit",
            "balance",
        ]
    }

    fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    // Date,Reference,Details,Debit($),Credit($),Balance($)
    // 18/12/2023,C148177126,S 400 IZZ @ 36.200000,,14450.05,-14450.05
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        if cell(row, "Date").is_some_and(|d| d.contains("No transactions found")) {
            return Ok(None);
        }

        let description = match (cell(row, "Details"), cell(row, "Reference")) {
            (Some(details), Some(reference)) => Some(format!("{details} (Ref: {reference})")),
            (Some(details), None) => Some(details.to_owned()),
            (None, _) => None,
        };

        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Date")?,
            account: ctx.account.to_owned(),
            description,
            debit: parse_magnitude(row, "Debit($)")?,
            credit: parse_magnitude(row, "Credit($)")?,
            balance: parse_amount(row, "Balance($)")?,
            tx_type: None,
            raw: row.clone(),
        }))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;

    use super::*;

    fn row(date: &str) -> RawRow {
        [
            ("Date", date),
            ("Reference", "C148177126"),
            ("Details", "S 400 IZZ @ 36.200000"),
            ("Debit($)", ""),
            ("Credit($)", "14450.05"),
            ("Balance($)", "-14450.05"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn reference_is_folded_into_description() {
        let parser = CommsecFormatParser::new(ParserSettings::default());
        let record = parser
            .process_line(&row("18/12/2023"), &LineContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(
            record.description.as_deref(),
            Some("S 400 IZZ @ 36.200000 (Ref: C148177126)")
        );
        assert_eq!(record.credit, Some(Decimal::new(1445005, 2)));
        assert_eq!(record.balance, Some(Decimal::new(-1445005, 2)));
    }

    #[test]
    fn empty_statement_marker_is_dropped() {
        let parser = CommsecFormatParser::new(ParserSettings::default());
        let processed = parser
            .process_line(
                &row("No transactions found for this period"),
                &LineContext::default(),
            )
            .unwrap();
        assert!(processed.is_none());
    }
}
