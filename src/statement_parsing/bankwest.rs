use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, cell, convert_to_local_time, parse_amount,
    parse_magnitude, text_cell,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

// "05:04PM 27Jul" inside a narration
static EMBEDDED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d\d?):(\d\d)([AP]M) (\d\d?)([A-Z]{3})\b").expect("embedded time regex")
});

pub struct BankwestFormatParser {
    settings: ParserSettings,
}

impl BankwestFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    /// Bankwest exports only carry a date; card purchases often have the real
    /// time in the narration. The narration date is never after the posting
    /// date, so a late December purchase posted in January is last year's.
    fn refine_datetime(
        &self,
        narration: &str,
        datetime: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let caps = EMBEDDED_TIME.captures(narration)?;

        let at_year = |year: i32| {
            let parsable = format!(
                "{} {} {} {}:{} {}",
                &caps[4],
                &caps[5],
                year,
                &caps[1],
                &caps[2],
                caps[3].to_uppercase()
            );
            NaiveDateTime::parse_from_str(&parsable, "%d %b %Y %I:%M %p").ok()
        };

        let posted = datetime.date_naive();
        let naive = match at_year(posted.year())? {
            naive if naive.date() > posted => at_year(posted.year() - 1)?,
            naive => naive,
        };

        convert_to_local_time(
            &naive.format("%Y-%m-%d %H:%M").to_string(),
            "%Y-%m-%d %H:%M",
            self.timezone(),
        )
        .ok()
    }
}

impl BankFormatParser for BankwestFormatParser {
    fn identifier(&self) -> &'static str {
        "bankwest"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Perth)
    }

    fn date_format(&self) -> &'static str {
        "%d/%m/%Y"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["Transaction Date", "Narration", "Credit", "Debit"]
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

    fn matches_file_name(&self, file_name: &str) -> bool {
        file_name.to_lowercase().contains("bankwest")
    }

    // BSB Number,Account Number,Transaction Date,Narration,Cheque,Debit,Credit,Balance,Transaction Type
    // 302-985,1360851,02/10/2023,"MCDONALDS DT 0606 BEACON HILL AUS","",35.10,,15701.29,WDC
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        let narration = cell(row, "Narration").unwrap_or_default();
        if narration.to_lowercase().starts_with("authorisation only") {
            return Ok(None);
        }

        let mut datetime = self.date_column(row, "Transaction Date")?;
        if let Some(refined) = datetime.and_then(|dt| self.refine_datetime(narration, dt)) {
            datetime = Some(refined);
        }

        let account = match (cell(row, "BSB Number"), cell(row, "Account Number")) {
            (Some(bsb), Some(number)) => {
                let account = format!("{} {}", bsb.replace('-', ""), number);
                Some(self.settings.alias(&account).unwrap_or(&account).to_owned())
            }
            _ => ctx.account.to_owned(),
        };

        Ok(Some(CanonicalRecord {
            datetime,
            account,
            description: text_cell(row, "Narration"),
            debit: parse_magnitude(row, "Debit")?,
            credit: parse_magnitude(row, "Credit")?,
            balance: parse_amount(row, "Balance")?,
            tx_type: text_cell(row, "Transaction Type"),
            raw: row.clone(),
        }))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;

    use super::*;

    fn row(date: &str, narration: &str, debit: &str, credit: &str) -> RawRow {
        [
            ("BSB Number", "302-985"),
            ("Account Number", "1360851"),
            ("Transaction Date", date),
            ("Narration", narration),
            ("Cheque", ""),
            ("Debit", debit),
            ("Credit", credit),
            ("Balance", "15701.29"),
            ("Transaction Type", "WDC"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn authorisation_holds_are_dropped() {
        let parser = BankwestFormatParser::new(ParserSettings::default());
        let line = row(
            "02/10/2023",
            "AUTHORISATION ONLY - EFTPOS PURCHASE AT WOOLWORTHS",
            "127.72",
            "",
        );

        let processed = parser.process_line(&line, &LineContext::default()).unwrap();
        assert!(processed.is_none());
    }

    #[test]
    fn settled_rows_become_debits() {
        let parser = BankwestFormatParser::new(ParserSettings::default());
        let line = row("02/10/2023", "MCDONALDS DT 0606 BEACON HILL AUS", "35.10", "");

        let record = parser
            .process_line(&line, &LineContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(record.account.as_deref(), Some("302985 1360851"));
        assert_eq!(record.debit, Some(Decimal::new(3510, 2)));
        assert_eq!(record.credit, None);
        assert_eq!(record.tx_type.as_deref(), Some("WDC"));
        assert_eq!(
            record.datetime.unwrap().to_rfc3339(),
            "2023-10-02T00:00:00+08:00"
        );
    }

    #[test]
    fn time_in_narration_refines_the_date() {
        let parser = BankwestFormatParser::new(ParserSettings::default());
        let line = row("28/07/2023", "SQ *CAFE SYDNEY 05:04PM 27Jul", "4.50", "");

        let record = parser
            .process_line(&line, &LineContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(
            record.datetime.unwrap().to_rfc3339(),
            "2023-07-27T17:04:00+08:00"
        );
    }

    #[test]
    fn december_purchase_posted_in_january_keeps_its_year() {
        let parser = BankwestFormatParser::new(ParserSettings::default());
        let line = row("02/01/2024", "SQ *CAFE SYDNEY 11:30PM 31Dec", "4.50", "");

        let record = parser
            .process_line(&line, &LineContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(
            record.datetime.unwrap().to_rfc3339(),
            "2023-12-31T23:30:00+08:00"
        );
    }

    #[test]
    fn unparsable_dates_fail_the_row() {
        let parser = BankwestFormatParser::new(ParserSettings::default());
        let line = row("2023-10-02", "WOOLWORTHS", "1.00", "");

        assert!(matches!(
            parser.process_line(&line, &LineContext::default()),
            Err(RowError::InvalidDate { .. })
        ));
    }
}
