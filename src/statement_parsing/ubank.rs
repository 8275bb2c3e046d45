use chrono_tz::Tz;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, parse_amount, parse_magnitude, text_cell,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

pub struct UbankFormatParser {
    settings: ParserSettings,
}

impl UbankFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for UbankFormatParser {
    fn identifier(&self) -> &'static str {
        "ubank"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Sydney)
    }

    fn date_format(&self) -> &'static str {
        "%d %b %Y"
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

    // Date,Description,Debit,Credit,Balance
    // 01 Apr 2020,Slide N Shake ,$44.20,,+$469.99
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Date")?,
            account: ctx.account.to_owned(),
            description: text_cell(row, "Description"),
            debit: parse_magnitude(row, "Debit")?,
            credit: parse_magnitude(row, "Credit")?,
            balance: parse_amount(row, "Balance")?,
            tx_type: None,
            raw: row.clone(),
        }))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn decorated_amounts_are_cleaned() {
        let parser = UbankFormatParser::new(ParserSettings::default());
        let row: RawRow = [
            ("Date", "01 Apr 2020"),
            ("Description", "Slide N Shake "),
            ("Debit", "$44.20"),
            ("Credit", ""),
            ("Balance", "+$469.99"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let record = parser
            .process_line(&row, &LineContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(record.description.as_deref(), Some("Slide N Shake"));
        assert_eq!(record.debit, Some(Decimal::new(4420, 2)));
        assert_eq!(record.credit, None);
        assert_eq!(record.balance, Some(Decimal::new(46999, 2)));
    }
}
