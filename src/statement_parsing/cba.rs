use chrono_tz::Tz;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, parse_amount, split_signed, text_cell,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

/// Commonwealth Bank exports have no header row and one signed amount column.
pub struct CbaFormatParser {
    settings: ParserSettings,
}

impl CbaFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for CbaFormatParser {
    fn identifier(&self) -> &'static str {
        "cba"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Sydney)
    }

    fn date_format(&self) -> &'static str {
        "%d/%m/%Y"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["datetime", "description", "debit", "credit", "balance"]
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

    fn headers(&self) -> Option<&'static [&'static str]> {
        Some(&["Date", "Amount", "Description", "Balance"])
    }

    // 21/12/2023,-34118.18,Transfer to other Bank NetBank final paymnt,0.00
    // 01/12/2023,+81.60,Credit Interest,+69668.13
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        let (debit, credit) = split_signed(parse_amount(row, "Amount")?);

        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Date")?,
            account: ctx.account.to_owned(),
            description: text_cell(row, "Description"),
            debit,
            credit,
            balance: parse_amount(row, "Balance")?,
            tx_type: None,
            raw: row.clone(),
        }))
    }
}
