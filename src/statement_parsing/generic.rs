use chrono_tz::Tz;

use super::parser::{BankFormatParser, LineContext, ParserSettings, parse_amount, text_cell};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

/// Fallback for files already in canonical column names, with offsets on the
/// dates. Unknown columns pass through in `raw`.
pub struct GenericFormatParser {
    settings: ParserSettings,
}

impl GenericFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for GenericFormatParser {
    fn identifier(&self) -> &'static str {
        "generic"
    }

    fn timezone(&self) -> Option<Tz> {
        None
    }

    fn date_format(&self) -> &'static str {
        "%+"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["datetime", "account"]
    }

    fn must_exist_before_saving(&self) -> &'static [&'static str] {
        &["datetime", "account"]
    }

    fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    fn matches_file_name(&self, _file_name: &str) -> bool {
        true
    }

    // datetime,account,description,debit,credit,balance,type,...
    // 2024-02-11T13:00:00+10:00,brokerage,,,,10432.50,BAL,
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "datetime")?,
            account: text_cell(row, "account").or_else(|| ctx.account.to_owned()),
            description: text_cell(row, "description"),
            debit: parse_amount(row, "debit")?,
            credit: parse_amount(row, "credit")?,
            balance: parse_amount(row, "balance")?,
            tx_type: text_cell(row, "type"),
            raw: row.clone(),
        }))
    }
}
