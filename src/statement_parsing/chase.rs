use chrono_tz::Tz;

use super::parser::{BankFormatParser, LineContext, ParserSettings, cell, parse_amount, text_cell};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

pub struct ChaseFormatParser {
    settings: ParserSettings,
}

impl ChaseFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for ChaseFormatParser {
    fn identifier(&self) -> &'static str {
        "chase"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::America::Los_Angeles)
    }

    fn date_format(&self) -> &'static str {
        "%m/%d/%Y"
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

    // Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
    // DEBIT,11/07/2023,"TRANSFER TO SAV XXXXX7316 11/07",-5.00,ACCT_XFER,3153.40,,
    // CREDIT,11/06/2023,"VENMO CASHOUT PPD ID: 5264681992",44.00,ACH_CREDIT,3244.40,,
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        let description = text_cell(row, "Description");

        if description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().starts_with("preauth"))
        {
            tracing::debug!("skipping pre-authorisation {:?}", description);
            return Ok(None);
        }

        let amount = parse_amount(row, "Amount")?.map(|a| a.abs());
        let (debit, credit) = match cell(row, "Details") {
            Some("DEBIT") | Some("CHECK") => (amount, None),
            _ => (None, amount),
        };

        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Posting Date")?,
            account: ctx.account.to_owned(),
            description,
            debit,
            credit,
            balance: parse_amount(row, "Balance")?,
            tx_type: text_cell(row, "Type"),
            raw: row.clone(),
        }))
    }
}
