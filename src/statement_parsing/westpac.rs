use chrono_tz::Tz;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, cell, parse_amount, parse_magnitude, text_cell,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

pub struct WestpacFormatParser {
    settings: ParserSettings,
}

impl WestpacFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for WestpacFormatParser {
    fn identifier(&self) -> &'static str {
        "westpac"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Sydney)
    }

    fn date_format(&self) -> &'static str {
        "%d/%m/%Y"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["datetime", "account", "description", "balance"]
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
        file_name.to_lowercase().contains("westpac")
    }

    // Bank Account,Date,Narrative,Debit Amount,Credit Amount,Balance,Categories,Serial
    // 732002671776,06/10/2023,EFTPOS DEBIT 0464015 MANOOSH PIZZERIA,75.89,,5148.13,POS,
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        let account = match cell(row, "Bank Account") {
            Some(raw) => Some(self.settings.alias(raw).unwrap_or(raw).to_owned()),
            None => ctx.account.to_owned(),
        };

        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Date")?,
            account,
            description: text_cell(row, "Narrative"),
            debit: parse_magnitude(row, "Debit Amount")?,
            credit: parse_magnitude(row, "Credit Amount")?,
            balance: parse_amount(row, "Balance")?,
            tx_type: text_cell(row, "Categories"),
            raw: row.clone(),
        }))
    }
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;

    use super::*;

    #[test]
    fn bank_account_goes_through_aliases() {
        let parser = WestpacFormatParser::new(ParserSettings {
            account_aliases: IndexMap::from([(
                "732002671776".to_owned(),
                "westpac everyday".to_owned(),
            )]),
            ..Default::default()
        });

        let row: RawRow = [
            ("Bank Account", "732002671776"),
            ("Date", "06/10/2023"),
            ("Narrative", "EFTPOS DEBIT 0464015 MANOOSH PIZZERIA"),
            ("Debit Amount", "75.89"),
            ("Credit Amount", ""),
            ("Balance", "5148.13"),
            ("Categories", "POS"),
            ("Serial", ""),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let record = parser
            .process_line(&row, &LineContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(record.account.as_deref(), Some("westpac everyday"));
        assert_eq!(record.tx_type.as_deref(), Some("POS"));
    }
}
