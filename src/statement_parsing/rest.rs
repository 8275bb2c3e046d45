use chrono_tz::Tz;

use super::parser::{
    BankFormatParser, LineContext, ParserSettings, parse_amount, split_signed, text_cell,
};
use crate::{
    data::{CanonicalRecord, RawRow},
    error::RowError,
};

/// Rest superannuation fee and contribution history.
pub struct RestFormatParser {
    settings: ParserSettings,
}

impl RestFormatParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }
}

impl BankFormatParser for RestFormatParser {
    fn identifier(&self) -> &'static str {
        "rest"
    }

    fn timezone(&self) -> Option<Tz> {
        Some(chrono_tz::Australia::Sydney)
    }

    fn date_format(&self) -> &'static str {
        "%d/%m/%Y"
    }

    fn unique_columns(&self) -> &'static [&'static str] {
        &["datetime", "description", "debit", "credit"]
    }

    fn must_exist_before_saving(&self) -> &'static [&'static str] {
        &["datetime", "description", "debit or credit"]
    }

    fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    // Received,TransactionType,Total($)
    // 28/02/2025,Administration Fee,-6
    fn process_line(
        &self,
        row: &RawRow,
        ctx: &LineContext,
    ) -> Result<Option<CanonicalRecord>, RowError> {
        let (debit, credit) = split_signed(parse_amount(row, "Total($)")?);

        Ok(Some(CanonicalRecord {
            datetime: self.date_column(row, "Received")?,
            account: ctx.account.to_owned(),
            description: text_cell(row, "TransactionType"),
            debit,
            credit,
            balance: None,
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
    fn fees_are_debits_and_contributions_credits() {
        let parser = RestFormatParser::new(ParserSettings::default());
        let ctx = LineContext {
            file_name: "rest_super.csv".to_owned(),
            account: Some("rest super".to_owned()),
        };
        let row = |received: &str, kind: &str, total: &str| -> RawRow {
            [("Received", received), ("TransactionType", kind), ("Total($)", total)]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        let fee = parser
            .process_line(&row("28/02/2025", "Administration Fee", "-6"), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(fee.debit, Some(Decimal::new(6, 0)));
        assert_eq!(fee.credit, None);
        assert_eq!(fee.account.as_deref(), Some("rest super"));
        assert_eq!(
            fee.datetime.unwrap().to_rfc3339(),
            "2025-02-28T00:00:00+11:00"
        );

        let contribution = parser
            .process_line(&row("14/03/2025", "Employer Contribution", "512.40"), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(contribution.debit, None);
        assert_eq!(contribution.credit, Some(Decimal::new(51240, 2)));
    }
}
