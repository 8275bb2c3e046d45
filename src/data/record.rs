use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{error::RowError, utils::non_empty};

/// One source row as read from the csv, column name to cell.
pub type RawRow = IndexMap<String, String>;

/// The normalized shape every bank row is turned into.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub datetime: Option<DateTime<FixedOffset>>,
    pub account: Option<String>,
    pub description: Option<String>,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub raw: RawRow,
}

impl CanonicalRecord {
    /// Value of a named field as text. Canonical fields shadow source columns
    /// of the same name; anything else is looked up in the source row.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "datetime" => self
                .datetime
                .map(|d| d.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            "account" => text(&self.account),
            "description" => text(&self.description),
            "debit" => self.debit.map(decimal_text),
            "credit" => self.credit.map(decimal_text),
            "balance" => self.balance.map(decimal_text),
            "type" => text(&self.tx_type),
            column => non_empty(self.raw.get(column).map(String::as_str)).map(str::to_owned),
        }
    }

    pub fn validate(&self, requirements: &[Requirement]) -> Result<(), RowError> {
        for requirement in requirements {
            requirement.check(self)?;
        }

        Ok(())
    }

    /// Dedup id: SHA-256 over the values of `columns`, in order. Account and
    /// datetime are always part of it, so one id never spans two accounts or
    /// two instants.
    pub fn identity(&self, columns: &[&str]) -> String {
        let scope = ["account", "datetime"]
            .into_iter()
            .filter(|column| !columns.contains(column));

        let mut hasher = Sha256::new();
        for column in columns.iter().copied().chain(scope) {
            hasher.update(self.identity_value(column).as_bytes());
            hasher.update(b";");
        }

        hex::encode(hasher.finalize())
    }

    fn identity_value(&self, column: &str) -> String {
        let value = match column {
            "datetime" => self
                .datetime
                .map(|d| {
                    d.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                })
                .unwrap_or_default(),
            "description" => return self.field(column).unwrap_or_default(),
            column => self.field(column).unwrap_or_default(),
        };

        value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == ',')
            .collect()
    }
}

impl fmt::Display for CanonicalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .datetime
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let amount = match (self.debit, self.credit) {
            (Some(debit), _) => format!("-${debit}"),
            (None, Some(credit)) => format!("+${credit}"),
            (None, None) => String::new(),
        };
        let balance = self.balance.map(|b| b.to_string()).unwrap_or_default();

        write!(
            f,
            "{date} {} {amount} Bal:${balance}",
            self.description.as_deref().unwrap_or("")
        )
    }
}

fn text(value: &Option<String>) -> Option<String> {
    non_empty(value.as_deref()).map(str::to_owned)
}

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

/// One entry of a parser's `must_exist_before_saving` list. `"debit or credit"`
/// is satisfied when either side is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Field(String),
    AnyOf(Vec<String>),
}

impl Requirement {
    pub fn parse(column: &str) -> Self {
        let alternatives = column
            .split(" or ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect::<Vec<String>>();

        if alternatives.len() > 1 {
            Requirement::AnyOf(alternatives)
        } else {
            Requirement::Field(column.trim().to_owned())
        }
    }

    pub fn parse_all(columns: &[&str]) -> Vec<Self> {
        columns.iter().map(|column| Self::parse(column)).collect()
    }

    pub fn check(&self, record: &CanonicalRecord) -> Result<(), RowError> {
        match self {
            Requirement::Field(name) => match record.field(name) {
                Some(_) => Ok(()),
                None => Err(RowError::MissingField(name.to_owned())),
            },
            Requirement::AnyOf(names) => {
                if names.iter().any(|name| record.field(name).is_some()) {
                    Ok(())
                } else {
                    Err(RowError::MissingField(names.join(" or ")))
                }
            }
        }
    }
}
