use std::{collections::HashMap, path::Path, sync::Arc};

use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::error::IngestError;

pub mod parser;
pub use parser::{BankFormatParser, LineContext, ParserSettings};

mod bankwest;
mod cba;
mod chase;
mod commsec;
mod generic;
mod rest;
mod ubank;
mod westpac;

pub use bankwest::BankwestFormatParser;
pub use cba::CbaFormatParser;
pub use chase::ChaseFormatParser;
pub use commsec::CommsecFormatParser;
pub use generic::GenericFormatParser;
pub use rest::RestFormatParser;
pub use ubank::UbankFormatParser;
pub use westpac::WestpacFormatParser;

/// The parser chosen for a file and the account id the match implied, if any.
#[derive(Clone)]
pub struct Selection {
    pub parser: Arc<dyn BankFormatParser>,
    pub account: Option<String>,
}

/// Parsers in priority order. The last one always matches.
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn BankFormatParser>>,
}

impl ParserRegistry {
    pub fn new(mut settings: HashMap<String, ParserSettings>) -> Self {
        let mut take = |identifier: &str| settings.remove(identifier).unwrap_or_default();

        let parsers: Vec<Arc<dyn BankFormatParser>> = vec![
            Arc::new(BankwestFormatParser::new(take("bankwest"))),
            Arc::new(CbaFormatParser::new(take("cba"))),
            Arc::new(ChaseFormatParser::new(take("chase"))),
            Arc::new(CommsecFormatParser::new(take("commsec"))),
            Arc::new(RestFormatParser::new(take("rest"))),
            Arc::new(UbankFormatParser::new(take("ubank"))),
            Arc::new(WestpacFormatParser::new(take("westpac"))),
            Arc::new(GenericFormatParser::new(take("generic"))),
        ];

        for unknown in settings.keys() {
            tracing::warn!("no parser named {unknown}, its settings are ignored");
        }

        Self { parsers }
    }

    /// Registry over an explicit list, without the generic fallback.
    pub fn from_parsers(parsers: Vec<Arc<dyn BankFormatParser>>) -> Self {
        Self { parsers }
    }

    pub fn parsers(&self) -> &[Arc<dyn BankFormatParser>] {
        &self.parsers
    }

    #[tracing::instrument(skip(self))]
    pub async fn select(&self, path: &Path) -> Result<Selection, IngestError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut first_line: Option<String> = None;

        for parser in &self.parsers {
            let settings = parser.settings();

            if let Some(account) = settings.account_for_file(&file_name) {
                return Ok(selected(parser, Some(account)));
            }

            if parser.matches_file_name(&file_name) {
                return Ok(selected(parser, None));
            }

            if settings.first_line_patterns.is_empty() {
                continue;
            }

            if first_line.is_none() {
                first_line = Some(read_first_data_line(path).await?);
            }

            if let Some(account) = first_line
                .as_deref()
                .and_then(|line| settings.account_for_first_line(line))
            {
                return Ok(selected(parser, Some(account)));
            }
        }

        Err(IngestError::UnmatchedFile(path.to_path_buf()))
    }
}

fn selected(parser: &Arc<dyn BankFormatParser>, account: Option<&str>) -> Selection {
    tracing::debug!("selected parser {}", parser.identifier());

    Selection {
        parser: parser.clone(),
        account: account.map(str::to_owned),
    }
}

/// Second line of the file, the first one after the header.
async fn read_first_data_line(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    lines.next_line().await?;
    let line = lines.next_line().await?.unwrap_or_default();

    Ok(line)
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;

    use super::*;

    fn patterns(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn file_patterns_win_and_set_the_account() {
        let registry = ParserRegistry::new(HashMap::from([(
            "chase".to_owned(),
            ParserSettings {
                file_patterns: patterns(&[("Chase7316", "322271627 7316")]),
                ..Default::default()
            },
        )]));

        let selection = registry
            .select(Path::new("/in/Chase7316_Activity_20231108.CSV"))
            .await
            .unwrap();
        assert_eq!(selection.parser.identifier(), "chase");
        assert_eq!(selection.account.as_deref(), Some("322271627 7316"));
    }

    #[tokio::test]
    async fn name_match_without_account() {
        let registry = ParserRegistry::new(HashMap::new());
        let selection = registry
            .select(Path::new("/in/Bankwest Transactions.csv"))
            .await
            .unwrap();
        assert_eq!(selection.parser.identifier(), "bankwest");
        assert_eq!(selection.account, None);
    }

    #[tokio::test]
    async fn first_data_line_is_matched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CSVData.csv");
        tokio::fs::write(
            &path,
            "Date,Reference,Details,Debit($),Credit($),Balance($)\n\
             18/12/2023,C148177126,S 400 IZZ @ 36.200000,,14450.05,-14450.05\n",
        )
        .await
        .unwrap();

        let registry = ParserRegistry::new(HashMap::from([(
            "commsec".to_owned(),
            ParserSettings {
                first_line_patterns: patterns(&[(",C1", "commsec trading")]),
                ..Default::default()
            },
        )]));

        let selection = registry.select(&path).await.unwrap();
        assert_eq!(selection.parser.identifier(), "commsec");
        assert_eq!(selection.account.as_deref(), Some("commsec trading"));
    }

    #[tokio::test]
    async fn unmatched_names_fall_back_to_generic() {
        let registry = ParserRegistry::new(HashMap::new());
        let selection = registry.select(Path::new("/in/export.csv")).await.unwrap();
        assert_eq!(selection.parser.identifier(), "generic");
    }

    #[tokio::test]
    async fn no_match_is_an_error() {
        let parsers: Vec<Arc<dyn BankFormatParser>> = vec![Arc::new(WestpacFormatParser::new(
            ParserSettings::default(),
        ))];
        let registry = ParserRegistry::from_parsers(parsers);
        let err = registry.select(Path::new("/in/export.csv")).await.err();
        assert!(matches!(err, Some(IngestError::UnmatchedFile(_))));
    }

    #[test]
    fn generic_is_last() {
        let registry = ParserRegistry::new(HashMap::new());
        assert_eq!(
            registry.parsers().last().map(|p| p.identifier()),
            Some("generic")
        );
    }
}
