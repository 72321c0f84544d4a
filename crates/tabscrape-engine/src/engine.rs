//! Query engine
//!
//! Composes the gateway, parser, decoder and merger behind the single
//! `execute_query(sql) -> rows` operation the rest of the service calls.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabscrape_common::{Result, ScrapeError};
use tracing::{debug, info, instrument, warn};

use crate::hint::HeaderHint;
use crate::merge::merge_rows;
use crate::row::{ResultRow, Value};
use crate::shell::SqlShell;
use crate::transcript::{self, ParseOptions, ParseReport};

/// Statement used by [`QueryEngine::ping`]
pub const PING_SQL: &str = "SELECT 1 AS TEST_NUMBER FROM DUAL";

/// Rows of one statement plus parse diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub rows: Vec<ResultRow>,
    pub report: ParseReport,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

/// Executes SQL through a shell and returns structured rows
#[derive(Clone)]
pub struct QueryEngine {
    shell: Arc<dyn SqlShell>,
    options: Arc<ParseOptions>,
}

impl QueryEngine {
    pub fn new(shell: Arc<dyn SqlShell>, options: ParseOptions) -> Self {
        Self {
            shell,
            options: Arc::new(options),
        }
    }

    /// Run one statement and return its rows in fetch order
    pub async fn execute_query(&self, sql: &str) -> Result<Vec<ResultRow>> {
        self.execute_query_with_report(sql, None)
            .await
            .map(|outcome| outcome.rows)
    }

    /// Run one statement, returning rows and diagnostics.
    ///
    /// Without an explicit hint, one is derived from the statement's
    /// projection when possible; the keyword heuristic covers the rest.
    #[instrument(skip(self, hint))]
    pub async fn execute_query_with_report(
        &self,
        sql: &str,
        hint: Option<&HeaderHint>,
    ) -> Result<QueryOutcome> {
        let start = Instant::now();
        let derived;
        let hint = match hint {
            Some(hint) => Some(hint),
            None => {
                derived = HeaderHint::from_sql(sql);
                derived.as_ref()
            }
        };

        let raw = self.shell.run(sql).await?;
        let text = raw.text();
        let parsed = transcript::parse_with_hint(&text, &self.options, hint)?;

        if parsed.rows.is_empty() && parsed.report.dropped_lines > 0 {
            warn!(
                dropped = parsed.report.dropped_lines,
                "Statement produced no usable rows"
            );
        }
        debug!(
            rows = parsed.rows.len(),
            reported = ?parsed.report.reported_rows,
            shell_ms = raw.elapsed.as_millis() as u64,
            "Query parsed"
        );

        Ok(QueryOutcome {
            rows: parsed.rows,
            report: parsed.report,
            elapsed: start.elapsed(),
        })
    }

    /// Fetch one logical record set split across two statements and merge it.
    ///
    /// Both statements run concurrently. A failed primary fails the call; a
    /// failed secondary degrades to the primary rows alone.
    #[instrument(skip(self, primary_sql, secondary_sql))]
    pub async fn fetch_split(
        &self,
        primary_sql: &str,
        secondary_sql: &str,
        join_key: &str,
    ) -> Result<Vec<ResultRow>> {
        let (primary, secondary) = tokio::join!(
            self.execute_query(primary_sql),
            self.execute_query(secondary_sql)
        );

        let primary = primary?;
        let secondary = match secondary {
            Ok(rows) => rows,
            Err(e) => {
                warn!(code = e.code(), "Secondary statement failed, returning primary rows only: {}", e);
                Vec::new()
            }
        };

        info!(
            primary = primary.len(),
            secondary = secondary.len(),
            "Merging split fetch"
        );
        Ok(merge_rows(primary, secondary, join_key))
    }

    /// Check that the shell can reach the database
    pub async fn ping(&self) -> Result<()> {
        let rows = self.execute_query(PING_SQL).await?;
        match rows.as_slice() {
            [row] if row.get("TEST_NUMBER").and_then(Value::as_i64) == Some(1) => Ok(()),
            _ => Err(ScrapeError::Parse(format!(
                "health probe returned unexpected rows: {:?}",
                rows
            ))),
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::RawTranscript;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned transcripts keyed by statement
    #[derive(Default)]
    struct FixtureShell {
        transcripts: HashMap<String, std::result::Result<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FixtureShell {
        fn with(mut self, sql: &str, stdout: &str) -> Self {
            self.transcripts.insert(sql.to_string(), Ok(stdout.to_string()));
            self
        }

        fn failing(mut self, sql: &str, stderr: &str) -> Self {
            self.transcripts.insert(sql.to_string(), Err(stderr.to_string()));
            self
        }
    }

    #[async_trait]
    impl SqlShell for FixtureShell {
        async fn run(&self, sql: &str) -> Result<RawTranscript> {
            self.calls.lock().unwrap().push(sql.to_string());
            match self.transcripts.get(sql) {
                Some(Ok(stdout)) => Ok(RawTranscript {
                    stdout: stdout.clone().into_bytes(),
                    ..Default::default()
                }),
                Some(Err(stderr)) => Err(ScrapeError::RemoteSql(stderr.clone())),
                None => Err(ScrapeError::Execution(format!("no fixture for {}", sql))),
            }
        }
    }

    fn engine(shell: FixtureShell) -> QueryEngine {
        QueryEngine::new(Arc::new(shell), ParseOptions::default())
    }

    const TEST_NUMBER_TRANSCRIPT: &str = "\
+---------------------------------------+
| Connected!                            |
|                                       |
| sql-statement                         |
| help [tablename]                      |
| quit                                  |
|                                       |
+---------------------------------------+
SQL> +------------+
| test_number|
+------------+
| 1          |
+------------+
SQLRowCount returns -1
1 rows fetched
SQL> ";

    #[tokio::test]
    async fn test_select_one_from_dual() {
        let sql = "SELECT 1 AS test_number FROM DUAL";
        let engine = engine(FixtureShell::default().with(sql, TEST_NUMBER_TRANSCRIPT));
        let rows = engine.execute_query(sql).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0]["test_number"], Value::Integer(1));
    }

    #[tokio::test]
    async fn test_report_uses_derived_hint() {
        let sql = "SELECT EMAIL, PHONE FROM STUDENT";
        let transcript = "| EMAIL | PHONE |\n| a@b.c | 0812345678 |\n| x |\n1 rows fetched\n";
        let engine = engine(FixtureShell::default().with(sql, transcript));
        let outcome = engine.execute_query_with_report(sql, None).await.unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.report.header, ["EMAIL", "PHONE"]);
        assert_eq!(outcome.report.header_source, Some(transcript::HeaderSource::Hint));
        assert_eq!(outcome.report.dropped_lines, 1);
        assert_eq!(outcome.report.reported_rows, Some(1));
    }

    #[tokio::test]
    async fn test_remote_error_propagates() {
        let sql = "SELECT * FROM MISSING";
        let engine = engine(FixtureShell::default().failing(sql, "ERROR: table not found"));
        let err = engine.execute_query(sql).await.unwrap_err();
        assert!(matches!(err, ScrapeError::RemoteSql(_)));
    }

    #[tokio::test]
    async fn test_fetch_split_merges_by_key() {
        let thai = "SELECT STUDENTID, DUMP(THESISNAME) as THESISNAME_DUMP FROM THESIS";
        let other = "SELECT STUDENTID, THESISNAMEENG FROM THESIS";
        let shell = FixtureShell::default()
            .with(
                thai,
                "| STUDENTID | THESISNAME_DUMP |\n\
                 | 6401 | Typ=1 Len=3: 161,210,195 |\n\
                 | 6402 | Typ=1 Len=2: 97,98 |\n",
            )
            .with(
                other,
                "| STUDENTID | THESISNAMEENG |\n\
                 | 6402 | Second |\n\
                 | 6401 | First |\n\
                 | 6499 | Orphan |\n",
            );
        let engine = engine(shell);
        let rows = engine.fetch_split(thai, other, "STUDENTID").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["STUDENTID"], Value::Integer(6401));
        assert_eq!(rows[0]["THESISNAME"], Value::from("การ"));
        assert_eq!(rows[0]["THESISNAMEENG"], Value::from("First"));
        assert_eq!(rows[1]["THESISNAME"], Value::from("ab"));
        assert_eq!(rows[1]["THESISNAMEENG"], Value::from("Second"));
    }

    #[tokio::test]
    async fn test_fetch_split_tolerates_secondary_failure() {
        let thai = "SELECT STUDENTID, DUMP(STUDENTNAME) as STUDENTNAME_DUMP FROM STUDENT";
        let other = "SELECT STUDENTID, EMAIL FROM STUDENT";
        let shell = FixtureShell::default()
            .with(thai, "| STUDENTID | STUDENTNAME_DUMP |\n| 1 | Len=2: 97,98 |\n")
            .failing(other, "ERROR: boom");
        let rows = engine(shell).fetch_split(thai, other, "STUDENTID").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["STUDENTNAME"], Value::from("ab"));
        assert!(!rows[0].contains_key("EMAIL"));
    }

    #[tokio::test]
    async fn test_fetch_split_fails_with_primary() {
        let shell = FixtureShell::default()
            .failing("P", "ERROR: primary")
            .with("S", "| STUDENTID |\n| 1 |\n");
        let err = engine(shell).fetch_split("P", "S", "STUDENTID").await.unwrap_err();
        assert!(matches!(err, ScrapeError::RemoteSql(ref msg) if msg.contains("primary")));
    }

    #[tokio::test]
    async fn test_ping() {
        let ok = FixtureShell::default().with(PING_SQL, "| TEST_NUMBER |\n| 1 |\n");
        assert!(engine(ok).ping().await.is_ok());

        let empty = FixtureShell::default().with(PING_SQL, "Connected!\n");
        assert!(matches!(engine(empty).ping().await, Err(ScrapeError::Parse(_))));
    }

    #[tokio::test]
    async fn test_outcome_serializes() {
        let engine = engine(FixtureShell::default().with(PING_SQL, "| TEST_NUMBER |\n| 1 |\n"));
        let outcome = engine.execute_query_with_report(PING_SQL, None).await.unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["rows"][0]["TEST_NUMBER"], 1);
        assert_eq!(json["report"]["header_source"], "hint");
    }
}
