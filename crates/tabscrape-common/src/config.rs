//! Configuration for the shell gateway and transcript parser

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment prefix for [`ParseSettings::from_env`], e.g.
/// `TABSCRAPE_PARSE__HEADER_KEYWORDS=STUDENTID,EMAIL`
pub const PARSE_ENV_PREFIX: &str = "TABSCRAPE_PARSE";

/// How the transient SQL script is written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptEncoding {
    /// One byte per character; Thai characters use their TIS-620 code
    #[default]
    Tis620,
    /// Write the statement as UTF-8
    Utf8,
}

impl std::str::FromStr for ScriptEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tis620" | "tis-620" => Ok(ScriptEncoding::Tis620),
            "utf8" | "utf-8" => Ok(ScriptEncoding::Utf8),
            other => Err(format!("unknown script encoding '{}'", other)),
        }
    }
}

/// How captured shell output is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    /// UTF-8 when the bytes are valid UTF-8, otherwise TIS-620. Short runs
    /// of TIS-620 can also be valid UTF-8 (`0xC3 0xA1` reads as `á`), so
    /// set `tis620` when the shell is known to print single-byte Thai.
    #[default]
    Auto,
    /// Always one byte per character through the TIS-620 table
    Tis620,
    /// Always UTF-8, invalid sequences replaced
    Utf8,
}

impl std::str::FromStr for OutputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(OutputEncoding::Auto),
            "tis620" | "tis-620" => Ok(OutputEncoding::Tis620),
            "utf8" | "utf-8" => Ok(OutputEncoding::Utf8),
            other => Err(format!("unknown output encoding '{}'", other)),
        }
    }
}

/// Settings for launching the interactive SQL shell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// Shell executable
    pub program: String,
    /// Arguments placed before the data source name
    pub args: Vec<String>,
    /// ODBC data source name; omitted from the command line when empty
    pub dsn: String,
    /// Wall-clock limit per statement
    pub timeout_secs: u64,
    /// Directory for transient script files
    pub temp_dir: PathBuf,
    /// Command appended after the statement to end the session
    pub terminator: String,
    /// Byte encoding of the script file
    pub script_encoding: ScriptEncoding,
    /// Decoding applied to the captured output
    pub output_encoding: OutputEncoding,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            program: "isql".into(),
            args: vec!["-v".into()],
            dsn: "NBU_DSN".into(),
            timeout_secs: 30,
            temp_dir: std::env::temp_dir(),
            terminator: "quit".into(),
            script_encoding: ScriptEncoding::Tis620,
            output_encoding: OutputEncoding::Auto,
        }
    }
}

impl ShellSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the transcript parser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    /// Column-name fragments that identify a header line when no hint is available
    pub header_keywords: Vec<String>,
    /// Marker that flags a byte-dump column
    pub dump_marker: String,
    /// Suffix stripped from a dump column to get its target column
    pub dump_suffix: String,
    /// `FROM=TO` renames applied to dump columns after suffix stripping
    pub legacy_renames: Vec<String>,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            header_keywords: [
                "STUDENTID",
                "DUMP_DATA",
                "TEST_NUMBER",
                "BANKCODE",
                "BANKNAME",
                "COUNT",
                "COURSEID",
                "THESISID",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            dump_marker: "DUMP".into(),
            dump_suffix: "_DUMP".into(),
            legacy_renames: vec!["DUMP_DATA=THESISNAME".into()],
        }
    }
}

impl ParseSettings {
    /// Load parser settings from `<PREFIX>__FIELD` environment variables.
    /// List fields take comma-separated values.
    pub fn from_env(prefix: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("header_keywords")
                    .with_list_parse_key("legacy_renames"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parsed `FROM=TO` rename pairs; malformed entries are skipped
    pub fn rename_pairs(&self) -> Vec<(String, String)> {
        self.legacy_renames
            .iter()
            .filter_map(|entry| {
                let (from, to) = entry.split_once('=')?;
                let (from, to) = (from.trim(), to.trim());
                if from.is_empty() || to.is_empty() {
                    None
                } else {
                    Some((from.to_string(), to.to_string()))
                }
            })
            .collect()
    }
}

/// Get environment variable as parsed type with default
pub fn env_parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
