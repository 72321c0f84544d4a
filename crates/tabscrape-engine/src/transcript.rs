//! Transcript parser
//!
//! Turns the human-oriented output of `isql -v` into rows. A typical
//! transcript looks like:
//!
//! ```text
//! +---------------------------------------+
//! | Connected!                            |
//! |                                       |
//! | sql-statement                         |
//! | help [tablename]                      |
//! | quit                                  |
//! |                                       |
//! +---------------------------------------+
//! SQL> +-----------+-------------------------+
//! | STUDENTID | THESISNAME_DUMP         |
//! +-----------+-------------------------+
//! | 6401      | Typ=1 Len=3: 161,210,195|
//! +-----------+-------------------------+
//! SQLRowCount returns -1
//! 1 rows fetched
//! SQL>
//! ```
//!
//! The scan is a single forward pass once the header line is located.
//! Data lines whose field count does not match the header are dropped and
//! counted in the [`ParseReport`], never raised.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tabscrape_common::{ParseSettings, Result, ScrapeError};
use tracing::{debug, warn};

use crate::dump::{self, Decoded};
use crate::hint::HeaderHint;
use crate::row::{ResultRow, Value};

const FIELD_SEPARATOR: char = '|';

/// Substrings that mark a whole line as shell chrome
const CHROME_MARKERS: &[&str] = &["Connected!", "SQL>", "SQLRowCount", "rows fetched"];

/// Entries of the boxed connection banner
const BANNER_ENTRIES: &[&str] = &["sql-statement", "help [tablename]", "echo [string]", "quit"];

static ROWS_FETCHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s+rows?\s+fetched").expect("row summary pattern is a valid constant regex")
});

/// Parser options, usually built from [`ParseSettings`]
#[derive(Debug, Clone)]
pub struct ParseOptions {
    header_keywords: Vec<String>,
    dump_marker: String,
    dump_suffix: String,
    renames: Vec<(String, String)>,
}

impl ParseOptions {
    pub fn from_settings(settings: &ParseSettings) -> Self {
        Self {
            header_keywords: settings
                .header_keywords
                .iter()
                .map(|k| k.trim().to_ascii_uppercase())
                .filter(|k| !k.is_empty())
                .collect(),
            dump_marker: settings.dump_marker.clone(),
            dump_suffix: settings.dump_suffix.clone(),
            renames: settings.rename_pairs(),
        }
    }

    /// Marker, suffix and renames all match ASCII case-insensitively.
    fn is_dump_column(&self, header: &str) -> bool {
        !self.dump_marker.is_empty()
            && header
                .to_ascii_uppercase()
                .contains(&self.dump_marker.to_ascii_uppercase())
    }

    /// Column a decoded dump is stored under. The stripped name keeps the
    /// header's case; a rename target is used as configured.
    fn dump_target(&self, header: &str) -> String {
        let mut target = replace_ignore_ascii_case(header, &self.dump_suffix, "");
        for (from, to) in &self.renames {
            target = replace_ignore_ascii_case(&target, from, to);
        }
        target
    }

    fn is_keyword_header(&self, segments: &[&str]) -> bool {
        segments.iter().any(|segment| {
            let upper = segment.to_ascii_uppercase();
            self.header_keywords.iter().any(|k| upper.contains(k.as_str()))
        })
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from_settings(&ParseSettings::default())
    }
}

/// How the header line was recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSource {
    Hint,
    Keyword,
}

/// Diagnostics collected while parsing one transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    /// Header columns, empty when no header was found
    pub header: Vec<String>,
    pub header_source: Option<HeaderSource>,
    /// Data lines rejected for a field-count mismatch
    pub dropped_lines: usize,
    /// Row count announced by the shell's `N rows fetched` summary
    pub reported_rows: Option<usize>,
    /// Dump fields that decoded to the failure sentinel
    pub decode_failures: usize,
}

/// Rows plus diagnostics
#[derive(Debug, Clone, Default)]
pub struct ParsedTranscript {
    pub rows: Vec<ResultRow>,
    pub report: ParseReport,
}

/// Parse a transcript using the keyword heuristic only
pub fn parse(text: &str, options: &ParseOptions) -> Result<Vec<ResultRow>> {
    parse_with_hint(text, options, None).map(|parsed| parsed.rows)
}

/// Parse a transcript, preferring a header line that matches `hint`
pub fn parse_with_hint(
    text: &str,
    options: &ParseOptions,
    hint: Option<&HeaderHint>,
) -> Result<ParsedTranscript> {
    let lines: Vec<&str> = text.lines().collect();
    let mut report = ParseReport {
        reported_rows: lines.iter().rev().find_map(|line| rows_fetched(line)),
        ..Default::default()
    };

    let Some((header_idx, header, source)) = find_header(&lines, options, hint) else {
        debug!("No header line in transcript ({} lines)", lines.len());
        return Ok(ParsedTranscript {
            rows: Vec::new(),
            report,
        });
    };
    check_unique(&header)?;
    debug!(?header, ?source, "Found header");

    let mut rows = Vec::new();
    for line in &lines[header_idx + 1..] {
        if is_shell_noise(line) || !line.trim().starts_with(FIELD_SEPARATOR) {
            continue;
        }

        let values = segments(line);
        if values.len() != header.len() {
            debug!(
                expected = header.len(),
                found = values.len(),
                line = line.trim(),
                "Dropping data line with mismatched field count"
            );
            report.dropped_lines += 1;
            continue;
        }

        rows.push(build_row(&header, &values, options, &mut report));
    }

    if report.dropped_lines > 0 {
        warn!(
            dropped = report.dropped_lines,
            kept = rows.len(),
            "Transcript had data lines that could not be aligned with the header"
        );
    }

    report.header = header;
    report.header_source = Some(source);
    Ok(ParsedTranscript { rows, report })
}

fn build_row(
    header: &[String],
    values: &[&str],
    options: &ParseOptions,
    report: &mut ParseReport,
) -> ResultRow {
    let mut row = ResultRow::with_capacity(header.len());

    for (column, raw) in header.iter().zip(values) {
        if !options.is_dump_column(column) {
            row.insert(column.clone(), Value::coerce(raw));
            continue;
        }

        // Null dumps contribute no field at all.
        if *raw == "null" || *raw == "NULL" {
            continue;
        }
        let target = options.dump_target(column);
        if target == *column {
            continue;
        }
        let decoded = dump::decode_with_status(raw);
        if decoded == Decoded::Failed {
            report.decode_failures += 1;
        }
        row.insert(target, Value::Text(decoded.into_string()));
    }

    row
}

fn find_header(
    lines: &[&str],
    options: &ParseOptions,
    hint: Option<&HeaderHint>,
) -> Option<(usize, Vec<String>, HeaderSource)> {
    let candidates = || {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !is_chrome(line) && line.contains(FIELD_SEPARATOR))
            .map(|(idx, line)| (idx, segments(line)))
    };

    let hinted = hint.and_then(|hint| {
        candidates()
            .find(|(_, segs)| hint.matches(segs))
            .map(|(idx, segs)| (idx, segs, HeaderSource::Hint))
    });
    if hint.is_some() && hinted.is_none() {
        debug!("Header hint did not match any line, falling back to keywords");
    }

    hinted
        .or_else(|| {
            candidates()
                .find(|(_, segs)| options.is_keyword_header(segs))
                .map(|(idx, segs)| (idx, segs, HeaderSource::Keyword))
        })
        .map(|(idx, segs, source)| {
            (
                idx,
                segs.into_iter().map(str::to_string).collect(),
                source,
            )
        })
}

fn check_unique(header: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(header.len());
    for column in header {
        if !seen.insert(column.as_str()) {
            return Err(ScrapeError::Parse(format!(
                "duplicate column '{}' in header {:?}",
                column, header
            )));
        }
    }
    Ok(())
}

/// Non-empty trimmed fields of a line
fn segments(line: &str) -> Vec<&str> {
    line.split(FIELD_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Replace every occurrence of `needle`, comparing ASCII case-insensitively
fn replace_ignore_ascii_case(haystack: &str, needle: &str, with: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    // ASCII case folding keeps byte offsets, so matches in the folded copy
    // index straight into the original.
    let folded = haystack.to_ascii_uppercase();
    let needle = needle.to_ascii_uppercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in folded.match_indices(&needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(with);
        last = start + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

/// Lines that never carry data: blanks, shell prompts and summaries, and
/// table rules. Applies to every line, before and after the header.
fn is_shell_noise(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || CHROME_MARKERS.iter().any(|marker| line.contains(marker))
        || trimmed.chars().all(|c| matches!(c, '-' | '=' | '+'))
}

/// Header-search filter: shell noise plus the boxed connection banner.
/// Not used after the header, where `|  |` or `| quit |` may be real rows.
fn is_chrome(line: &str) -> bool {
    let trimmed = line.trim();
    if is_shell_noise(line) || trimmed == "quit" {
        return true;
    }
    if trimmed.starts_with(FIELD_SEPARATOR) && trimmed.ends_with(FIELD_SEPARATOR) {
        let inner = trimmed.trim_matches(FIELD_SEPARATOR).trim();
        return inner.is_empty() || BANNER_ENTRIES.contains(&inner);
    }
    false
}

fn rows_fetched(line: &str) -> Option<usize> {
    ROWS_FETCHED
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
