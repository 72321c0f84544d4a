//! tabscrape Engine
//!
//! Runs SQL through an interactive command-line shell and recovers
//! structured rows from its printed transcript:
//!
//! - [`shell`]: writes the statement to a transient script, runs the shell
//!   with a timeout and captures raw output
//! - [`transcript`]: finds the header line and turns data lines into rows
//! - [`dump`] and [`tis620`]: rebuild Thai text from `DUMP()` byte listings
//! - [`merge`]: joins two result sets on a shared key column
//! - [`engine`]: the `execute_query` facade used by callers

pub mod dump;
pub mod engine;
pub mod hint;
pub mod merge;
pub mod row;
pub mod shell;
pub mod tis620;
pub mod transcript;

pub use engine::{QueryEngine, QueryOutcome};
pub use hint::HeaderHint;
pub use merge::merge_rows;
pub use row::{ResultRow, Value};
pub use shell::{IsqlShell, RawTranscript, SqlShell};
pub use transcript::{ParseOptions, ParseReport};
