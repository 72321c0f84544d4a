//! Expected-header hints
//!
//! The transcript has no markup separating the header from data, so the
//! parser looks for a line that spells out the columns it expects. The
//! hint comes from the caller or is derived from the statement's
//! projection list.

use sqlparser::ast::{Expr, Ident, SelectItem, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, instrument};

/// Column labels the header line is expected to carry, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderHint {
    columns: Vec<String>,
}

impl HeaderHint {
    /// Build a hint from explicit column names
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Derive the hint from a single `SELECT`.
    ///
    /// Only works when every projection item has a name the shell will
    /// print: an alias or a plain column reference. Unquoted names are
    /// upper-cased the way the database folds them.
    #[instrument(level = "debug")]
    pub fn from_sql(sql: &str) -> Option<Self> {
        let dialect = GenericDialect {};
        let statements = match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                debug!("No header hint, statement did not parse: {}", e);
                return None;
            }
        };

        let [Statement::Query(query)] = statements.as_slice() else {
            return None;
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            return None;
        };

        let columns = select
            .projection
            .iter()
            .map(|item| match item {
                SelectItem::ExprWithAlias { alias, .. } => Some(label(alias)),
                SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Some(label(ident)),
                SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts)) => {
                    parts.last().map(label)
                }
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        if columns.is_empty() {
            return None;
        }
        Some(Self { columns })
    }

    pub fn names(&self) -> &[String] {
        &self.columns
    }

    /// True when `segments` spell out the hinted columns, ignoring ASCII case
    pub fn matches(&self, segments: &[&str]) -> bool {
        segments.len() == self.columns.len()
            && segments
                .iter()
                .zip(&self.columns)
                .all(|(segment, column)| segment.eq_ignore_ascii_case(column))
    }
}

fn label(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_and_columns() {
        let hint = HeaderHint::from_sql(
            "SELECT STUDENTID, DUMP(THESISNAME) as THESISNAME_DUMP FROM THESIS WHERE ROWNUM <= 5",
        )
        .unwrap();
        assert_eq!(hint.names(), ["STUDENTID", "THESISNAME_DUMP"]);
    }

    #[test]
    fn test_lowercase_alias_is_folded() {
        let hint = HeaderHint::from_sql("SELECT 1 as test_number FROM DUAL").unwrap();
        assert_eq!(hint.names(), ["TEST_NUMBER"]);
    }

    #[test]
    fn test_quoted_alias_keeps_case() {
        let hint = HeaderHint::from_sql(r#"SELECT t.id AS "Id" FROM t"#).unwrap();
        assert_eq!(hint.names(), ["Id"]);
    }

    #[test]
    fn test_compound_identifier_uses_last_part() {
        let hint = HeaderHint::from_sql("SELECT s.STUDENTID, s.EMAIL FROM STUDENT s").unwrap();
        assert_eq!(hint.names(), ["STUDENTID", "EMAIL"]);
    }

    #[test]
    fn test_no_hint_for_wildcards_or_unnamed_expressions() {
        assert!(HeaderHint::from_sql("SELECT * FROM STUDENT").is_none());
        assert!(HeaderHint::from_sql("SELECT COUNT(*) FROM THESIS").is_none());
        assert!(HeaderHint::from_sql("SELECT 1 FROM DUAL UNION SELECT 2 FROM DUAL").is_none());
        assert!(HeaderHint::from_sql("this is not sql").is_none());
    }

    #[test]
    fn test_matches_ignores_case() {
        let hint = HeaderHint::columns(["TEST_NUMBER"]);
        assert!(hint.matches(&["test_number"]));
        assert!(!hint.matches(&["test_number", "extra"]));
        assert!(!hint.matches(&["other"]));
    }
}
