//! Decode query input: address/value lists and `name index value` files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{QueryError, StoreError};
use crate::resolve::NameResolver;

/// One register value to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterQuery {
    /// Register address as hex.
    pub address: String,
    /// Value read from the register as hex.
    pub value: String,
}

impl RegisterQuery {
    /// Creates a query.
    #[must_use]
    pub fn new(address: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            value: value.into(),
        }
    }

    /// Parses `[{"address": "0x..", "value": "0x.."}, ...]`.
    ///
    /// Single-quoted strings are accepted too, as written by shell users:
    /// `[{'address':'0x30330070','value':'0x0'}]`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidList`] if neither form parses.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, QueryError> {
        match serde_json::from_str(text) {
            Ok(queries) => Ok(queries),
            Err(err) if text.contains('\'') => serde_json::from_str(&text.replace('\'', "\""))
                .map_err(|_| QueryError::InvalidList(err.to_string())),
            Err(err) => Err(QueryError::InvalidList(err.to_string())),
        }
    }
}

/// One `name index value` line of a register list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    /// Register name.
    pub name: String,
    /// Instance index or peripheral name.
    pub index: String,
    /// Value as hex.
    pub value: String,
}

/// Parses a register list: one `name index value` per line.
///
/// Blank lines are skipped; columns after the third are ignored.
///
/// # Errors
///
/// Returns [`QueryError::MalformedLine`] for a line with fewer than three
/// columns.
pub fn parse_register_list(text: &str) -> Result<Vec<NamedQuery>, QueryError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            let mut columns = line.split_whitespace();
            match (columns.next(), columns.next(), columns.next()) {
                (Some(name), Some(index), Some(value)) => Ok(NamedQuery {
                    name: name.to_string(),
                    index: index.to_string(),
                    value: value.to_string(),
                }),
                _ => Err(QueryError::MalformedLine {
                    line: number + 1,
                    text: line.to_string(),
                }),
            }
        })
        .collect()
}

/// Reads and parses a register list file.
///
/// # Errors
///
/// Returns [`QueryError`] when the file cannot be read or a line is malformed.
pub fn load_register_list(path: &Path) -> Result<Vec<NamedQuery>, QueryError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_register_list(&text)
}

/// Resolves names to addresses; unresolved names are logged and skipped.
#[must_use]
pub fn resolve_named<R: NameResolver + ?Sized>(
    resolver: &R,
    named: &[NamedQuery],
) -> Vec<RegisterQuery> {
    named
        .iter()
        .filter_map(|query| match resolver.address_of(&query.name, &query.index) {
            Ok(address) => Some(RegisterQuery::new(address, query.value.clone())),
            Err(err) => {
                warn!(register = %query.name, index = %query.index, error = %err, "register not found");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_register_list, resolve_named, NamedQuery, RegisterQuery};
    use crate::error::{LookupError, QueryError};
    use crate::resolve::NameResolver;

    #[test]
    fn json_and_single_quoted_lists() {
        let expected = vec![RegisterQuery::new("0x30330070", "0x00000000")];
        assert_eq!(
            RegisterQuery::parse_list(r#"[{"address":"0x30330070","value":"0x00000000"}]"#)
                .expect("json"),
            expected
        );
        assert_eq!(
            RegisterQuery::parse_list("[{'address': '0x30330070', 'value': '0x00000000'}]")
                .expect("single quotes"),
            expected
        );
    }

    #[test]
    fn list_entries_need_both_keys() {
        let err = RegisterQuery::parse_list(r#"[{"address":"0x30330070"}]"#).expect_err("no value");
        assert!(matches!(err, QueryError::InvalidList(_)));
        assert!(RegisterQuery::parse_list("0x30330070").is_err());
    }

    #[test]
    fn register_list_lines() {
        let parsed = parse_register_list("USART_CR1 USART2 0x1\n\n  GPR1 0 0x2 trailing\n")
            .expect("list");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].name, "GPR1");
        assert_eq!(parsed[1].value, "0x2");

        let err = parse_register_list("GPR1 0x2\n").expect_err("two columns");
        assert!(matches!(err, QueryError::MalformedLine { line: 1, .. }));
    }

    struct OnlyGpr1;

    impl NameResolver for OnlyGpr1 {
        fn address_of(&self, name: &str, _index: &str) -> Result<String, LookupError> {
            if name == "GPR1" {
                Ok("0x30340004".into())
            } else {
                Err(LookupError::UnknownRegister(name.into()))
            }
        }
    }

    #[test]
    fn unresolved_names_are_skipped() {
        let named = vec![
            NamedQuery {
                name: "GPR9".into(),
                index: "0".into(),
                value: "0x1".into(),
            },
            NamedQuery {
                name: "GPR1".into(),
                index: "0".into(),
                value: "0x2".into(),
            },
        ];
        assert_eq!(
            resolve_named(&OnlyGpr1, &named),
            vec![RegisterQuery::new("0x30340004", "0x2")]
        );
    }
}
