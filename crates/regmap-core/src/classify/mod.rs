//! Pure classifiers for table cells and text lines of reference manuals.
//!
//! Nothing here holds state. The extractors own the state machines and ask
//! these functions what a cell or line is.

use std::sync::OnceLock;

use regex::Regex;

/// Classifiers for i.MX "field descriptions" tables and page text.
pub mod imx;
/// Classifiers for STM32MP register chapters and peripheral maps.
pub mod stm32;

/// What a single table cell or text fragment looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Upper-case identifier such as `MUX_MODE` or `GPR_\nCORESIGHT_`.
    FieldName,
    /// Starts with a bit number or range (`21`, `31–28`, `7:0`).
    BitRange,
    /// `Address:`, `Address offset:` or `Reset value:` line.
    AddressLine,
    /// Anything else: description or continuation prose.
    Continuation,
}

fn leading_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+(?:[:–-]\d+)?)\s+").expect("leading range pattern"))
}

fn bare_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(?:\s*[:–-]\s*\d+)?$").expect("bare range pattern"))
}

/// True for an upper-case identifier cell: has `A-Z` or `_`, no lower case, no `-`.
///
/// Embedded newlines from wrapped PDF cells are ignored.
#[must_use]
pub fn is_field_name(cell: &str) -> bool {
    let joined = cell.replace('\n', "");
    joined.chars().any(|c| c.is_ascii_uppercase() || c == '_')
        && !joined.chars().any(|c| c.is_ascii_lowercase() || c == '-')
}

/// Returns the bit-range prefix of a cell such as `31–28\nGPR_DBG_MASK`.
///
/// The prefix must be followed by whitespace (usually the wrapped newline).
#[must_use]
pub fn leading_bit_range(cell: &str) -> Option<&str> {
    leading_range_pattern()
        .captures(cell)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Classifies one cell or line fragment.
#[must_use]
pub fn classify_cell(cell: &str) -> CellKind {
    let trimmed = cell.trim();
    if trimmed.starts_with("Address:")
        || trimmed.starts_with("Address offset:")
        || trimmed.starts_with("Reset value:")
    {
        CellKind::AddressLine
    } else if leading_bit_range(cell).is_some() || bare_range_pattern().is_match(trimmed) {
        CellKind::BitRange
    } else if is_field_name(trimmed) {
        CellKind::FieldName
    } else {
        CellKind::Continuation
    }
}
