//! Line and row classification for i.MX reference manuals.
//!
//! Register tables look like this after table extraction:
//!
//! ```text
//! ['IOMUXC_GPR_GPR1 field descriptions', None]
//! ['Field', 'Description']
//! ['21\nIOMUXC_GPR_\nENET_QOS_\nRGMII_EN', 'ENET QOS TX clock direction select']
//! [None, '0 MII(input)\n1 RGMII(output)']
//! ['Table continues on the next page...', None]
//! ```
//!
//! The manual is not consistent. Known irregularities handled here:
//! `['31–2\n-', 'This field is reserved.']` (no name),
//! `['GPR_\nCORESIGHT_\nGPR_CTM_SEL', ...]` (no range),
//! `['-', 'This field is reserved.']` (neither),
//! `['', '011 ALT3_ISP_FL_TRIG_0 — ...']` (empty first cell),
//! `['IMR2_CORE0_A\n53', ...]` (newline inside the name).

use std::sync::OnceLock;

use regex::Regex;

use super::{is_field_name, leading_bit_range};
use crate::bits::{parse_range, BitRange, RangeError};

/// Field name used for a bare `-` cell.
pub const RESERVED_BUG_FIELD: &str = "NXP bug -";

/// Description text that marks a reserved field.
pub const RESERVED_DESCRIPTION: &str = "This field is reserved.";

/// Marker row at the bottom of a table that spills onto the next page.
pub const CONTINUES_MARKER: &str = "Table continues on the next page";

/// The one field whose missing range is known: always bits 2-0.
pub const MUX_MODE_FIELD: &str = "MUX_MODE";

/// Classified line of page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLine<'a> {
    /// Empty after trimming.
    Blank,
    /// `<NAME> field descriptions`, optionally `(continued)`.
    RegisterHeader {
        /// Register name.
        name: &'a str,
        /// The heading carries `continued`.
        continued: bool,
    },
    /// `Address: ... = <hex>h`, normalized to `0x...`.
    Address(String),
    /// Any other text.
    Other,
}

/// Classified row of a register table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRow {
    /// No usable cells.
    Empty,
    /// A cell containing `field descriptions`; carries the full cell text.
    TableHeading(String),
    /// The `['Field', 'Description']` header.
    ColumnHeader,
    /// `Table continues on the next page...`.
    ContinuesNextPage,
    /// Start of a new bitfield.
    Field {
        /// Resolved range or documentation-bug marker.
        range: BitRange,
        /// Field name with wrap newlines removed.
        name: String,
        /// First description line.
        description: String,
    },
    /// Rest of a field name wrapped onto a continued page.
    NameContinuation(String),
    /// Empty first cell with text: more description for the open field.
    ContinuationText(String),
    /// `None` first cell: description text for the open field.
    DescriptionRow(Option<String>),
    /// A first cell that matches no known shape.
    Unrecognized(String),
}

fn register_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([A-Z0-9_]+)\s+field descriptions").expect("register header pattern")
    })
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Address: (\S+)").expect("address pattern"))
}

/// Classifies one line of page text.
#[must_use]
pub fn classify_text_line(line: &str) -> TextLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return TextLine::Blank;
    }

    if let Some(caps) = register_header_pattern().captures(line) {
        if let Some(name) = caps.get(1) {
            return TextLine::RegisterHeader {
                name: name.as_str(),
                continued: line.contains("continued"),
            };
        }
    }

    if let Some(caps) = address_pattern().captures(line) {
        let token = caps.get(1).map_or("", |m| m.as_str());
        let raw = line.split_once('=').map_or(token, |(_, rhs)| rhs);
        return TextLine::Address(normalize_address(raw));
    }

    TextLine::Other
}

/// Normalizes `3033_0070h` style addresses to `0x30330070`.
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    let compact: String = raw.trim().chars().filter(|c| *c != '_').collect();
    compact
        .strip_suffix('h')
        .map_or_else(|| compact.clone(), |hex| format!("0x{hex}"))
}

/// Heading cell of a register's table.
#[must_use]
pub fn table_heading(register: &str, continued: bool) -> String {
    if continued {
        format!("{register} field descriptions (continued)")
    } else {
        format!("{register} field descriptions")
    }
}

/// Classifies one table row.
///
/// `resumed` is set while reading the continued part of a table on a new
/// page; there an upper-case cell with an empty description is the wrapped
/// remainder of the previous field name rather than an undocumented field.
///
/// # Errors
///
/// Returns [`RangeError`] if a leading bit range does not parse.
pub fn classify_row(row: &[Option<String>], resumed: bool) -> Result<FieldRow, RangeError> {
    let first = row.first().and_then(Option::as_deref);
    let second = row.get(1).and_then(Option::as_deref);

    let Some(cell) = first else {
        return Ok(FieldRow::DescriptionRow(second.map(str::to_string)));
    };

    if cell.contains("field descriptions") {
        return Ok(FieldRow::TableHeading(cell.to_string()));
    }
    if cell == "Field" {
        return Ok(FieldRow::ColumnHeader);
    }
    if cell.contains(CONTINUES_MARKER) {
        return Ok(FieldRow::ContinuesNextPage);
    }

    let description = second.unwrap_or_default();
    let range_token = leading_bit_range(cell);

    let (range, name) = if is_field_name(cell) {
        if let Some(token) = range_token {
            (parse_range(token)?, cell.replacen(token, "", 1).replace('\n', ""))
        } else if resumed && second == Some("") {
            return Ok(FieldRow::NameContinuation(cell.replace('\n', "")));
        } else {
            let name = cell.replace('\n', "");
            let range = if name == MUX_MODE_FIELD {
                BitRange::span(2, 0)
            } else {
                BitRange::Undocumented
            };
            (range, name)
        }
    } else if cell == "-" {
        (BitRange::ReservedBug, RESERVED_BUG_FIELD.to_string())
    } else if cell.is_empty() {
        return Ok(second.map_or(FieldRow::Empty, |text| {
            FieldRow::ContinuationText(text.to_string())
        }));
    } else if let Some(token) = range_token {
        (parse_range(token)?, cell.split('\n').skip(1).collect())
    } else {
        return Ok(FieldRow::Unrecognized(cell.to_string()));
    };

    let name = if description == RESERVED_DESCRIPTION && range != BitRange::ReservedBug {
        "reserved".to_string()
    } else {
        name
    };

    Ok(FieldRow::Field {
        range,
        name,
        description: description.to_string(),
    })
}
