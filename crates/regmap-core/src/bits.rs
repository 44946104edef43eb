//! Bit-range tokens and bit extraction from hex register values.
//!
//! Reference manuals write bit positions as `31`, `31-28`, `31:28` or with
//! an en-dash (`31–28`) picked up from the PDF text layer. All of them
//! normalize to [`BitRange::Span`] with `high >= low`. Fields whose range
//! the manual never documented are kept as explicit anomaly variants so
//! nothing downstream decodes a sentinel as real bit positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Label stored in place of a range when the manual omits a field's bit range.
pub const UNDOCUMENTED_LABEL: &str = "NXP bug not documented";

/// Label stored in place of a range for an undocumented reserved field.
pub const RESERVED_BUG_LABEL: &str = "-";

/// A normalized bit range, or a marker for a vendor documentation bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitRange {
    /// Inclusive bit span, always `high >= low`.
    Span {
        /// Most significant bit of the field.
        high: u32,
        /// Least significant bit of the field.
        low: u32,
    },
    /// The manual lists the field without any bit range.
    Undocumented,
    /// The manual lists a bare `-` in place of field and range.
    ReservedBug,
}

impl BitRange {
    /// Creates a single-bit range.
    #[must_use]
    pub const fn single(bit: u32) -> Self {
        Self::Span {
            high: bit,
            low: bit,
        }
    }

    /// Creates a span from two bit positions given in either order.
    #[must_use]
    pub const fn span(a: u32, b: u32) -> Self {
        if a >= b {
            Self::Span { high: a, low: b }
        } else {
            Self::Span { high: b, low: a }
        }
    }

    /// Returns `(high, low)` for real spans.
    #[must_use]
    pub const fn bounds(self) -> Option<(u32, u32)> {
        match self {
            Self::Span { high, low } => Some((high, low)),
            Self::Undocumented | Self::ReservedBug => None,
        }
    }

    /// Number of bits covered by a real span.
    #[must_use]
    pub const fn width(self) -> Option<u32> {
        match self {
            Self::Span { high, low } => Some((high - low).saturating_add(1)),
            Self::Undocumented | Self::ReservedBug => None,
        }
    }

    /// Returns true for the documentation-bug markers.
    #[must_use]
    pub const fn is_anomaly(self) -> bool {
        !matches!(self, Self::Span { .. })
    }

    /// Vendor-facing label for anomaly markers.
    #[must_use]
    pub const fn anomaly_label(self) -> Option<&'static str> {
        match self {
            Self::Span { .. } => None,
            Self::Undocumented => Some(UNDOCUMENTED_LABEL),
            Self::ReservedBug => Some(RESERVED_BUG_LABEL),
        }
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Span { high, low } if high == low => write!(f, "{high}"),
            Self::Span { high, low } => write!(f, "{high}-{low}"),
            Self::Undocumented => f.write_str(UNDOCUMENTED_LABEL),
            Self::ReservedBug => f.write_str(RESERVED_BUG_LABEL),
        }
    }
}

impl FromStr for BitRange {
    type Err = RangeError;

    /// Parses the persisted form, including the anomaly labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains(UNDOCUMENTED_LABEL) {
            return Ok(Self::Undocumented);
        }
        if trimmed == RESERVED_BUG_LABEL {
            return Ok(Self::ReservedBug);
        }
        parse_range(trimmed)
    }
}

impl Serialize for BitRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BitRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors from bit-range parsing and bit extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The token is not a bit number or a two-number range.
    #[error("invalid range format: {0:?}")]
    InvalidRangeFormat(String),
    /// The register value is not a hex number.
    #[error("invalid hex value: {0:?}")]
    InvalidHexValue(String),
    /// Extraction was asked for on a documentation-bug marker.
    #[error("range {0} has no bit positions")]
    NoBitPositions(BitRange),
    /// A bit position or span does not fit a 128-bit value.
    #[error("range {0} exceeds {max} bits", max = u128::BITS)]
    BitOutOfRange(BitRange),
}

/// Parses a bit-range token such as `3`, `31-28`, `31:28` or `31–28`.
///
/// # Errors
///
/// Returns [`RangeError::InvalidRangeFormat`] when the token has no digits,
/// more than two parts, or a part that is not a bit number, and
/// [`RangeError::BitOutOfRange`] for a bit position of 128 or above.
pub fn parse_range(token: &str) -> Result<BitRange, RangeError> {
    let trimmed = token.trim();
    let invalid = || RangeError::InvalidRangeFormat(token.to_string());

    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let normalized = trimmed.replace('–', "-");
    let parts: Vec<&str> = normalized.split(['-', ':']).map(str::trim).collect();
    let parse_bit = |part: &str| {
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse::<u32>().map_err(|_| invalid())
    };

    let range = match parts.as_slice() {
        [bit] => BitRange::single(parse_bit(bit)?),
        [a, b] => BitRange::span(parse_bit(a)?, parse_bit(b)?),
        _ => return Err(invalid()),
    };
    match range.bounds() {
        Some((high, _)) if high >= u128::BITS => Err(RangeError::BitOutOfRange(range)),
        _ => Ok(range),
    }
}

/// Formats a range in its persisted form (`"h-l"`, `"n"` or an anomaly label).
#[must_use]
pub fn format_range(range: BitRange) -> String {
    range.to_string()
}

/// Parses a hex string with optional `0x` prefix, `h` suffix and `_` separators.
///
/// # Errors
///
/// Returns [`RangeError::InvalidHexValue`] for empty or non-hex input, a sign
/// character, and values wider than 128 bits.
pub fn parse_hex_value(hex_value: &str) -> Result<u128, RangeError> {
    let trimmed = hex_value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_suffix('h'))
        .unwrap_or(trimmed);
    let digits: String = body.chars().filter(|c| *c != '_').collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RangeError::InvalidHexValue(hex_value.to_string()));
    }

    u128::from_str_radix(&digits, 16).map_err(|_| RangeError::InvalidHexValue(hex_value.to_string()))
}

/// Extracts the bits of `range` from `hex_value` as a zero-padded binary string.
///
/// The string is most-significant-bit first unless `lsb_first` is set. Bit
/// positions above the parsed value read as `0`; there is no check against
/// the register width.
///
/// # Errors
///
/// Returns [`RangeError::InvalidHexValue`] for a malformed value,
/// [`RangeError::NoBitPositions`] for anomaly markers and
/// [`RangeError::BitOutOfRange`] for spans wider than 128 bits.
pub fn extract_bits(hex_value: &str, range: BitRange, lsb_first: bool) -> Result<String, RangeError> {
    let (high, low) = range.bounds().ok_or(RangeError::NoBitPositions(range))?;
    if range.width().is_some_and(|width| width > u128::BITS) {
        return Err(RangeError::BitOutOfRange(range));
    }
    let value = parse_hex_value(hex_value)?;

    let bit_at = |bit: u32| bit < u128::BITS && (value >> bit) & 1 == 1;
    let bits: String = if lsb_first {
        (low..=high).map(|bit| if bit_at(bit) { '1' } else { '0' }).collect()
    } else {
        (low..=high)
            .rev()
            .map(|bit| if bit_at(bit) { '1' } else { '0' })
            .collect()
    };

    Ok(bits)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{extract_bits, format_range, parse_hex_value, parse_range, BitRange, RangeError};

    #[rstest]
    #[case("3", BitRange::single(3))]
    #[case(" 31-28 ", BitRange::span(31, 28))]
    #[case("31:28", BitRange::span(31, 28))]
    #[case("31–28", BitRange::span(31, 28))]
    #[case("28-31", BitRange::span(31, 28))]
    #[case("25 : 21", BitRange::span(25, 21))]
    fn parses_vendor_range_spellings(#[case] token: &str, #[case] expected: BitRange) {
        assert_eq!(parse_range(token), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("Field")]
    #[case("31-")]
    #[case("1-2-3")]
    #[case("x7")]
    #[case("+3")]
    fn rejects_malformed_tokens(#[case] token: &str) {
        assert!(matches!(
            parse_range(token),
            Err(RangeError::InvalidRangeFormat(_))
        ));
    }

    #[rstest]
    #[case("128")]
    #[case("4294967295-0")]
    fn rejects_bits_beyond_128(#[case] token: &str) {
        assert!(matches!(parse_range(token), Err(RangeError::BitOutOfRange(_))));
        assert!(serde_json::from_str::<BitRange>(&format!("\"{token}\"")).is_err());
    }

    #[test]
    fn wide_constructed_span_is_not_extracted() {
        let range = BitRange::span(u32::MAX, 0);
        assert_eq!(
            extract_bits("0x1", range, false),
            Err(RangeError::BitOutOfRange(range))
        );
        assert_eq!(extract_bits("0x1", BitRange::span(127, 0), false).map(|b| b.len()), Ok(128));
    }

    #[test]
    fn display_uses_dash_and_single_form() {
        assert_eq!(format_range(BitRange::span(2, 0)), "2-0");
        assert_eq!(format_range(BitRange::single(4)), "4");
        assert_eq!(format_range(BitRange::Undocumented), "NXP bug not documented");
        assert_eq!(format_range(BitRange::ReservedBug), "-");
    }

    #[test]
    fn width_counts_inclusive_bits() {
        assert_eq!(BitRange::span(31, 22).width(), Some(10));
        assert_eq!(BitRange::single(0).width(), Some(1));
        assert_eq!(BitRange::span(u32::MAX, 0).width(), Some(u32::MAX));
        assert_eq!(BitRange::ReservedBug.width(), None);
    }

    #[test]
    fn persisted_labels_parse_back_to_markers() {
        assert_eq!("NXP bug not documented".parse(), Ok(BitRange::Undocumented));
        assert_eq!("-".parse(), Ok(BitRange::ReservedBug));
        assert_eq!("31:24".parse(), Ok(BitRange::span(31, 24)));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&BitRange::span(31, 28)).expect("serialize");
        assert_eq!(json, "\"31-28\"");
        let back: BitRange = serde_json::from_str("\"31:28\"").expect("deserialize");
        assert_eq!(back, BitRange::span(31, 28));
        assert!(serde_json::from_str::<BitRange>("\"bogus\"").is_err());
    }

    #[test]
    fn extracts_msb_first_by_default() {
        assert_eq!(extract_bits("0xA5", BitRange::span(7, 4), false).as_deref(), Ok("1010"));
        assert_eq!(extract_bits("0xA5", BitRange::span(3, 0), false).as_deref(), Ok("0101"));
        assert_eq!(extract_bits("0x00000000", BitRange::span(2, 0), false).as_deref(), Ok("000"));
    }

    #[test]
    fn lsb_first_reverses_the_string() {
        assert_eq!(extract_bits("0x1", BitRange::span(3, 0), true).as_deref(), Ok("1000"));
    }

    #[test]
    fn high_bits_of_narrow_value_read_as_zero() {
        assert_eq!(extract_bits("0xFF", BitRange::single(31), false).as_deref(), Ok("0"));
        assert_eq!(extract_bits("0xFF", BitRange::single(200), false).as_deref(), Ok("0"));
    }

    #[test]
    fn anomaly_markers_do_not_decode() {
        assert_eq!(
            extract_bits("0x0", BitRange::Undocumented, false),
            Err(RangeError::NoBitPositions(BitRange::Undocumented))
        );
    }

    #[test]
    fn hex_parsing_accepts_vendor_spellings() {
        assert_eq!(parse_hex_value("0x3033_0070"), Ok(0x3033_0070));
        assert_eq!(parse_hex_value("30330070h"), Ok(0x3033_0070));
        assert_eq!(parse_hex_value("deadbeef"), Ok(0xdead_beef));
        assert!(parse_hex_value("0x").is_err());
        assert!(parse_hex_value("0xZZ").is_err());
        assert!(parse_hex_value("+ff").is_err());
        assert!(parse_hex_value("0x+ff").is_err());
        assert!(parse_hex_value("-1").is_err());
    }
}
