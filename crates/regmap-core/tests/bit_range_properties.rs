//! Property coverage for the bit-range codec and classifiers.

use proptest::prelude::*;
use regex as _;
use regmap_core::classify::imx::classify_row;
use regmap_core::{extract_bits, format_range, parse_range, BitRange};
use rstest as _;
use serde as _;
use serde_json as _;
use tempfile as _;
use thiserror as _;
use tracing as _;

fn span_within_register() -> impl Strategy<Value = (u32, u32)> {
    (0_u32..32).prop_flat_map(|low| (low..32, Just(low)))
}

proptest! {
    #[test]
    fn property_format_then_parse_is_identity(a in 0_u32..128, b in 0_u32..128) {
        let range = BitRange::span(a, b);
        prop_assert_eq!(parse_range(&format_range(range)), Ok(range));
    }

    #[test]
    fn property_all_ones_value_reads_all_ones((high, low) in span_within_register()) {
        let bits = extract_bits("0xFFFFFFFF", BitRange::span(high, low), false).expect("span");
        prop_assert_eq!(bits.len(), (high - low + 1) as usize);
        prop_assert!(bits.chars().all(|c| c == '1'));
    }

    #[test]
    fn property_zero_value_reads_all_zeros((high, low) in span_within_register(), lsb_first in any::<bool>()) {
        let bits = extract_bits("0x00000000", BitRange::span(high, low), lsb_first).expect("span");
        prop_assert_eq!(bits.len(), (high - low + 1) as usize);
        prop_assert!(bits.chars().all(|c| c == '0'));
    }

    #[test]
    fn property_lsb_first_is_reverse_order(value in any::<u32>(), (high, low) in span_within_register()) {
        let hex = format!("{value:#010x}");
        let range = BitRange::span(high, low);
        let msb = extract_bits(&hex, range, false).expect("msb first");
        let lsb = extract_bits(&hex, range, true).expect("lsb first");
        prop_assert_eq!(msb.chars().rev().collect::<String>(), lsb);

        let expected = (value >> low) & (u32::MAX >> (31 - (high - low)));
        prop_assert_eq!(u32::from_str_radix(&msb, 2).expect("binary"), expected);
    }

    #[test]
    fn property_rows_never_panic(first in proptest::option::of(".{0,40}"), second in proptest::option::of(".{0,40}"), resumed in any::<bool>()) {
        let _ = classify_row(&[first, second], resumed);
    }
}
