//! Line classification for STM32MP reference manuals.
//!
//! Register chapters are prose rather than tables:
//!
//! ```text
//! 53.8 USART registers
//! 53.8.1 USART control register 1 [alternate] (USART_CR1)
//! Address offset: 0x00
//! Reset value: 0x0000 0000
//! Bit 31 RXFFIE: RXFIFO full interrupt enable
//! This bit is set and cleared by software.
//! Bits 25:21 DEAT[4:0]: Driver enable assertion time
//! 53.8.15 USART register map
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Which per-register value the scanner is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldStage {
    /// `Address offset:` not seen yet.
    Offset,
    /// `Reset value:` not seen yet.
    Reset,
    /// Reading `Bit`/`Bits` lines and their continuation text.
    Bits,
}

/// Classified line inside a register chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterLine<'a> {
    /// Empty after trimming.
    Blank,
    /// The register chapter is over.
    ChapterEnd,
    /// `<N.M.K> ... (<NAME>)` opens a register.
    RegisterHeading {
        /// Section number, e.g. `53.8.1`.
        chapter: &'a str,
        /// Register name, suffixed `-alternate` for alternate layouts.
        name: String,
    },
    /// `Address offset: 0x..`.
    AddressOffset(&'a str),
    /// `Reset value: 0x....`, normalized to 8 lower-case digits.
    ResetValue(String),
    /// `Bit[s] <range> <NAME>: <text>` opens a bitfield.
    BitField {
        /// Range token, `31` or `25:21`.
        range: &'a str,
        /// Field name, possibly with `[..]` suffixes.
        name: &'a str,
        /// Rest of the line.
        description: &'a str,
    },
    /// Anything else.
    Text,
}

/// One row of the bus/peripheral address map table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapRow<'a> {
    /// `['Bus', 'Boundary address', ...]`.
    Header,
    /// A peripheral row; `bus` is `None` when the cell was merged vertically.
    Entry {
        /// Bus cell with wrap newlines removed.
        bus: Option<String>,
        /// `0xSTART - 0xEND`.
        range: &'a str,
        /// Size as printed.
        size: &'a str,
        /// Peripheral instance name.
        peripheral: &'a str,
        /// Register-map group with wrap newlines removed.
        peripheralmap: String,
    },
    /// Fewer than five cells or a missing address cell.
    Malformed,
}

/// Finds the `<N.M> <group name>` heading that opens a register chapter.
#[derive(Debug, Clone)]
pub struct ChapterHeading {
    pattern: Regex,
}

impl ChapterHeading {
    /// Builds the heading matcher for one register-map group.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern cannot be compiled.
    pub fn new(mapname: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(\d{{1,3}}\.\d+)\s+{}", regex::escape(mapname)))?;
        Ok(Self { pattern })
    }

    /// Section number of the heading on this line, if any.
    #[must_use]
    pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Recognizes the line after which a register chapter is over.
#[derive(Debug, Clone)]
pub struct ChapterEnd {
    map_and_reset: Regex,
    markers: Vec<String>,
}

impl ChapterEnd {
    /// Builds the end detector for the chapter numbered `chapter_start`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern cannot be compiled.
    pub fn new(chapter_start: &str, markers: &[String]) -> Result<Self, regex::Error> {
        let map_and_reset = Regex::new(&format!(
            r"{}\.\d+\s+.*map and reset values$",
            regex::escape(chapter_start)
        ))?;
        Ok(Self {
            map_and_reset,
            markers: markers.to_vec(),
        })
    }

    /// True when `line` ends the chapter.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        summary_heading_pattern().is_match(line)
            || self.map_and_reset.is_match(line)
            || self.markers.iter().any(|marker| line.contains(marker.as_str()))
    }
}

fn summary_heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\d{1,3}\.\d{1,3}(?:\.\d{1,3})?\b.*\b(?:register map|common registers)\b")
            .expect("summary heading pattern")
    })
}

fn register_heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,3}\.\d+\.\d+)\s+(?:[^()\[]*\s*)?(\[alternate\])?\s*\(([^()]+)\)")
            .expect("register heading pattern")
    })
}

fn wrapped_heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,3}\.\d{1,3}(?:\.\d{1,3})?\b.*?\bregister\b")
            .expect("wrapped heading pattern")
    })
}

fn address_offset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Address offset:\s*(0x[0-9A-Fa-f]+)").expect("address offset pattern")
    })
}

fn reset_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Reset value:\s*(0x[0-9A-Fa-fXx][0-9A-Fa-fXx_ ]*)").expect("reset value pattern")
    })
}

fn bit_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^bits?\s+(\d{1,3}(?::\d{1,3})?)\s+([A-Za-z0-9_]+(?:\[[^\]]+\]){0,2})\s*[: ,]\s*(.*)$",
        )
        .expect("bit line pattern")
    })
}

/// Joins a heading whose `(SYSCFG_...)` part wrapped onto the next line.
///
/// Returns `previous` and `line` concatenated as-is when `line` starts with
/// `(S` and `previous` looks like a register section heading without its own
/// parenthesis.
#[must_use]
pub fn repair_wrapped_heading(line: &str, previous: Option<&str>) -> Option<String> {
    if !line.starts_with("(S") {
        return None;
    }
    let previous = previous?;
    if previous.contains('(') || !wrapped_heading_pattern().is_match(previous) {
        return None;
    }
    Some(format!("{previous}{line}"))
}

/// Parses a register heading line.
#[must_use]
pub fn register_heading(line: &str) -> Option<(&str, String)> {
    let caps = register_heading_pattern().captures(line)?;
    let chapter = caps.get(1)?.as_str();
    let name = caps.get(3)?.as_str();
    let name = if caps.get(2).is_some() {
        format!("{name}-alternate")
    } else {
        name.to_string()
    };
    Some((chapter, name))
}

/// Offset from an `Address offset:` line.
#[must_use]
pub fn address_offset(line: &str) -> Option<&str> {
    address_offset_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Reset value from a `Reset value:` line as `0x` plus 8 lower-case digits.
///
/// Spaces and underscores are dropped and short values are zero-padded.
#[must_use]
pub fn reset_value(line: &str) -> Option<String> {
    let raw = reset_value_pattern().captures(line)?.get(1)?.as_str();
    let digits: String = raw[2..]
        .chars()
        .filter(|c| *c != '_' && *c != ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    Some(format!("0x{digits:0>8}"))
}

/// Classifies one chapter line once the chapter heading has been found.
#[must_use]
pub fn classify_chapter_line<'a>(
    line: &'a str,
    end: &ChapterEnd,
    stage: FieldStage,
) -> ChapterLine<'a> {
    let line = line.trim();
    if line.is_empty() {
        return ChapterLine::Blank;
    }
    if end.matches(line) {
        return ChapterLine::ChapterEnd;
    }
    if let Some((chapter, name)) = register_heading(line) {
        return ChapterLine::RegisterHeading { chapter, name };
    }

    match stage {
        FieldStage::Offset => address_offset(line).map_or(ChapterLine::Text, ChapterLine::AddressOffset),
        FieldStage::Reset => reset_value(line).map_or(ChapterLine::Text, ChapterLine::ResetValue),
        FieldStage::Bits => bit_line_pattern()
            .captures(line)
            .and_then(|caps| {
                Some(ChapterLine::BitField {
                    range: caps.get(1)?.as_str(),
                    name: caps.get(2)?.as_str().trim(),
                    description: caps.get(3)?.as_str().trim(),
                })
            })
            .unwrap_or(ChapterLine::Text),
    }
}

/// Classifies one row of the peripheral address map.
#[must_use]
pub fn classify_map_row(row: &[Option<String>]) -> MapRow<'_> {
    let cell = |index: usize| row.get(index).and_then(Option::as_deref);

    if cell(0) == Some("Bus") {
        return MapRow::Header;
    }
    if row.len() < 5 {
        return MapRow::Malformed;
    }
    let Some(range) = cell(1) else {
        return MapRow::Malformed;
    };

    MapRow::Entry {
        bus: cell(0).map(|bus| bus.replace('\n', "")),
        range,
        size: cell(2).unwrap_or_default(),
        peripheral: cell(3).unwrap_or_default(),
        peripheralmap: cell(4).unwrap_or_default().replace('\n', ""),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{
        classify_chapter_line, classify_map_row, repair_wrapped_heading, reset_value,
        ChapterEnd, ChapterHeading, ChapterLine, FieldStage, MapRow,
    };

    fn usart_end() -> ChapterEnd {
        ChapterEnd::new("53.8", &["DDRCTRL registers summary".to_string()]).expect("end pattern")
    }

    #[test]
    fn chapter_heading_matches_exact_group_name() {
        let heading = ChapterHeading::new("SPI/I2S registers").expect("pattern");
        assert_eq!(heading.find("55.9 SPI/I2S registers"), Some("55.9"));
        assert_eq!(heading.find("55.9 SPI registers"), None);

        let adc = ChapterHeading::new("ADC registers (for each ADC)").expect("pattern");
        assert_eq!(adc.find("36.13 ADC registers (for each ADC)"), Some("36.13"));
    }

    #[rstest]
    #[case("53.8.15 USART register map")]
    #[case("25.4 DDRCTRL common registers")]
    #[case("53.8.15 USART register map and reset values")]
    #[case("Table 402. DDRCTRL registers summary")]
    fn chapter_end_lines(#[case] line: &str) {
        assert_eq!(
            classify_chapter_line(line, &usart_end(), FieldStage::Bits),
            ChapterLine::ChapterEnd
        );
    }

    #[test]
    fn map_and_reset_values_needs_own_chapter() {
        let end = ChapterEnd::new("53.8", &[]).expect("end pattern");
        assert!(end.matches("53.8.16 USART map and reset values"));
        assert!(!end.matches("54.8.16 LPUART map and reset values"));
    }

    #[rstest]
    #[case("53.8.1 USART control register 1 (USART_CR1)", "53.8.1", "USART_CR1")]
    #[case(
        "53.8.2 USART control register 1 [alternate] (USART_CR1)",
        "53.8.2",
        "USART_CR1-alternate"
    )]
    #[case("13.4.3 GPIO port output speed register (GPIOx_OSPEEDR)", "13.4.3", "GPIOx_OSPEEDR")]
    fn register_headings(#[case] line: &str, #[case] chapter: &str, #[case] name: &str) {
        assert_eq!(
            classify_chapter_line(line, &usart_end(), FieldStage::Bits),
            ChapterLine::RegisterHeading {
                chapter,
                name: name.to_string()
            }
        );
    }

    #[test]
    fn wrapped_heading_is_joined_with_previous_line() {
        let previous = "14.3.2 SYSCFG peripheral mode configuration set register";
        let joined = repair_wrapped_heading("(SYSCFG_PMCSETR)", Some(previous)).expect("joined");
        assert_eq!(
            joined,
            "14.3.2 SYSCFG peripheral mode configuration set register(SYSCFG_PMCSETR)"
        );
        assert_eq!(
            classify_chapter_line(&joined, &usart_end(), FieldStage::Bits),
            ChapterLine::RegisterHeading {
                chapter: "14.3.2",
                name: "SYSCFG_PMCSETR".to_string()
            }
        );
        assert_eq!(repair_wrapped_heading("(SYSCFG_PMCSETR)", None), None);
        assert_eq!(repair_wrapped_heading("(SYSCFG_PMCSETR)", Some("Reset value: 0x0")), None);
        assert_eq!(repair_wrapped_heading("SYSCFG_PMCSETR", Some(previous)), None);
    }

    #[test]
    fn offset_and_reset_are_stage_gated() {
        let end = usart_end();
        assert_eq!(
            classify_chapter_line("Address offset: 0x1C", &end, FieldStage::Offset),
            ChapterLine::AddressOffset("0x1C")
        );
        assert_eq!(
            classify_chapter_line("Address offset: 0x1C", &end, FieldStage::Reset),
            ChapterLine::Text
        );
        assert_eq!(
            classify_chapter_line("Reset value: 0x0000 00C0", &end, FieldStage::Reset),
            ChapterLine::ResetValue("0x000000c0".to_string())
        );
        assert_eq!(
            classify_chapter_line("Bit 31 RXFFIE: RXFIFO full", &end, FieldStage::Offset),
            ChapterLine::Text
        );
    }

    #[rstest]
    #[case("Reset value: 0x0000 0000", "0x00000000")]
    #[case("Reset value: 0xC0", "0x000000c0")]
    #[case("Reset value: 0x0000_FFFF", "0x0000ffff")]
    #[case("Reset value: 0xXXXX XXXX", "0xxxxxxxxx")]
    fn reset_values_are_normalized(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(reset_value(line).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("Bit 31 RXFFIE: RXFIFO full interrupt enable", "31", "RXFFIE", "RXFIFO full interrupt enable")]
    #[case("Bits 25:21 DEAT[4:0]: Driver enable assertion time", "25:21", "DEAT[4:0]", "Driver enable assertion time")]
    #[case("Bits 31:17 Reserved, must be kept at reset value.", "31:17", "Reserved", "must be kept at reset value.")]
    #[case("Bits 11:8 WKP[3:0]:", "11:8", "WKP[3:0]", "")]
    #[case("Bits 31:0 OSPEEDR[15:0][1:0]: Port x configuration", "31:0", "OSPEEDR[15:0][1:0]", "Port x configuration")]
    fn bit_lines(
        #[case] line: &str,
        #[case] range: &str,
        #[case] name: &str,
        #[case] description: &str,
    ) {
        assert_eq!(
            classify_chapter_line(line, &usart_end(), FieldStage::Bits),
            ChapterLine::BitField {
                range,
                name,
                description
            }
        );
    }

    #[test]
    fn prose_is_text() {
        assert_eq!(
            classify_chapter_line("This bit is set and cleared by software.", &usart_end(), FieldStage::Bits),
            ChapterLine::Text
        );
        assert_eq!(
            classify_chapter_line("   ", &usart_end(), FieldStage::Bits),
            ChapterLine::Blank
        );
    }

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn map_rows() {
        let header = cells(&[
            Some("Bus"),
            Some("Boundary address"),
            Some("Size (Bytes)"),
            Some("Peripheral"),
            Some("Peripheral Register map"),
        ]);
        assert_eq!(classify_map_row(&header), MapRow::Header);

        let merged = cells(&[
            None,
            Some("0xA0024000 - 0xA0025FFF"),
            Some("8KB"),
            Some("GICH"),
            Some("GIC virtual interface control, common\n(GICH)"),
        ]);
        assert_eq!(
            classify_map_row(&merged),
            MapRow::Entry {
                bus: None,
                range: "0xA0024000 - 0xA0025FFF",
                size: "8KB",
                peripheral: "GICH",
                peripheralmap: "GIC virtual interface control, common(GICH)".to_string(),
            }
        );

        let bus = cells(&[
            Some("Cortex-\nA7\ninternal"),
            Some("0xA0026000 - 0xA0027FFF"),
            Some("8KB"),
            Some("GICV"),
            Some("GIC virtual CPU interface (GICV)"),
        ]);
        assert!(matches!(
            classify_map_row(&bus),
            MapRow::Entry { bus: Some(b), .. } if b == "Cortex-A7internal"
        ));

        assert_eq!(classify_map_row(&cells(&[Some("APB1")])), MapRow::Malformed);
    }
}
