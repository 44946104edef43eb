//! Peripheral-map pass and chapter scanner for STM32MP manuals.
//!
//! The manual has one bus address map near the front and one register
//! chapter per peripheral family. Every peripheral instance points at a
//! family by name (`USART2` → `USART registers`), and each family chapter
//! is scanned once inside its page window from the profile.

use tracing::{debug, info, warn};

use crate::bits::parse_range;
use crate::classify::stm32::{
    address_offset, classify_chapter_line, classify_map_row, repair_wrapped_heading, ChapterEnd,
    ChapterHeading, ChapterLine, FieldStage, MapRow,
};
use crate::error::ExtractError;
use crate::page::{Page, PageSource};
use crate::schema::{
    BitField, DocumentFamily, OffsetRegister, PeripheralDocument, PeripheralMapEntry, RegisterMap,
};
use crate::soc::{PageWindow, SocProfile};

/// Peripheral name of unused address ranges.
const RESERVED_PERIPHERAL: &str = "Reserved";

/// Map name of ranges without registers.
const NO_REGISTER_MAP: &str = "-";

/// Extraction state for one run over a peripheral-map manual.
#[derive(Debug)]
pub struct Stm32Extractor<'a> {
    profile: &'a SocProfile,
    bus: Option<String>,
    peripheralmaps: Vec<PeripheralMapEntry>,
    registermaps: Vec<RegisterMap>,
}

impl<'a> Stm32Extractor<'a> {
    /// Creates an extractor for a peripheral-map profile.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::WrongFamily`] for a field-table profile.
    pub fn new(profile: &'a SocProfile) -> Result<Self, ExtractError> {
        if profile.family != DocumentFamily::PeripheralMap {
            return Err(ExtractError::WrongFamily {
                soc: profile.name.clone(),
                expected: DocumentFamily::PeripheralMap.as_str(),
            });
        }
        Ok(Self {
            profile,
            bus: None,
            peripheralmaps: Vec::new(),
            registermaps: Vec::new(),
        })
    }

    /// Runs both passes and returns the document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when a page is missing or a pattern fails.
    pub fn run<S: PageSource>(mut self, source: &S) -> Result<PeripheralDocument, ExtractError> {
        if let Some(window) = self.profile.peripheral_map_window {
            self.create_peripheral_map(source, window)?;
        } else {
            warn!(soc = %self.profile.name, "profile has no peripheral map window");
        }
        self.create_register_maps(source)?;
        Ok(PeripheralDocument {
            peripheralmaps: self.peripheralmaps,
            registermaps: self.registermaps,
        })
    }

    /// Reads the bus address map tables in `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingPage`] for a page outside the source.
    pub fn create_peripheral_map<S: PageSource>(
        &mut self,
        source: &S,
        window: PageWindow,
    ) -> Result<(), ExtractError> {
        for number in window.pages() {
            let page = source.page(number).ok_or(ExtractError::MissingPage(number))?;
            for table in page.extract_tables() {
                for row in &table {
                    match classify_map_row(row) {
                        MapRow::Header => {}
                        MapRow::Entry {
                            bus,
                            range,
                            size,
                            peripheral,
                            peripheralmap,
                        } => {
                            if bus.is_some() {
                                self.bus = bus;
                            }
                            self.peripheralmaps.push(PeripheralMapEntry {
                                bus: self.bus.clone(),
                                range: range.to_string(),
                                size: size.to_string(),
                                peripheral: peripheral.to_string(),
                                peripheralmap,
                            });
                        }
                        MapRow::Malformed => {
                            warn!(page = number, cells = row.len(), "peripheral map row skipped");
                        }
                    }
                }
            }
        }
        info!(entries = self.peripheralmaps.len(), "peripheral map read");
        Ok(())
    }

    /// Builds every register-map group named in the peripheral map once.
    ///
    /// Reserved ranges and ranges without a map are skipped.
    ///
    /// # Errors
    ///
    /// See [`Self::create_register_map`].
    pub fn create_register_maps<S: PageSource>(&mut self, source: &S) -> Result<(), ExtractError> {
        let mut mapnames: Vec<String> = Vec::new();
        for entry in &self.peripheralmaps {
            if entry.peripheral == RESERVED_PERIPHERAL || entry.peripheralmap == NO_REGISTER_MAP {
                continue;
            }
            if !mapnames.contains(&entry.peripheralmap) {
                mapnames.push(entry.peripheralmap.clone());
            }
        }

        for mapname in &mapnames {
            self.create_register_map(source, mapname)?;
        }
        Ok(())
    }

    /// Scans the chapter of one register-map group.
    ///
    /// Groups without a window in the profile are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingPage`] for a page outside the source and
    /// [`ExtractError::Pattern`] if the group name yields no usable pattern.
    pub fn create_register_map<S: PageSource>(
        &mut self,
        source: &S,
        mapname: &str,
    ) -> Result<(), ExtractError> {
        if self.registermaps.iter().any(|map| map.mapname == mapname) {
            debug!(mapname, "register map already created");
            return Ok(());
        }
        let Some(window) = self.profile.register_map_window(mapname) else {
            debug!(mapname, "register map not supported yet");
            return Ok(());
        };

        info!(mapname, start = window.start, end = window.end, "creating register map");
        let mut scanner = ChapterScanner::new(mapname, &self.profile.chapter_end_markers)?;
        for number in window.pages() {
            let page = source.page(number).ok_or(ExtractError::MissingPage(number))?;
            let Some(text) = page.extract_text() else {
                continue;
            };
            for line in text.lines() {
                if scanner.feed(number, line)? == Scan::Finished {
                    self.registermaps.push(scanner.finish());
                    return Ok(());
                }
            }
        }

        if scanner.chapter_found() {
            warn!(mapname, "chapter end not found before window end");
            self.registermaps.push(scanner.finish());
        } else {
            warn!(mapname, "chapter heading not found in window");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Continue,
    Finished,
}

/// Line scanner for one register chapter.
#[derive(Debug)]
struct ChapterScanner {
    mapname: String,
    heading: ChapterHeading,
    markers: Vec<String>,
    end: Option<ChapterEnd>,
    registers: Vec<OffsetRegister>,
    current: Option<OffsetRegister>,
    current_bit: Option<BitField>,
    stage: FieldStage,
    previous: Option<String>,
}

impl ChapterScanner {
    fn new(mapname: &str, markers: &[String]) -> Result<Self, ExtractError> {
        let heading =
            ChapterHeading::new(mapname).map_err(|e| ExtractError::Pattern(e.to_string()))?;
        Ok(Self {
            mapname: mapname.to_string(),
            heading,
            markers: markers.to_vec(),
            end: None,
            registers: Vec::new(),
            current: None,
            current_bit: None,
            stage: FieldStage::Offset,
            previous: None,
        })
    }

    const fn chapter_found(&self) -> bool {
        self.end.is_some()
    }

    fn feed(&mut self, page: u32, raw: &str) -> Result<Scan, ExtractError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Scan::Continue);
        }

        let Some(end) = self.end.as_ref() else {
            if let Some(chapter) = self.heading.find(trimmed) {
                debug!(page, mapname = %self.mapname, chapter, "chapter found");
                let end = ChapterEnd::new(chapter, &self.markers)
                    .map_err(|e| ExtractError::Pattern(e.to_string()))?;
                self.end = Some(end);
            }
            self.previous = Some(trimmed.to_string());
            return Ok(Scan::Continue);
        };

        let repaired = repair_wrapped_heading(trimmed, self.previous.as_deref());
        if repaired.is_some() {
            debug!(page, previous = self.previous.as_deref(), "joined wrapped register heading");
        }
        let line = repaired.as_deref().unwrap_or(trimmed);

        match classify_chapter_line(line, end, self.stage) {
            ChapterLine::Blank => {}
            ChapterLine::ChapterEnd => {
                debug!(page, mapname = %self.mapname, line, "chapter end");
                self.commit_register();
                return Ok(Scan::Finished);
            }
            ChapterLine::RegisterHeading { chapter, name } => {
                if repaired.is_some() {
                    self.drop_wrapped_title();
                }
                self.commit_register();
                debug!(page, chapter, register = %name, "register found");
                self.current = Some(OffsetRegister {
                    registername: name,
                    offset: None,
                    page,
                    chapter: chapter.to_string(),
                    resetvalue: None,
                    bits: Vec::new(),
                });
                self.stage = FieldStage::Offset;
                if let Some(offset) = address_offset(line) {
                    self.set_offset(offset);
                }
            }
            ChapterLine::AddressOffset(offset) => self.set_offset(offset),
            ChapterLine::ResetValue(value) => {
                if let Some(register) = self.current.as_mut() {
                    register.resetvalue = Some(value);
                    self.stage = FieldStage::Bits;
                }
            }
            ChapterLine::BitField {
                range,
                name,
                description,
            } => {
                if self.current.is_some() {
                    let mut bit = BitField::new(parse_range(range)?, name, String::new());
                    bit.push_description(description);
                    if let Some(done) = self.current_bit.replace(bit) {
                        self.push_bit(done);
                    }
                }
            }
            ChapterLine::Text => {
                if let Some(bit) = self.current_bit.as_mut() {
                    bit.push_description(line);
                }
            }
        }

        self.previous = Some(line.to_string());
        Ok(Scan::Continue)
    }

    /// The first half of a wrapped heading was read as description text.
    fn drop_wrapped_title(&mut self) {
        let (Some(bit), Some(previous)) = (self.current_bit.as_mut(), self.previous.as_deref()) else {
            return;
        };
        let kept = bit
            .description
            .strip_suffix(&format!("{previous}\n"))
            .map(str::len);
        if let Some(len) = kept {
            bit.description.truncate(len);
        }
    }

    fn set_offset(&mut self, offset: &str) {
        if let Some(register) = self.current.as_mut() {
            register.offset = Some(offset.to_string());
            self.stage = FieldStage::Reset;
        }
    }

    fn push_bit(&mut self, bit: BitField) {
        if let Some(register) = self.current.as_mut() {
            register.bits.push(bit);
        }
    }

    fn commit_register(&mut self) {
        if let Some(bit) = self.current_bit.take() {
            self.push_bit(bit);
        }
        let Some(register) = self.current.take() else {
            return;
        };
        if register.offset.is_none() {
            warn!(register = %register.registername, page = register.page, "register without address offset");
        }
        debug!(
            register = %register.registername,
            fields = register.bits.len(),
            "register committed"
        );
        self.registers.push(register);
        self.stage = FieldStage::Offset;
    }

    fn finish(mut self) -> RegisterMap {
        self.commit_register();
        info!(mapname = %self.mapname, registers = self.registers.len(), "register map created");
        RegisterMap {
            mapname: self.mapname,
            registers: self.registers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Stm32Extractor;
    use crate::bits::BitRange;
    use crate::error::ExtractError;
    use crate::page::{table_from, PageDump, PageDumpSet};
    use crate::schema::{BitField, RegisterMap};
    use crate::soc::{PageWindow, RegisterMapWindow, SocProfile};

    fn profile() -> SocProfile {
        let mut profile = SocProfile::builtin("stm32mp157").expect("builtin");
        profile.peripheral_map_window = Some(PageWindow::new(1, 1));
        profile.register_map_windows = vec![RegisterMapWindow {
            mapname: "USART registers".into(),
            window: PageWindow::new(2, 3),
        }];
        profile
    }

    fn map_page() -> PageDump {
        PageDump::new(
            1,
            &["Table 8. Register boundary addresses"],
            vec![table_from(&[
                &[
                    Some("Bus"),
                    Some("Boundary address"),
                    Some("Size (Bytes)"),
                    Some("Peripheral"),
                    Some("Peripheral Register map"),
                ],
                &[
                    Some("APB1"),
                    Some("0x4000E000 - 0x4000E3FF"),
                    Some("1KB"),
                    Some("USART2"),
                    Some("USART registers"),
                ],
                &[
                    None,
                    Some("0x4000D400 - 0x4000DFFF"),
                    Some("3KB"),
                    Some("Reserved"),
                    Some("-"),
                ],
                &[
                    None,
                    Some("0x4000F000 - 0x4000F3FF"),
                    Some("1KB"),
                    Some("USART3"),
                    Some("USART registers"),
                ],
                &[
                    None,
                    Some("0x40000000 - 0x400003FF"),
                    Some("1KB"),
                    Some("TIM2"),
                    Some("TIM2 registers"),
                ],
            ])],
        )
    }

    fn usart_pages() -> Vec<PageDump> {
        vec![
            PageDump::new(
                2,
                &[
                    "53.8 USART registers",
                    "53.8.1 USART control register 1 [alternate] (USART_CR1)",
                    "Address offset: 0x00",
                    "Reset value: 0x0000 0000",
                    "Bit 31 RXFFIE: RXFIFO full interrupt enable",
                    "This bit is set and cleared by software.",
                    "Bits 25:21 DEAT[4:0]: Driver enable assertion time",
                    "This 5-bit value defines the time",
                ],
                Vec::new(),
            ),
            PageDump::new(
                3,
                &[
                    "53.8.2 USART control register 2 with a long title",
                    "(SYSCFG_CR2)",
                    "Address offset: 0x04",
                    "Reset value: 0x0",
                    "Bits 31:0 Reserved, must be kept at reset value.",
                    "53.8.15 USART register map",
                    "Bit 0 UE: USART enable",
                ],
                Vec::new(),
            ),
        ]
    }

    fn source() -> PageDumpSet {
        let mut pages = vec![map_page()];
        pages.extend(usart_pages());
        PageDumpSet::new(pages)
    }

    #[test]
    fn peripheral_map_inherits_bus() {
        let doc = Stm32Extractor::new(&profile())
            .expect("family")
            .run(&source())
            .expect("extract");
        assert_eq!(doc.peripheralmaps.len(), 4);
        assert!(doc.peripheralmaps.iter().all(|e| e.bus.as_deref() == Some("APB1")));
        assert_eq!(doc.peripheralmaps[2].peripheral, "USART3");
    }

    #[test]
    fn register_chapter_is_scanned_once() {
        let doc = Stm32Extractor::new(&profile())
            .expect("family")
            .run(&source())
            .expect("extract");

        assert_eq!(doc.registermaps.len(), 1);
        let RegisterMap { mapname, registers } = &doc.registermaps[0];
        assert_eq!(mapname, "USART registers");
        assert_eq!(registers.len(), 2);

        let cr1 = &registers[0];
        assert_eq!(cr1.registername, "USART_CR1-alternate");
        assert_eq!(cr1.offset.as_deref(), Some("0x00"));
        assert_eq!(cr1.chapter, "53.8.1");
        assert_eq!(cr1.page, 2);
        assert_eq!(cr1.resetvalue.as_deref(), Some("0x00000000"));
        assert_eq!(
            cr1.bits,
            vec![
                BitField::new(
                    BitRange::single(31),
                    "RXFFIE",
                    "RXFIFO full interrupt enable\nThis bit is set and cleared by software.\n"
                ),
                BitField::new(
                    BitRange::span(25, 21),
                    "DEAT[4:0]",
                    "Driver enable assertion time\nThis 5-bit value defines the time\n"
                ),
            ]
        );

        let cr2 = &registers[1];
        assert_eq!(cr2.registername, "SYSCFG_CR2");
        assert_eq!(cr2.chapter, "53.8.2");
        assert_eq!(cr2.offset.as_deref(), Some("0x04"));
        assert_eq!(cr2.resetvalue.as_deref(), Some("0x00000000"));
        assert_eq!(cr2.bits.len(), 1);
        assert_eq!(cr2.bits[0].field, "Reserved");
    }

    #[test]
    fn field_table_profile_is_rejected() {
        let imx = SocProfile::builtin("imx8mp").expect("builtin");
        assert!(matches!(
            Stm32Extractor::new(&imx),
            Err(ExtractError::WrongFamily { .. })
        ));
    }

    #[test]
    fn missing_chapter_end_still_keeps_registers() {
        let mut pages = vec![map_page()];
        let mut usart = usart_pages();
        usart.truncate(1);
        pages.extend(usart);
        pages.push(PageDump::new(3, &["unrelated text"], Vec::new()));

        let doc = Stm32Extractor::new(&profile())
            .expect("family")
            .run(&PageDumpSet::new(pages))
            .expect("extract");
        assert_eq!(doc.registermaps[0].registers.len(), 1);
        assert_eq!(doc.registermaps[0].registers[0].bits.len(), 2);
    }

    #[test]
    fn map_and_reset_values_heading_ends_chapter() {
        let chapter = PageDump::new(
            2,
            &[
                "53.8 USART registers",
                "53.8.1 USART control register 1 (USART_CR1)",
                "Address offset: 0x00",
                "Reset value: 0x0000 0000",
                "Bit 0 UE: USART enable",
                "53.8.15 USART2 and USART3 map and reset values",
                "53.8.16 USART extra register (USART_XR)",
                "Address offset: 0x40",
            ],
            Vec::new(),
        );
        let trailing = PageDump::new(3, &["Bit 1 LATE: read after the chapter"], Vec::new());

        let doc = Stm32Extractor::new(&profile())
            .expect("family")
            .run(&PageDumpSet::new(vec![map_page(), chapter, trailing]))
            .expect("extract");

        let registers = &doc.registermaps[0].registers;
        assert_eq!(registers.len(), 1);
        assert_eq!(registers[0].registername, "USART_CR1");
        assert_eq!(
            registers[0].bits,
            vec![BitField::new(BitRange::single(0), "UE", "USART enable\n")]
        );
    }
}
