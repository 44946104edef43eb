//! Page/line state machine over i.MX "field descriptions" tables.
//!
//! Each register section of the manual has an `Address:` line, a heading
//! `<NAME> field descriptions` and a two-column table below it. Tables can
//! run over several pages; the next page then starts with the continued
//! table before any text. An `Address:` line belongs to the next register
//! heading, never to the register still open.

use tracing::{debug, info, warn};

use crate::bits::{parse_hex_value, BitRange};
use crate::classify::imx::{classify_row, classify_text_line, table_heading, FieldRow, TextLine};
use crate::error::ExtractError;
use crate::page::{Page, PageSource, Table};
use crate::schema::{BitField, RegisterAddress, RegisterRecord};
use crate::soc::PageWindow;

/// How one pass over a register table ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOutcome {
    /// The table was read to the end and the register committed.
    Committed,
    /// The table continues on the next page.
    ContinuesNextPage,
    /// The table belongs to another register; the open one was committed.
    OtherRegister,
    /// The register's heading row was not in the table.
    HeadingNotFound,
}

/// Extraction state for one run over a field-table manual.
#[derive(Debug, Default)]
pub struct ImxExtractor {
    records: Vec<RegisterRecord>,
    current_register: Option<String>,
    current_address: Option<String>,
    pending_address: Option<String>,
    current_page: u32,
    current_bits: Vec<BitField>,
    current_bit: Option<BitField>,
    found_new_register: bool,
    table_continues_next_page: bool,
    table_tried_on_page: bool,
}

impl ImxExtractor {
    /// Creates an extractor with no open register.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs all windows in order and returns the committed registers.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when a page is missing, a table cannot be
    /// found, or a table row is unusable.
    pub fn run<S: PageSource>(
        mut self,
        source: &S,
        windows: &[PageWindow],
    ) -> Result<Vec<RegisterRecord>, ExtractError> {
        for window in windows {
            self.process_window(source, *window)?;
        }
        Ok(self.finish())
    }

    /// Scans one page window.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn process_window<S: PageSource>(
        &mut self,
        source: &S,
        window: PageWindow,
    ) -> Result<(), ExtractError> {
        debug!(start = window.start, end = window.end, "scanning window");
        for number in window.pages() {
            let page = source.page(number).ok_or(ExtractError::MissingPage(number))?;
            self.process_page(number, page)?;
        }
        Ok(())
    }

    /// Scans one page: a continued table first, then the text lines.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn process_page<P: Page>(&mut self, number: u32, page: &P) -> Result<(), ExtractError> {
        self.table_tried_on_page = false;

        if self.table_continues_next_page {
            debug!(page = number, "resuming table from previous page");
            self.handle_table(number, page)?;
            if self.table_continues_next_page {
                debug!(page = number, "continued table fills the whole page");
                return Ok(());
            }
        }

        let Some(text) = page.extract_text() else {
            debug!(page = number, "no text lines");
            return Ok(());
        };

        for (index, line) in text.lines().enumerate() {
            self.process_line(number, index + 1, line, page)?;
            if self.table_continues_next_page {
                break;
            }
        }
        Ok(())
    }

    fn process_line<P: Page>(
        &mut self,
        number: u32,
        line_number: usize,
        line: &str,
        page: &P,
    ) -> Result<(), ExtractError> {
        match classify_text_line(line) {
            TextLine::Blank => {}
            TextLine::RegisterHeader { name, continued } => {
                if self.current_register.as_deref() == Some(name) {
                    debug!(page = number, line = line_number, register = name, "register already open");
                } else if continued {
                    debug!(page = number, line = line_number, register = name, "heading of a finished table");
                } else {
                    self.commit_register();
                    self.open_register(name, number);
                    debug!(page = number, line = line_number, register = name, "register found");
                }
            }
            TextLine::Address(address) => {
                if parse_hex_value(&address).is_ok() {
                    debug!(page = number, line = line_number, address = %address, "address found");
                    self.pending_address = Some(address);
                } else {
                    warn!(page = number, line = line_number, address = %address, "unparsable address ignored");
                }
            }
            TextLine::Other => {
                if self.found_new_register && !self.table_tried_on_page {
                    if self.handle_table(number, page)? == TableOutcome::HeadingNotFound {
                        self.table_tried_on_page = true;
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads the open register's table from `page`.
    ///
    /// # Errors
    ///
    /// [`ExtractError::NoTableFound`] when the page has no table at all,
    /// [`ExtractError::OrphanDescription`] for a description row with no
    /// field before it, and [`ExtractError::Range`] for a bad bit range.
    pub fn handle_table<P: Page>(
        &mut self,
        number: u32,
        page: &P,
    ) -> Result<TableOutcome, ExtractError> {
        let Some(register) = self.current_register.clone() else {
            return Ok(TableOutcome::HeadingNotFound);
        };
        let table = self
            .locate_table(&register, page)
            .ok_or_else(|| ExtractError::NoTableFound {
                page: number,
                register: register.clone(),
            })?;

        let heading = table_heading(&register, false);
        let continued_heading = table_heading(&register, true);
        let mut found = false;
        let mut resumed = false;

        for row in &table {
            let first = row.first().and_then(Option::as_deref);
            if let Some(cell) = first.filter(|cell| cell.contains("field descriptions")) {
                if cell == heading {
                    found = true;
                } else if cell == continued_heading {
                    if self.table_continues_next_page {
                        found = true;
                        resumed = true;
                        self.table_continues_next_page = false;
                    }
                } else {
                    debug!(page = number, register = %register, table = cell, "table of another register");
                    self.table_continues_next_page = false;
                    self.commit_register();
                    return Ok(TableOutcome::OtherRegister);
                }
                continue;
            }
            if !found {
                continue;
            }

            match classify_row(row, resumed)? {
                FieldRow::Empty | FieldRow::TableHeading(_) | FieldRow::ColumnHeader => {}
                FieldRow::ContinuesNextPage => {
                    debug!(page = number, register = %register, "table continues on next page");
                    self.table_continues_next_page = true;
                    return Ok(TableOutcome::ContinuesNextPage);
                }
                FieldRow::Field {
                    range,
                    name,
                    description,
                } => self.open_bit(number, range, name, &description),
                FieldRow::NameContinuation(rest) => {
                    if let Some(bit) = self.current_bit.as_mut() {
                        bit.field.push_str(&rest);
                    }
                }
                FieldRow::ContinuationText(text) => {
                    if let Some(bit) = self.current_bit.as_mut() {
                        bit.push_description(&text);
                    }
                }
                FieldRow::DescriptionRow(text) => {
                    let Some(bit) = self.current_bit.as_mut() else {
                        return Err(ExtractError::OrphanDescription {
                            page: number,
                            register,
                        });
                    };
                    if let Some(text) = text {
                        bit.push_description(&text);
                    }
                }
                FieldRow::Unrecognized(cell) => {
                    debug!(page = number, register = %register, cell = %cell, "row skipped");
                }
            }
        }

        if found {
            self.commit_register();
            Ok(TableOutcome::Committed)
        } else {
            Ok(TableOutcome::HeadingNotFound)
        }
    }

    fn locate_table<P: Page>(&self, register: &str, page: &P) -> Option<Table> {
        let wanted = table_heading(register, self.table_continues_next_page);
        page.extract_tables()
            .into_iter()
            .find(|table| {
                table
                    .first()
                    .is_some_and(|row| row.iter().any(|cell| cell.as_deref() == Some(wanted.as_str())))
            })
            .or_else(|| page.extract_table())
    }

    fn open_register(&mut self, name: &str, number: u32) {
        self.current_register = Some(name.to_string());
        self.current_address = self.pending_address.take();
        self.current_page = number;
        self.current_bits.clear();
        self.current_bit = None;
        self.found_new_register = true;
        self.table_continues_next_page = false;
        self.table_tried_on_page = false;
    }

    fn open_bit(&mut self, number: u32, range: BitRange, name: String, description: &str) {
        if let Some(previous) = self.current_bit.take() {
            self.current_bits.push(previous);
        }

        let register = self.current_register.as_deref().unwrap_or_default();
        if let Some(label) = range.anomaly_label() {
            warn!(page = number, register, field = %name, range = label, "bit range missing in manual");
        } else if let Some(other) = self
            .current_bits
            .iter()
            .find(|bit| overlaps(bit.range, range))
        {
            warn!(
                page = number,
                register,
                field = %name,
                other = %other.field,
                "bitfields overlap in manual"
            );
        }

        let mut bit = BitField::new(range, name, String::new());
        bit.push_description(description);
        self.current_bit = Some(bit);
    }

    fn commit_register(&mut self) {
        let Some(register) = self.current_register.take() else {
            return;
        };
        if let Some(bit) = self.current_bit.take() {
            self.current_bits.push(bit);
        }

        let address = self
            .current_address
            .take()
            .map_or(RegisterAddress::Unknown, RegisterAddress::Literal);
        if address == RegisterAddress::Unknown {
            warn!(register = %register, page = self.current_page, "register committed without address");
        }

        info!(
            register = %register,
            page = self.current_page,
            fields = self.current_bits.len(),
            "register committed"
        );
        self.records.push(RegisterRecord {
            register,
            address,
            page: self.current_page,
            bits: std::mem::take(&mut self.current_bits),
        });
        self.found_new_register = false;
    }

    /// Commits any open register and returns all records.
    #[must_use]
    pub fn finish(mut self) -> Vec<RegisterRecord> {
        if self.table_continues_next_page {
            warn!(
                register = self.current_register.as_deref().unwrap_or_default(),
                "table continues past the last scanned page"
            );
        }
        self.commit_register();
        self.records
    }
}

fn overlaps(a: BitRange, b: BitRange) -> bool {
    match (a.bounds(), b.bounds()) {
        (Some((a_high, a_low)), Some((b_high, b_low))) => a_low <= b_high && b_low <= a_high,
        _ => false,
    }
}
