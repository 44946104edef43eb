//! Page collaborator contract and a serde-backed page dump adapter.
//!
//! The extractors never touch a PDF library. They see pages through the
//! [`Page`] trait: the page text as newline-joined lines and the page
//! tables as rows of optional cell strings. [`PageDumpSet`] implements the
//! contract over pages pre-extracted into JSON by any PDF tool.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One table row; `None` marks a merged or empty cell.
pub type Row = Vec<Option<String>>;

/// One extracted table in row order.
pub type Table = Vec<Row>;

/// Text and table access for one document page.
pub trait Page {
    /// Returns the page text as newline-joined lines, if any.
    fn extract_text(&self) -> Option<String>;

    /// Returns every table found on the page in reading order.
    fn extract_tables(&self) -> Vec<Table>;

    /// Returns the page's single dominant table, if any.
    fn extract_table(&self) -> Option<Table>;
}

/// Random access to the pages of one source document.
pub trait PageSource {
    /// Concrete page type.
    type Page: Page;

    /// Returns the page with the given 1-based number.
    fn page(&self, number: u32) -> Option<&Self::Page>;
}

/// A page captured from a reference manual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDump {
    /// 1-based page number in the source document.
    pub number: u32,
    /// Page text, `None` when the page has no text layer.
    #[serde(default)]
    pub text: Option<String>,
    /// Tables in reading order.
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl PageDump {
    /// Creates a page from text lines and tables.
    #[must_use]
    pub fn new(number: u32, lines: &[&str], tables: Vec<Table>) -> Self {
        Self {
            number,
            text: (!lines.is_empty()).then(|| lines.join("\n")),
            tables,
        }
    }
}

impl Page for PageDump {
    fn extract_text(&self) -> Option<String> {
        self.text.clone()
    }

    fn extract_tables(&self) -> Vec<Table> {
        self.tables.clone()
    }

    /// The largest table by cell count; ties keep the earliest.
    fn extract_table(&self) -> Option<Table> {
        let cells = |table: &Table| table.iter().map(Vec::len).sum::<usize>();
        self.tables
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| cells(a).cmp(&cells(b)).then(ib.cmp(ia)))
            .map(|(_, table)| table.clone())
    }
}

/// A set of dumped pages keyed by page number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDumpSet {
    /// Dumped pages in any order.
    pub pages: Vec<PageDump>,
}

impl PageDumpSet {
    /// Creates a set from pages.
    #[must_use]
    pub const fn new(pages: Vec<PageDump>) -> Self {
        Self { pages }
    }

    /// Loads a page dump from a JSON file.
    ///
    /// The file holds either `{"pages": [...]}` or a bare array of pages.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses a page dump from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] when the text is neither layout.
    pub fn from_json_str(content: &str) -> Result<Self, StoreError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Layout {
            Wrapped(PageDumpSet),
            Bare(Vec<PageDump>),
        }

        match serde_json::from_str::<Layout>(content)? {
            Layout::Wrapped(set) => Ok(set),
            Layout::Bare(pages) => Ok(Self::new(pages)),
        }
    }
}

impl PageSource for PageDumpSet {
    type Page = PageDump;

    fn page(&self, number: u32) -> Option<&PageDump> {
        self.pages.iter().find(|page| page.number == number)
    }
}

/// Builds a table from string-literal cells; `None` stays a null cell.
#[must_use]
pub fn table_from(rows: &[&[Option<&str>]]) -> Table {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
        .collect()
}
