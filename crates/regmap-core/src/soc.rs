//! SoC profiles: which manual to read, which pages, and which layout.
//!
//! Manuals are only scanned inside known-good page windows. Scanning whole
//! thousand-page documents is slow and drags unrelated chapters into the
//! state machines.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, StoreError};
use crate::schema::DocumentFamily;

/// Inclusive range of 1-based page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageWindow {
    /// First page.
    pub start: u32,
    /// Last page, inclusive.
    pub end: u32,
}

impl PageWindow {
    /// Creates a window.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Page numbers in the window.
    #[must_use]
    pub const fn pages(self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    const fn is_valid(self) -> bool {
        self.start >= 1 && self.start <= self.end
    }
}

/// Page window of one register-map group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMapWindow {
    /// Group name as printed in the peripheral map.
    pub mapname: String,
    /// Pages holding the group's register chapter.
    pub window: PageWindow,
}

/// Everything needed to extract one SoC's register map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocProfile {
    /// SoC name, e.g. `imx8mp`.
    pub name: String,
    /// Manual layout.
    pub family: DocumentFamily,
    /// File name of the reference manual.
    pub source_document: String,
    /// Where the manual can be downloaded.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Default output file name.
    pub output_file: String,
    /// Field-table layout: windows scanned in order.
    #[serde(default)]
    pub page_windows: Vec<PageWindow>,
    /// Peripheral-map layout: pages of the bus address map.
    #[serde(default)]
    pub peripheral_map_window: Option<PageWindow>,
    /// Peripheral-map layout: chapter windows per register-map group.
    #[serde(default)]
    pub register_map_windows: Vec<RegisterMapWindow>,
    /// Peripheral-map layout: extra strings that end a register chapter.
    #[serde(default)]
    pub chapter_end_markers: Vec<String>,
}

const BUILTIN_NAMES: &[&str] = &["imx8mp", "stm32mp157"];

const STM32MP157_REGISTER_MAPS: &[(&str, u32, u32)] = &[
    ("ADC registers (for each ADC)", 1577, 1610),
    ("DDRCTRL registers", 219, 302),
    ("PUBL registers", 378, 421),
    ("DTS registers", 1631, 1639),
    ("I2C registers", 2559, 2573),
    ("GPIO registers", 1078, 1092),
    ("SPI/I2S registers", 2723, 2743),
    ("SYSCFG registers", 1097, 1114),
    ("USART registers", 2626, 2670),
];

fn imx8mp() -> SocProfile {
    SocProfile {
        name: "imx8mp".into(),
        family: DocumentFamily::FieldTable,
        source_document: "IMX8MPRM.pdf".into(),
        source_url: Some("https://www.nxp.com/webapp/Download?colCode=IMX8MPRM".into()),
        output_file: "imx8mp_registers.json".into(),
        // IOMUXC chapter
        page_windows: vec![PageWindow::new(1361, 1388), PageWindow::new(1408, 1982)],
        peripheral_map_window: None,
        register_map_windows: Vec::new(),
        chapter_end_markers: Vec::new(),
    }
}

fn stm32mp157() -> SocProfile {
    SocProfile {
        name: "stm32mp157".into(),
        family: DocumentFamily::PeripheralMap,
        source_document: "mp157-rm0436-DM00327659.pdf".into(),
        source_url: Some("https://www.st.com/resource/en/reference_manual/DM00327659.pdf".into()),
        output_file: "stm32mp157_registers.json".into(),
        page_windows: Vec::new(),
        peripheral_map_window: Some(PageWindow::new(161, 168)),
        register_map_windows: STM32MP157_REGISTER_MAPS
            .iter()
            .map(|&(mapname, start, end)| RegisterMapWindow {
                mapname: mapname.into(),
                window: PageWindow::new(start, end),
            })
            .collect(),
        chapter_end_markers: vec!["DDRCTRL registers summary".into()],
    }
}

impl SocProfile {
    /// Names of the built-in profiles.
    #[must_use]
    pub const fn builtin_names() -> &'static [&'static str] {
        BUILTIN_NAMES
    }

    /// Looks up a built-in profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownSoc`] for any other name.
    pub fn builtin(name: &str) -> Result<Self, ProfileError> {
        match name {
            "imx8mp" => Ok(imx8mp()),
            "stm32mp157" => Ok(stm32mp157()),
            other => Err(ProfileError::UnknownSoc(other.to_string())),
        }
    }

    /// Parses and validates a profile from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] for malformed JSON or an unusable profile.
    pub fn from_json_str(content: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_json::from_str(content).map_err(StoreError::from)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Loads and validates a profile override file.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the file cannot be read, parsed or used.
    pub fn from_json_file(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Checks windows and that the family's required windows are present.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidWindow`] or [`ProfileError::Incomplete`].
    pub fn validate(&self) -> Result<(), ProfileError> {
        let windows = self
            .page_windows
            .iter()
            .chain(self.peripheral_map_window.iter())
            .chain(self.register_map_windows.iter().map(|w| &w.window));
        for window in windows {
            if !window.is_valid() {
                return Err(ProfileError::InvalidWindow {
                    profile: self.name.clone(),
                    start: window.start,
                    end: window.end,
                });
            }
        }

        let missing = match self.family {
            DocumentFamily::FieldTable if self.page_windows.is_empty() => Some("no page windows"),
            DocumentFamily::PeripheralMap if self.peripheral_map_window.is_none() => {
                Some("no peripheral map window")
            }
            _ => None,
        };
        missing.map_or(Ok(()), |reason| {
            Err(ProfileError::Incomplete {
                profile: self.name.clone(),
                reason,
            })
        })
    }

    /// Chapter window of a register-map group, if the profile knows it.
    #[must_use]
    pub fn register_map_window(&self, mapname: &str) -> Option<PageWindow> {
        self.register_map_windows
            .iter()
            .find(|w| w.mapname == mapname)
            .map(|w| w.window)
    }
}
