//! Reference-manual extractors.
//!
//! Both extractors are single-pass state machines over pages in order. A
//! register opened near the bottom of one page is finished by rows at the
//! top of the next, so pages are never processed independently.

use tracing::info;

use crate::error::ExtractError;
use crate::page::PageSource;
use crate::schema::{Document, DocumentFamily};
use crate::soc::SocProfile;

/// Field-table (i.MX) extractor.
pub mod imx;
/// Peripheral-map (STM32MP) extractor.
pub mod stm32;

pub use imx::{ImxExtractor, TableOutcome};
pub use stm32::Stm32Extractor;

/// Extracts the register map described by `profile` from `source`.
///
/// # Errors
///
/// Returns the first fatal [`ExtractError`] of the run.
pub fn extract_document<S: PageSource>(
    profile: &SocProfile,
    source: &S,
) -> Result<Document, ExtractError> {
    info!(soc = %profile.name, family = profile.family.as_str(), "extraction started");
    let document = match profile.family {
        DocumentFamily::FieldTable => {
            Document::FieldTable(ImxExtractor::new().run(source, &profile.page_windows)?)
        }
        DocumentFamily::PeripheralMap => {
            Document::PeripheralMap(Stm32Extractor::new(profile)?.run(source)?)
        }
    };
    info!(
        soc = %profile.name,
        registers = document.register_count(),
        "extraction finished"
    );
    Ok(document)
}
