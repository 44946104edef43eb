//! Register-map extraction from reference-manual pages and bitfield decode.
//!
//! Extraction reads pages through the [`Page`] trait and produces a
//! [`Document`]; decoding resolves an address against a document and splits
//! an observed value into its named fields.

/// Bit-range tokens and bit extraction.
pub mod bits;
pub use bits::{
    extract_bits, format_range, parse_hex_value, parse_range, BitRange, RangeError,
    RESERVED_BUG_LABEL, UNDOCUMENTED_LABEL,
};

/// Error taxonomy for extraction, lookup and persistence.
pub mod error;
pub use error::{DecodeError, ExtractError, LookupError, ProfileError, QueryError, StoreError};

/// Page collaborator contract and page dump adapter.
pub mod page;
pub use page::{table_from, Page, PageDump, PageDumpSet, PageSource, Row, Table};

/// Persisted register-map schema.
pub mod schema;
pub use schema::{
    BitField, CyclicAddress, Document, DocumentFamily, OffsetRegister, PeripheralDocument,
    PeripheralMapEntry, RegisterAddress, RegisterMap, RegisterRecord, SchemaError,
};

/// Document load and save.
pub mod store;
pub use store::{load_document, save_document};

/// SoC profiles and page windows.
pub mod soc;
pub use soc::{PageWindow, RegisterMapWindow, SocProfile};

/// Pure cell and line classifiers.
pub mod classify;
pub use classify::{classify_cell, is_field_name, leading_bit_range, CellKind};

/// Reference-manual extractors.
pub mod extract;
pub use extract::{extract_document, ImxExtractor, Stm32Extractor, TableOutcome};

/// Address and name lookups.
pub mod resolve;
pub use resolve::{search_address, NameResolver, ResolvedRegister};

/// Decode query input.
pub mod query;
pub use query::{load_register_list, parse_register_list, resolve_named, NamedQuery, RegisterQuery};

/// Bitfield decode and report sinks.
pub mod decode;
pub use decode::{
    decode, decode_batch, not_found_block, BatchSummary, DecodeReport, DecodedField, FileSink,
    LogSink, MemorySink, ReportSink, BLOCK_RULE, FIELD_RULE,
};

#[cfg(test)]
use proptest as _;
