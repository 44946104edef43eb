//! Error taxonomy for extraction, lookup and persistence.
//!
//! Vendor documentation bugs are not errors: they are carried in the data as
//! [`crate::BitRange::Undocumented`] and [`crate::BitRange::ReservedBug`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bits::RangeError;

/// Fatal extraction failures for one run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// A page that must hold a register table has none.
    #[error("no table found on page {page} for register {register}")]
    NoTableFound {
        /// 1-based page number.
        page: u32,
        /// Register whose table was expected.
        register: String,
    },
    /// A description-only row arrived with no bitfield open.
    #[error("page {page}: description row without an open bitfield in {register}")]
    OrphanDescription {
        /// 1-based page number.
        page: u32,
        /// Register being parsed.
        register: String,
    },
    /// A configured page window points past the source document.
    #[error("page {0} is not present in the source document")]
    MissingPage(u32),
    /// The extractor was run against a profile of the other document family.
    #[error("SoC {soc} does not use the {expected} document layout")]
    WrongFamily {
        /// Profile name.
        soc: String,
        /// Layout the extractor implements.
        expected: &'static str,
    },
    /// A bit range in the source could not be parsed.
    #[error(transparent)]
    Range(#[from] RangeError),
    /// A pattern built from document text failed to compile.
    #[error("invalid search pattern: {0}")]
    Pattern(String),
}

/// Decode-time lookup misses, reported per query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The query address is not a hex number.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    /// No peripheral range contains the address.
    #[error("No peripheral map found for address {0}")]
    NoPeripheralMapping(String),
    /// The peripheral's register-map group was never extracted.
    #[error("No registermap map found for address {0}")]
    NoRegisterMapping(String),
    /// No register in the resolved group sits at the address.
    #[error("address {0} not found")]
    AddressNotFound(String),
    /// A name lookup found no register with that name.
    #[error("register {0} not found")]
    UnknownRegister(String),
    /// The index does not select an instance of the named register.
    #[error("register {name} has no instance {index}")]
    InvalidIndex {
        /// Register name.
        name: String,
        /// Requested index or peripheral name.
        index: String,
    },
}

impl LookupError {
    /// True for every miss that means "no register at this address".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoPeripheralMapping(_) | Self::NoRegisterMapping(_) | Self::AddressNotFound(_)
        )
    }
}

/// Loading and saving register-map and page-dump files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Malformed JSON or a schema violation.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// SoC profile selection and loading.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No built-in profile carries this name.
    #[error("Soc {0} not supported yet.")]
    UnknownSoc(String),
    /// A page window is empty or starts before page 1.
    #[error("profile {profile}: invalid page window {start}..={end}")]
    InvalidWindow {
        /// Profile name.
        profile: String,
        /// First page.
        start: u32,
        /// Last page.
        end: u32,
    },
    /// The profile lacks the windows its document family needs.
    #[error("profile {profile}: {reason}")]
    Incomplete {
        /// Profile name.
        profile: String,
        /// What is missing.
        reason: &'static str,
    },
    /// The override file could not be read or parsed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decode query input that cannot be understood.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query list is not a JSON list of `{address, value}` objects.
    #[error("invalid query list: {0}")]
    InvalidList(String),
    /// A register-name line does not have three columns.
    #[error("line {line}: expected `name index value`, got {text:?}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// Offending line.
        text: String,
    },
    /// The query or report file could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why one `(address, value)` pair could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The address did not resolve to a register.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The value is not a hex number, or a stored range is unusable.
    #[error(transparent)]
    Range(#[from] RangeError),
}

impl DecodeError {
    /// True when the address simply has no register.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Lookup(err) => err.is_not_found(),
            Self::Range(_) => false,
        }
    }
}
