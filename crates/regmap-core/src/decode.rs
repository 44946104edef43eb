//! Bitfield decode of observed register values and report output.
//!
//! A report file is a sequence of blocks:
//!
//! ```text
//! ------------------------------------------------------------------------------
//! register name: IOMUXC_SW_MUX_CTL_PAD_ENET_TXC val: 0x00000000 RM page 1438
//! ------------------------------------------------------------------------------
//! 4      SION                           val 0
//! desc Software Input On Field.
//!
//! ...........................................
//! 2-0    MUX_MODE                       val 000
//! desc MUX Mode Select Field.
//!
//! ...........................................
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::bits::{extract_bits, parse_hex_value, BitRange};
use crate::error::{DecodeError, QueryError, StoreError};
use crate::query::RegisterQuery;
use crate::resolve::search_address;
use crate::schema::{BitField, Document};

/// Line above and below the block header.
pub const BLOCK_RULE: &str =
    "------------------------------------------------------------------------------";

/// Line after each field.
pub const FIELD_RULE: &str = "...........................................";

/// One bitfield of a decoded register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedField {
    /// Range or documentation-bug marker.
    pub range: BitRange,
    /// Field name.
    pub field: String,
    /// Field description.
    pub description: String,
    /// Decoded bits, MSB first; `None` for anomaly markers.
    pub bits: Option<String>,
}

impl DecodedField {
    fn decode(bit: &BitField, value: &str) -> Result<Self, DecodeError> {
        let bits = if bit.range.is_anomaly() {
            None
        } else {
            Some(extract_bits(value, bit.range, false)?)
        };
        Ok(Self {
            range: bit.range,
            field: bit.field.clone(),
            description: bit.description.clone(),
            bits,
        })
    }

    /// True when the manual gave no usable range for this field.
    #[must_use]
    pub const fn is_anomaly(&self) -> bool {
        self.range.is_anomaly()
    }
}

/// A register value split into its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    /// Queried address.
    pub address: String,
    /// Decoded value as given.
    pub value: String,
    /// Register name.
    pub register: String,
    /// Manual page of the register.
    pub page: u32,
    /// Fields in declaration order.
    pub fields: Vec<DecodedField>,
}

impl DecodeReport {
    /// Renders the report as one block of the report file.
    #[must_use]
    pub fn to_block(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DecodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BLOCK_RULE}")?;
        writeln!(
            f,
            "register name: {} val: {} RM page {}",
            self.register, self.value, self.page
        )?;
        writeln!(f, "{BLOCK_RULE}")?;
        for field in &self.fields {
            match (field.range, &field.bits) {
                (BitRange::Undocumented, _) => writeln!(
                    f,
                    "NXPbug in doc name of field {} desc {}",
                    field.field, field.description
                )?,
                (BitRange::ReservedBug, _) | (BitRange::Span { .. }, None) => {
                    writeln!(f, "field {} desc {}", field.field, field.description)?;
                }
                (range @ BitRange::Span { .. }, Some(bits)) => {
                    writeln!(f, "{:6} {:30} val {bits:6}", range.to_string(), field.field)?;
                    writeln!(f, "desc {}", field.description)?;
                }
            }
            writeln!(f, "{FIELD_RULE}")?;
        }
        Ok(())
    }
}

/// Block written for an address without a register.
#[must_use]
pub fn not_found_block(address: &str) -> String {
    format!("{BLOCK_RULE}\nregistermapping for {address} not found\n")
}

/// Resolves `address` and splits `value` into the register's fields.
///
/// # Errors
///
/// Returns [`DecodeError`] when the value is not hex or the address does not
/// resolve.
pub fn decode(document: &Document, address: &str, value: &str) -> Result<DecodeReport, DecodeError> {
    parse_hex_value(value)?;
    let register = search_address(document, address)?;
    let fields = register
        .bits()
        .iter()
        .map(|bit| DecodedField::decode(bit, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodeReport {
        address: address.to_string(),
        value: value.to_string(),
        register: register.name().to_string(),
        page: register.page(),
        fields,
    })
}

/// Destination for decode reports.
pub trait ReportSink {
    /// Emits one decoded register.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the sink cannot be written.
    fn report(&mut self, report: &DecodeReport) -> Result<(), QueryError>;

    /// Emits a query that could not be decoded.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the sink cannot be written.
    fn miss(&mut self, query: &RegisterQuery, error: &DecodeError) -> Result<(), QueryError>;
}

/// Writes reports to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&mut self, report: &DecodeReport) -> Result<(), QueryError> {
        info!(
            register = %report.register,
            value = %report.value,
            page = report.page,
            "register decoded"
        );
        for field in &report.fields {
            match (&field.bits, field.range.anomaly_label()) {
                (Some(bits), _) => info!(
                    range = %field.range,
                    field = %field.field,
                    bits = %bits,
                    description = field.description.trim_end(),
                    "field"
                ),
                (None, label) => warn!(
                    range = label.unwrap_or_default(),
                    field = %field.field,
                    description = field.description.trim_end(),
                    "field range not documented"
                ),
            }
        }
        Ok(())
    }

    fn miss(&mut self, query: &RegisterQuery, error: &DecodeError) -> Result<(), QueryError> {
        warn!(address = %query.address, error = %error, "registermapping not found");
        Ok(())
    }
}

/// Appends report blocks to a text file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Creates a sink appending to `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Report file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, text: &str) -> Result<(), QueryError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(text.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}

impl ReportSink for FileSink {
    fn report(&mut self, report: &DecodeReport) -> Result<(), QueryError> {
        self.append(&report.to_block())
    }

    fn miss(&mut self, query: &RegisterQuery, error: &DecodeError) -> Result<(), QueryError> {
        if error.is_not_found() {
            self.append(&not_found_block(&query.address))
        } else {
            self.append(&format!("{BLOCK_RULE}\n{} {}: {error}\n", query.address, query.value))
        }
    }
}

/// Keeps reports in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Decoded registers in query order.
    pub reports: Vec<DecodeReport>,
    /// Failed queries in query order.
    pub misses: Vec<(RegisterQuery, DecodeError)>,
}

impl ReportSink for MemorySink {
    fn report(&mut self, report: &DecodeReport) -> Result<(), QueryError> {
        self.reports.push(report.clone());
        Ok(())
    }

    fn miss(&mut self, query: &RegisterQuery, error: &DecodeError) -> Result<(), QueryError> {
        self.misses.push((query.clone(), error.clone()));
        Ok(())
    }
}

/// Outcome of a decode batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Queries decoded and reported.
    pub decoded: usize,
    /// Queries that failed, with the reason.
    pub failures: Vec<(RegisterQuery, DecodeError)>,
}

impl BatchSummary {
    /// True when every query decoded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decodes every query into `sink`; a failed query does not stop the batch.
///
/// # Errors
///
/// Returns [`QueryError`] only when the sink itself fails.
pub fn decode_batch<S: ReportSink + ?Sized>(
    document: &Document,
    queries: &[RegisterQuery],
    sink: &mut S,
) -> Result<BatchSummary, QueryError> {
    let mut summary = BatchSummary::default();
    for query in queries {
        match decode(document, &query.address, &query.value) {
            Ok(report) => {
                sink.report(&report)?;
                summary.decoded += 1;
            }
            Err(error) => {
                sink.miss(query, &error)?;
                summary.failures.push((query.clone(), error));
            }
        }
    }
    info!(
        decoded = summary.decoded,
        failed = summary.failures.len(),
        "decode batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{decode, decode_batch, not_found_block, FileSink, MemorySink, BLOCK_RULE, FIELD_RULE};
    use crate::bits::BitRange;
    use crate::bits::RangeError;
    use crate::error::{DecodeError, LookupError};
    use crate::query::RegisterQuery;
    use crate::schema::{BitField, Document, RegisterAddress, RegisterRecord};

    fn enet_txc() -> Document {
        Document::FieldTable(vec![RegisterRecord {
            register: "IOMUXC_SW_MUX_CTL_PAD_ENET_TXC".into(),
            address: RegisterAddress::Literal("0x30330070".into()),
            page: 1438,
            bits: vec![
                BitField::new(BitRange::single(4), "SION", "Software Input On Field.\n"),
                BitField::new(BitRange::ReservedBug, "NXP bug -", "This field is reserved.\n"),
                BitField::new(BitRange::Undocumented, "GPR_CTM_SEL", "Select for Coresight master\n"),
                BitField::new(BitRange::span(2, 0), "MUX_MODE", "MUX Mode Select Field.\n"),
            ],
        }])
    }

    #[test]
    fn mux_mode_decodes_to_zero_bits() {
        let report = decode(&enet_txc(), "0x30330070", "0x00000000").expect("decode");
        assert_eq!(report.register, "IOMUXC_SW_MUX_CTL_PAD_ENET_TXC");
        let mux = report.fields.iter().find(|f| f.field == "MUX_MODE").expect("MUX_MODE");
        assert_eq!(mux.bits.as_deref(), Some("000"));
        assert_eq!(report.fields.iter().filter(|f| f.is_anomaly()).count(), 2);
    }

    #[test]
    fn anomalies_are_not_decoded() {
        let report = decode(&enet_txc(), "0x30330070", "0x15").expect("decode");
        let bits: Vec<Option<&str>> = report.fields.iter().map(|f| f.bits.as_deref()).collect();
        assert_eq!(bits, vec![Some("1"), None, None, Some("101")]);
    }

    #[test]
    fn bad_value_and_unknown_address() {
        assert!(matches!(
            decode(&enet_txc(), "0x30330070", "zz"),
            Err(DecodeError::Range(RangeError::InvalidHexValue(_)))
        ));
        let miss = decode(&enet_txc(), "0x30330074", "0x0").expect_err("miss");
        assert_eq!(miss, DecodeError::Lookup(LookupError::AddressNotFound("0x30330074".into())));
        assert!(miss.is_not_found());
    }

    #[test]
    fn block_format() {
        let report = decode(&enet_txc(), "0x30330070", "0x00000005").expect("decode");
        let expected = [
            BLOCK_RULE,
            "register name: IOMUXC_SW_MUX_CTL_PAD_ENET_TXC val: 0x00000005 RM page 1438",
            BLOCK_RULE,
            "4      SION                           val 0     ",
            "desc Software Input On Field.",
            "",
            FIELD_RULE,
            "field NXP bug - desc This field is reserved.",
            "",
            FIELD_RULE,
            "NXPbug in doc name of field GPR_CTM_SEL desc Select for Coresight master",
            "",
            FIELD_RULE,
            "2-0    MUX_MODE                       val 101   ",
            "desc MUX Mode Select Field.",
            "",
            FIELD_RULE,
            "",
        ]
        .join("\n");
        assert_eq!(report.to_block(), expected);
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn batch_continues_past_misses() {
        let queries = vec![
            RegisterQuery::new("0x30330074", "0x0"),
            RegisterQuery::new("0x30330070", "0x0"),
        ];
        let mut sink = MemorySink::default();
        let summary = decode_batch(&enet_txc(), &queries, &mut sink).expect("batch");
        assert_eq!(summary.decoded, 1);
        assert!(!summary.is_clean());
        assert_eq!(sink.reports.len(), 1);
        assert_eq!(sink.misses[0].0.address, "0x30330074");
    }

    #[test]
    fn file_sink_appends_blocks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("imx8mp_result.txt");
        let queries = vec![
            RegisterQuery::new("0x30330070", "0x0"),
            RegisterQuery::new("0x30330074", "0x0"),
        ];

        let mut sink = FileSink::new(&path);
        decode_batch(&enet_txc(), &queries, &mut sink).expect("first batch");
        decode_batch(&enet_txc(), &queries[1..], &mut sink).expect("second batch");

        let text = std::fs::read_to_string(&path).expect("report");
        assert!(text.starts_with(BLOCK_RULE));
        assert!(text.contains("2-0    MUX_MODE                       val 000"));
        assert_eq!(text.matches(&not_found_block("0x30330074")).count(), 2);
    }
}
