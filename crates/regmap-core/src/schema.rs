//! Persisted register-map schema.
//!
//! Two document layouts exist. Field-table documents (i.MX style) are a flat
//! list of registers with absolute or cyclic addresses. Peripheral-map
//! documents (STM32MP style) pair a bus/peripheral address map with register
//! groups whose registers carry offsets relative to a peripheral base.
//!
//! Field names follow the JSON keys of the persisted files, so documents
//! written by older tooling load unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::bits::{parse_hex_value, BitRange};

/// One named, described sub-range of a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField {
    /// Bit range or documentation-bug marker.
    pub range: BitRange,
    /// Field name as printed in the manual.
    pub field: String,
    /// Newline-joined description text.
    pub description: String,
}

impl BitField {
    /// Creates a bitfield.
    #[must_use]
    pub fn new(range: BitRange, field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            range,
            field: field.into(),
            description: description.into(),
        }
    }

    /// Appends one description line, keeping lines newline-separated.
    pub fn push_description(&mut self, text: &str) {
        if !self.description.is_empty() && !self.description.ends_with('\n') {
            self.description.push('\n');
        }
        self.description.push_str(text);
        self.description.push('\n');
    }
}

/// Family of equivalent registers at `base + offset + step * i`, `i` in `start..=end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclicAddress {
    /// Base address as hex string.
    pub base: String,
    /// Offset from base as hex string.
    pub offset: String,
    /// Distance between instances in bytes.
    pub step: u64,
    /// First instance index.
    pub start: u64,
    /// Last instance index, inclusive.
    pub end: u64,
}

impl CyclicAddress {
    fn origin(&self) -> Option<u128> {
        let base = parse_hex_value(&self.base).ok()?;
        let offset = parse_hex_value(&self.offset).ok()?;
        base.checked_add(offset)
    }

    /// Address of instance `index`, if the index is in range.
    #[must_use]
    pub fn instance_address(&self, index: u64) -> Option<u128> {
        if index < self.start || index > self.end {
            return None;
        }
        let origin = self.origin()?;
        u128::from(self.step)
            .checked_mul(u128::from(index))
            .and_then(|delta| origin.checked_add(delta))
    }

    /// Instance index whose address equals `address`.
    #[must_use]
    pub fn index_of(&self, address: u128) -> Option<u64> {
        let distance = address.checked_sub(self.origin()?)?;
        let index = if self.step == 0 {
            (distance == 0).then_some(self.start)?
        } else {
            let step = u128::from(self.step);
            if distance % step != 0 {
                return None;
            }
            u64::try_from(distance / step).ok()?
        };
        (self.start..=self.end).contains(&index).then_some(index)
    }
}

/// Where a field-table register lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterAddress {
    /// Single absolute address (hex string).
    Literal(String),
    /// Family of equivalent registers.
    Cyclic(CyclicAddress),
    /// The manual gave no address before the register table.
    Unknown,
}

/// Register record of a field-table document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegisterRecord", into = "RawRegisterRecord")]
pub struct RegisterRecord {
    /// Register name, unique within the document.
    pub register: String,
    /// Literal or cyclic address.
    pub address: RegisterAddress,
    /// Manual page where the register's table starts.
    pub page: u32,
    /// Bitfields in declaration order.
    pub bits: Vec<BitField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRegisterRecord {
    register: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address_cyclic: Option<CyclicAddress>,
    page: u32,
    #[serde(default)]
    bits: Vec<BitField>,
}

/// Schema violations caught while loading a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Both `address` and `address_cyclic` are set.
    #[error("register {0} has both address and address_cyclic")]
    AmbiguousAddress(String),
    /// An address field is not a hex number.
    #[error("register {register}: {value:?} is not a hex address")]
    InvalidHex {
        /// Register carrying the value.
        register: String,
        /// Offending value.
        value: String,
    },
}

impl TryFrom<RawRegisterRecord> for RegisterRecord {
    type Error = SchemaError;

    fn try_from(raw: RawRegisterRecord) -> Result<Self, Self::Error> {
        let check_hex = |value: &str| {
            parse_hex_value(value).map(|_| ()).map_err(|_| SchemaError::InvalidHex {
                register: raw.register.clone(),
                value: value.to_string(),
            })
        };

        let literal = raw.address.as_deref().filter(|a| !a.trim().is_empty());
        let address = match (literal, raw.address_cyclic.as_ref()) {
            (Some(_), Some(_)) => return Err(SchemaError::AmbiguousAddress(raw.register)),
            (Some(addr), None) => {
                check_hex(addr)?;
                RegisterAddress::Literal(addr.to_string())
            }
            (None, Some(cyclic)) => {
                check_hex(&cyclic.base)?;
                check_hex(&cyclic.offset)?;
                RegisterAddress::Cyclic(cyclic.clone())
            }
            (None, None) => RegisterAddress::Unknown,
        };

        Ok(Self {
            register: raw.register,
            address,
            page: raw.page,
            bits: raw.bits,
        })
    }
}

impl From<RegisterRecord> for RawRegisterRecord {
    fn from(record: RegisterRecord) -> Self {
        let (address, address_cyclic) = match record.address {
            RegisterAddress::Literal(addr) => (Some(addr), None),
            RegisterAddress::Cyclic(cyclic) => (None, Some(cyclic)),
            RegisterAddress::Unknown => (None, None),
        };
        Self {
            register: record.register,
            address,
            address_cyclic,
            page: record.page,
            bits: record.bits,
        }
    }
}

/// Register of a peripheral-map document, addressed by offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRegister {
    /// Register name from the section heading parentheses.
    pub registername: String,
    /// Offset from the peripheral base, `None` if the manual gave none.
    pub offset: Option<String>,
    /// Manual page of the register section.
    pub page: u32,
    /// Section number, e.g. `52.9.1`.
    #[serde(default)]
    pub chapter: String,
    /// Reset value, 8 hex digits lower case.
    #[serde(default)]
    pub resetvalue: Option<String>,
    /// Bitfields in declaration order.
    #[serde(default)]
    pub bits: Vec<BitField>,
}

/// One row of the bus/peripheral address map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralMapEntry {
    /// Bus name, inherited from the previous row when the cell was merged.
    pub bus: Option<String>,
    /// Boundary address as `0xSTART - 0xEND`.
    pub range: String,
    /// Size as printed, e.g. `1KB`.
    #[serde(default)]
    pub size: String,
    /// Peripheral instance, e.g. `USART2`.
    #[serde(default)]
    pub peripheral: String,
    /// Name of the register-map group shared by instances.
    #[serde(default)]
    pub peripheralmap: String,
}

impl PeripheralMapEntry {
    /// Inclusive `(start, end)` of the boundary address.
    #[must_use]
    pub fn bounds(&self) -> Option<(u128, u128)> {
        let (start, end) = self.range.split_once('-')?;
        Some((parse_hex_value(start).ok()?, parse_hex_value(end).ok()?))
    }

    /// True when `address` lies within the boundary.
    #[must_use]
    pub fn contains(&self, address: u128) -> bool {
        self.bounds()
            .is_some_and(|(start, end)| (start..=end).contains(&address))
    }
}

/// Register-map group shared by all instances of a peripheral family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMap {
    /// Group name, matched against [`PeripheralMapEntry::peripheralmap`].
    pub mapname: String,
    /// Registers in manual order.
    pub registers: Vec<OffsetRegister>,
}

/// Peripheral-map document.
///
/// Persisted as `[{"peripheralmaps": [...]}, {"registermaps": [...]}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeripheralDocument {
    /// Bus/peripheral address map rows.
    pub peripheralmaps: Vec<PeripheralMapEntry>,
    /// Register-map groups.
    pub registermaps: Vec<RegisterMap>,
}

#[derive(Serialize)]
struct PeripheralMapsOut<'a> {
    peripheralmaps: &'a [PeripheralMapEntry],
}

#[derive(Serialize)]
struct RegisterMapsOut<'a> {
    registermaps: &'a [RegisterMap],
}

#[derive(Deserialize)]
struct PeripheralMapsIn {
    peripheralmaps: Vec<PeripheralMapEntry>,
}

#[derive(Deserialize)]
struct RegisterMapsIn {
    registermaps: Vec<RegisterMap>,
}

impl Serialize for PeripheralDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            PeripheralMapsOut {
                peripheralmaps: &self.peripheralmaps,
            },
            RegisterMapsOut {
                registermaps: &self.registermaps,
            },
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PeripheralDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (maps, groups) = <(PeripheralMapsIn, RegisterMapsIn)>::deserialize(deserializer)?;
        Ok(Self {
            peripheralmaps: maps.peripheralmaps,
            registermaps: groups.registermaps,
        })
    }
}

/// Layout family of a register-map document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFamily {
    /// Per-register "field descriptions" tables with absolute addresses.
    FieldTable,
    /// Peripheral address map plus per-group register chapters.
    PeripheralMap,
}

impl DocumentFamily {
    /// Human-readable layout name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FieldTable => "field-table",
            Self::PeripheralMap => "peripheral-map",
        }
    }
}

/// A complete register-map document of either family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    /// Field-table document.
    FieldTable(Vec<RegisterRecord>),
    /// Peripheral-map document.
    PeripheralMap(PeripheralDocument),
}

impl Document {
    /// Layout family of this document.
    #[must_use]
    pub const fn family(&self) -> DocumentFamily {
        match self {
            Self::FieldTable(_) => DocumentFamily::FieldTable,
            Self::PeripheralMap(_) => DocumentFamily::PeripheralMap,
        }
    }

    /// JSON key that holds a register's name in this layout.
    #[must_use]
    pub const fn register_name_key(&self) -> &'static str {
        match self {
            Self::FieldTable(_) => "register",
            Self::PeripheralMap(_) => "registername",
        }
    }

    /// Total number of registers across all groups.
    #[must_use]
    pub fn register_count(&self) -> usize {
        match self {
            Self::FieldTable(records) => records.len(),
            Self::PeripheralMap(doc) => doc.registermaps.iter().map(|m| m.registers.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BitField, CyclicAddress, Document, PeripheralDocument, PeripheralMapEntry, RegisterAddress,
        RegisterRecord,
    };
    use crate::bits::BitRange;

    fn cyclic() -> CyclicAddress {
        CyclicAddress {
            base: "0x30340000".into(),
            offset: "0x10".into(),
            step: 4,
            start: 1,
            end: 3,
        }
    }

    #[test]
    fn cyclic_address_membership() {
        let c = cyclic();
        assert_eq!(c.index_of(0x3034_0014), Some(1));
        assert_eq!(c.index_of(0x3034_001C), Some(3));
        assert_eq!(c.index_of(0x3034_0010), None);
        assert_eq!(c.index_of(0x3034_0020), None);
        assert_eq!(c.index_of(0x3034_0015), None);
        assert_eq!(c.instance_address(2), Some(0x3034_0018));
        assert_eq!(c.instance_address(4), None);
    }

    #[test]
    fn zero_step_cyclic_matches_only_origin() {
        let c = CyclicAddress {
            step: 0,
            start: 0,
            end: 0,
            ..cyclic()
        };
        assert_eq!(c.index_of(0x3034_0010), Some(0));
        assert_eq!(c.index_of(0x3034_0014), None);
    }

    #[test]
    fn record_rejects_both_address_kinds() {
        let json = r#"{"register": "R", "address": "0x1",
            "address_cyclic": {"base": "0x0", "offset": "0x0", "step": 4, "start": 0, "end": 1},
            "page": 1, "bits": []}"#;
        let err = serde_json::from_str::<RegisterRecord>(json).expect_err("ambiguous");
        assert!(err.to_string().contains("both address and address_cyclic"));
    }

    #[test]
    fn record_accepts_null_or_empty_address_with_cyclic() {
        let json = r#"{"register": "R", "address": null,
            "address_cyclic": {"base": "0x30340000", "offset": "0x10", "step": 4, "start": 1, "end": 3},
            "page": 1, "bits": []}"#;
        let record: RegisterRecord = serde_json::from_str(json).expect("cyclic record");
        assert_eq!(record.address, RegisterAddress::Cyclic(cyclic()));

        let json = r#"{"register": "R", "address": "", "page": 1, "bits": []}"#;
        let record: RegisterRecord = serde_json::from_str(json).expect("unknown address");
        assert_eq!(record.address, RegisterAddress::Unknown);
    }

    #[test]
    fn record_rejects_non_hex_address() {
        let json = r#"{"register": "R", "address": "nowhere", "page": 1, "bits": []}"#;
        assert!(serde_json::from_str::<RegisterRecord>(json).is_err());
    }

    #[test]
    fn peripheral_entry_bounds_are_inclusive() {
        let entry = PeripheralMapEntry {
            bus: Some("APB1".into()),
            range: "0x40000000 - 0x400003FF".into(),
            size: "1KB".into(),
            peripheral: "TIM2".into(),
            peripheralmap: "TIM2 registers".into(),
        };
        assert!(entry.contains(0x4000_0000));
        assert!(entry.contains(0x4000_03FF));
        assert!(!entry.contains(0x4000_0400));
    }

    #[test]
    fn peripheral_document_persists_as_two_sections() {
        let doc = Document::PeripheralMap(PeripheralDocument::default());
        let json = serde_json::to_string(&doc).expect("serialize");
        assert_eq!(json, r#"[{"peripheralmaps":[]},{"registermaps":[]}]"#);
        let back: Document = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, doc);
    }

    #[test]
    fn field_table_document_keeps_key_order() {
        let doc = Document::FieldTable(vec![RegisterRecord {
            register: "IOMUXC_GPR_GPR1".into(),
            address: RegisterAddress::Literal("0x30340004".into()),
            page: 1362,
            bits: vec![BitField::new(BitRange::single(21), "EN", "enable\n")],
        }]);
        let json = serde_json::to_string(&doc).expect("serialize");
        assert_eq!(
            json,
            r#"[{"register":"IOMUXC_GPR_GPR1","address":"0x30340004","page":1362,"bits":[{"range":"21","field":"EN","description":"enable\n"}]}]"#
        );
        assert_eq!(doc.register_name_key(), "register");
    }

    #[test]
    fn push_description_joins_with_newlines() {
        let mut field = BitField::new(BitRange::single(0), "EN", "Enable");
        field.push_description("0 off");
        field.push_description("1 on");
        assert_eq!(field.description, "Enable\n0 off\n1 on\n");
    }
}
