//! Address and name lookups against a loaded register-map document.

use tracing::debug;

use crate::bits::parse_hex_value;
use crate::error::LookupError;
use crate::schema::{
    BitField, Document, OffsetRegister, PeripheralDocument, PeripheralMapEntry, RegisterAddress,
    RegisterRecord,
};

/// A register found in a document, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRegister<'a> {
    /// Field-table register.
    FieldTable(&'a RegisterRecord),
    /// Peripheral-map register and the peripheral instance it was found in.
    PeripheralMap {
        /// Peripheral whose range contains the address.
        entry: &'a PeripheralMapEntry,
        /// Register at the address.
        register: &'a OffsetRegister,
    },
}

impl<'a> ResolvedRegister<'a> {
    /// Register name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match *self {
            Self::FieldTable(record) => &record.register,
            Self::PeripheralMap { register, .. } => &register.registername,
        }
    }

    /// Manual page of the register.
    #[must_use]
    pub const fn page(&self) -> u32 {
        match *self {
            Self::FieldTable(record) => record.page,
            Self::PeripheralMap { register, .. } => register.page,
        }
    }

    /// Bitfields in declaration order.
    #[must_use]
    pub fn bits(&self) -> &'a [BitField] {
        match *self {
            Self::FieldTable(record) => &record.bits,
            Self::PeripheralMap { register, .. } => &register.bits,
        }
    }
}

/// Finds the register at `address`.
///
/// Addresses compare numerically, so `0x3033_0070` and `0x30330070` are
/// the same address.
///
/// # Errors
///
/// [`LookupError::InvalidAddress`] if `address` is not hex; otherwise one of
/// the not-found variants (see [`LookupError::is_not_found`]).
pub fn search_address<'a>(
    document: &'a Document,
    address: &str,
) -> Result<ResolvedRegister<'a>, LookupError> {
    let wanted =
        parse_hex_value(address).map_err(|_| LookupError::InvalidAddress(address.to_string()))?;
    match document {
        Document::FieldTable(records) => search_field_table(records, wanted)
            .map(ResolvedRegister::FieldTable)
            .ok_or_else(|| LookupError::AddressNotFound(address.to_string())),
        Document::PeripheralMap(doc) => search_peripheral_map(doc, address, wanted),
    }
}

fn search_field_table(records: &[RegisterRecord], wanted: u128) -> Option<&RegisterRecord> {
    records.iter().find(|record| match &record.address {
        RegisterAddress::Literal(literal) => parse_hex_value(literal).ok() == Some(wanted),
        RegisterAddress::Cyclic(cyclic) => cyclic.index_of(wanted).is_some(),
        RegisterAddress::Unknown => false,
    })
}

fn search_peripheral_map<'a>(
    doc: &'a PeripheralDocument,
    address: &str,
    wanted: u128,
) -> Result<ResolvedRegister<'a>, LookupError> {
    let (entry, start) = doc
        .peripheralmaps
        .iter()
        .find_map(|entry| {
            let (start, end) = entry.bounds()?;
            (start..=end).contains(&wanted).then_some((entry, start))
        })
        .ok_or_else(|| LookupError::NoPeripheralMapping(address.to_string()))?;

    let map = doc
        .registermaps
        .iter()
        .find(|map| map.mapname == entry.peripheralmap)
        .ok_or_else(|| LookupError::NoRegisterMapping(address.to_string()))?;

    debug!(
        address,
        peripheral = %entry.peripheral,
        mapname = %map.mapname,
        "peripheral resolved"
    );

    map.registers
        .iter()
        .find(|register| register_address(start, register) == Some(wanted))
        .map(|register| ResolvedRegister::PeripheralMap { entry, register })
        .ok_or_else(|| LookupError::AddressNotFound(address.to_string()))
}

fn register_address(start: u128, register: &OffsetRegister) -> Option<u128> {
    let offset = parse_hex_value(register.offset.as_deref()?).ok()?;
    start.checked_add(offset)
}

/// Turns a `name index` pair from a register list into an address.
pub trait NameResolver {
    /// Address of register `name`, instance `index`, as `0x` hex.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] when the name or index does not resolve.
    fn address_of(&self, name: &str, index: &str) -> Result<String, LookupError>;
}

impl NameResolver for Document {
    /// Field-table documents take a numeric index: `0` for a register with
    /// a single address, the instance number for a cyclic register.
    /// Peripheral-map documents take the peripheral instance name
    /// (`USART2`) as index.
    fn address_of(&self, name: &str, index: &str) -> Result<String, LookupError> {
        let address = match self {
            Self::FieldTable(records) => field_table_address(records, name, index)?,
            Self::PeripheralMap(doc) => peripheral_address(doc, name, index)?,
        };
        Ok(format!("{address:#010x}"))
    }
}

fn field_table_address(records: &[RegisterRecord], name: &str, index: &str) -> Result<u128, LookupError> {
    let invalid_index = || LookupError::InvalidIndex {
        name: name.to_string(),
        index: index.to_string(),
    };
    let record = records
        .iter()
        .find(|record| record.register == name && record.address != RegisterAddress::Unknown)
        .ok_or_else(|| LookupError::UnknownRegister(name.to_string()))?;
    let instance: u64 = index.trim().parse().map_err(|_| invalid_index())?;

    match &record.address {
        RegisterAddress::Literal(literal) if instance == 0 => {
            parse_hex_value(literal).map_err(|_| LookupError::InvalidAddress(literal.clone()))
        }
        RegisterAddress::Cyclic(cyclic) => cyclic.instance_address(instance).ok_or_else(invalid_index),
        RegisterAddress::Literal(_) | RegisterAddress::Unknown => Err(invalid_index()),
    }
}

fn peripheral_address(doc: &PeripheralDocument, name: &str, index: &str) -> Result<u128, LookupError> {
    let entry = doc
        .peripheralmaps
        .iter()
        .find(|entry| entry.peripheral == index)
        .ok_or_else(|| LookupError::InvalidIndex {
            name: name.to_string(),
            index: index.to_string(),
        })?;
    let (start, _) = entry
        .bounds()
        .ok_or_else(|| LookupError::InvalidAddress(entry.range.clone()))?;
    let map = doc
        .registermaps
        .iter()
        .find(|map| map.mapname == entry.peripheralmap)
        .ok_or_else(|| LookupError::NoRegisterMapping(index.to_string()))?;

    map.registers
        .iter()
        .filter(|register| register.registername == name)
        .find_map(|register| register_address(start, register))
        .ok_or_else(|| LookupError::UnknownRegister(name.to_string()))
}
