//! Record envelope carried by a data-carrier output
//!
//! `MAGIC || Record*` where each record starts with its type byte. The type's
//! range decides how the payload is delimited:
//!
//! * `0x00..=0x3F` self-delimiting. Only the asset packet (`0x00`) is known
//!   and it runs to the end of the carrier.
//! * `0x40..=0x7F` CompactSize length prefix, must be understood.
//! * `0x80..=0xFF` CompactSize length prefix, skipped when unknown.

use crate::codec::{write_var_bytes, Reader};
use crate::error::DecodeError;

/// Magic prefix of every Arkade carrier
pub const MAGIC: &[u8; 3] = b"ARK";

/// Record type of the asset packet
pub const RECORD_ASSET_PACKET: u8 = 0x00;

const SELF_DELIMITING_MAX: u8 = 0x3f;
const LENGTH_PREFIXED_MAX: u8 = 0x7f;

/// One record found in a carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// Undecoded asset packet payload
    AssetPacket(&'a [u8]),
    /// Skippable extension record
    Extension { record_type: u8, payload: &'a [u8] },
}

/// Returns true if the carrier data starts with the Arkade magic
pub fn has_magic(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Split carrier data into its records
///
/// Parsing stops at the asset packet record since it is self-delimiting and
/// always the last record of its carrier.
pub fn parse_records(data: &[u8]) -> Result<Vec<Record<'_>>, DecodeError> {
    if !has_magic(data) {
        return Err(DecodeError::BadMagic);
    }

    let mut reader = Reader::new(&data[MAGIC.len()..]);
    let mut records = Vec::new();

    while reader.remaining() > 0 {
        let record_type = reader.u8()?;
        match record_type {
            RECORD_ASSET_PACKET => {
                records.push(Record::AssetPacket(reader.rest()));
                break;
            }
            0x01..=SELF_DELIMITING_MAX => {
                return Err(DecodeError::UnknownRecordType(record_type));
            }
            0x40..=LENGTH_PREFIXED_MAX => {
                // No mandatory length-prefixed record is defined yet
                return Err(DecodeError::UnknownRecordType(record_type));
            }
            _ => {
                let len = reader.length()?;
                let payload = reader.take(len)?;
                records.push(Record::Extension {
                    record_type,
                    payload,
                });
            }
        }
    }

    Ok(records)
}

/// Find the asset packet payload of a carrier, if it has one
pub fn find_asset_packet(data: &[u8]) -> Result<Option<&[u8]>, DecodeError> {
    Ok(parse_records(data)?.into_iter().find_map(|record| match record {
        Record::AssetPacket(payload) => Some(payload),
        Record::Extension { .. } => None,
    }))
}

/// Build carrier data holding the given extension records followed by an
/// encoded asset packet payload
pub fn encode_carrier(extensions: &[(u8, &[u8])], packet_payload: &[u8]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    for (record_type, payload) in extensions {
        debug_assert!(*record_type > LENGTH_PREFIXED_MAX);
        out.push(*record_type);
        write_var_bytes(&mut out, payload);
    }
    out.push(RECORD_ASSET_PACKET);
    out.extend_from_slice(packet_payload);
    out
}
