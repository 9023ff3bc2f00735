//! Binary codec for asset packets
//!
//! Layout of a packet payload:
//!
//! ```text
//! Packet  := CompactSize(group_count) || Group*
//! Group   := presence:u8 || [AssetId] || [AssetRef] || [Metadata]
//!            || CompactSize(n) || AssetInput{n} || CompactSize(m) || AssetOutput{m}
//! ```
//!
//! Presence bits 0-3 flag the optional fields in that order (the immutable
//! flag carries no payload). Bits 4-5 are reserved and must be zero, bits 6-7
//! are ignored on decode and never written. Integers are little-endian and
//! amounts use Bitcoin's CompactSize encoding.

use crate::error::DecodeError;
use crate::id::{AssetId, Txid};
use crate::packet::{AssetInput, AssetOutput, AssetRef, Group, Metadata, Packet};

const PRESENCE_ASSET_ID: u8 = 0x01;
const PRESENCE_CONTROL_ASSET: u8 = 0x02;
const PRESENCE_METADATA: u8 = 0x04;
const PRESENCE_IMMUTABLE: u8 = 0x08;
const PRESENCE_RESERVED: u8 = 0x30;

// Markers are scoped to their field type.
const ASSET_REF_BY_ID: u8 = 0x01;
const ASSET_REF_BY_GROUP: u8 = 0x02;
const INPUT_LOCAL: u8 = 0x01;
const INPUT_TELEPORT: u8 = 0x02;
const OUTPUT_LOCAL: u8 = 0x01;
const OUTPUT_TELEPORT: u8 = 0x02;

/// Bounds applied while decoding untrusted packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    pub max_groups: usize,
    pub max_metadata_entries: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_groups: 256,
            max_metadata_entries: 64,
        }
    }
}

/// Cursor over an untrusted byte buffer
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn array32(&mut self) -> Result<[u8; 32], DecodeError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32)?);
        Ok(out)
    }

    /// Read a canonical CompactSize integer
    pub(crate) fn compact_size(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let (value, min) = match self.u8()? {
            0xfd => {
                let b = self.take(2)?;
                (u16::from_le_bytes([b[0], b[1]]) as u64, 0xfd)
            }
            0xfe => {
                let b = self.take(4)?;
                (u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64, 0x1_0000)
            }
            0xff => {
                let mut b = [0u8; 8];
                b.copy_from_slice(self.take(8)?);
                (u64::from_le_bytes(b), 0x1_0000_0000)
            }
            n => return Ok(n as u64),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalVarint(start));
        }
        Ok(value)
    }

    /// Read a CompactSize length and make sure that many bytes can follow
    pub(crate) fn length(&mut self) -> Result<usize, DecodeError> {
        let len = self.compact_size()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::LengthOverflow(len))?;
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        Ok(len)
    }

    /// Read an element count. Every element takes at least `min_size` bytes,
    /// so counts the buffer cannot hold are rejected before allocating.
    fn count(&mut self, min_size: usize) -> Result<usize, DecodeError> {
        let count = self.compact_size()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::LengthOverflow(count))?;
        let needed = count.saturating_mul(min_size);
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: needed - self.remaining(),
            });
        }
        Ok(count)
    }
}

/// Append a CompactSize integer
pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Append a CompactSize length followed by the bytes themselves
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Encoder/decoder for asset packet payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    limits: CodecLimits,
}

impl PacketCodec {
    pub fn new(limits: CodecLimits) -> Self {
        Self { limits }
    }

    /// Decode exactly one packet; any byte left after the last group is an error
    pub fn decode(&self, bytes: &[u8]) -> Result<Packet, DecodeError> {
        let mut reader = Reader::new(bytes);

        let count = reader.compact_size()?;
        if count == 0 {
            return Err(DecodeError::EmptyPacket);
        }
        if count > self.limits.max_groups as u64 {
            return Err(DecodeError::TooManyGroups {
                count,
                limit: self.limits.max_groups,
            });
        }

        let mut groups = Vec::with_capacity(count as usize);
        for _ in 0..count {
            groups.push(self.decode_group(&mut reader)?);
        }

        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }

        Ok(Packet { groups })
    }

    fn decode_group(&self, reader: &mut Reader<'_>) -> Result<Group, DecodeError> {
        let presence = reader.u8()?;
        if presence & PRESENCE_RESERVED != 0 {
            return Err(DecodeError::ReservedBits(presence));
        }

        let asset_id = if presence & PRESENCE_ASSET_ID != 0 {
            Some(decode_asset_id(reader)?)
        } else {
            None
        };

        let control_asset = if presence & PRESENCE_CONTROL_ASSET != 0 {
            Some(match reader.u8()? {
                ASSET_REF_BY_ID => AssetRef::ById(decode_asset_id(reader)?),
                ASSET_REF_BY_GROUP => AssetRef::ByGroup(reader.u16_le()?),
                marker => {
                    return Err(DecodeError::InvalidMarker {
                        field: "asset ref",
                        marker,
                    })
                }
            })
        } else {
            None
        };

        let metadata = if presence & PRESENCE_METADATA != 0 {
            Some(self.decode_metadata(reader)?)
        } else {
            None
        };

        let immutable = presence & PRESENCE_IMMUTABLE != 0;

        // marker + index + 1 byte amount
        let input_count = reader.count(4)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(match reader.u8()? {
                INPUT_LOCAL => AssetInput::Local {
                    vin: reader.u16_le()?,
                    amount: reader.compact_size()?,
                },
                INPUT_TELEPORT => AssetInput::Teleport {
                    commitment: reader.array32()?,
                    nonce: reader.array32()?,
                    amount: reader.compact_size()?,
                },
                marker => {
                    return Err(DecodeError::InvalidMarker {
                        field: "asset input",
                        marker,
                    })
                }
            });
        }

        let output_count = reader.count(4)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(match reader.u8()? {
                OUTPUT_LOCAL => AssetOutput::Local {
                    vout: reader.u16_le()?,
                    amount: reader.compact_size()?,
                },
                OUTPUT_TELEPORT => AssetOutput::Teleport {
                    commitment: reader.array32()?,
                    amount: reader.compact_size()?,
                },
                marker => {
                    return Err(DecodeError::InvalidMarker {
                        field: "asset output",
                        marker,
                    })
                }
            });
        }

        Ok(Group {
            asset_id,
            control_asset,
            metadata,
            immutable,
            inputs,
            outputs,
        })
    }

    fn decode_metadata(&self, reader: &mut Reader<'_>) -> Result<Metadata, DecodeError> {
        let count = reader.compact_size()?;
        if count > self.limits.max_metadata_entries as u64 {
            return Err(DecodeError::TooManyMetadataEntries {
                count,
                limit: self.limits.max_metadata_entries,
            });
        }

        let mut metadata = Metadata::new();
        for _ in 0..count {
            let key = decode_string(reader)?;
            let value = decode_string(reader)?;
            if metadata.contains_key(&key) {
                return Err(DecodeError::DuplicateMetadataKey(key));
            }
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    /// Encode a packet payload
    pub fn encode(&self, packet: &Packet) -> Vec<u8> {
        encode_packet(packet)
    }
}

fn decode_asset_id(reader: &mut Reader<'_>) -> Result<AssetId, DecodeError> {
    let txid = Txid::new(reader.array32()?);
    let group_index = reader.u16_le()?;
    Ok(AssetId::new(txid, group_index))
}

fn decode_string(reader: &mut Reader<'_>) -> Result<String, DecodeError> {
    let len = reader.length()?;
    let bytes = reader.take(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

fn encode_asset_id(out: &mut Vec<u8>, id: &AssetId) {
    out.extend_from_slice(&id.to_bytes());
}

/// Encode a packet payload (without magic or record type)
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let mut out = Vec::new();
    write_compact_size(&mut out, packet.groups.len() as u64);

    for group in &packet.groups {
        let mut presence = 0u8;
        if group.asset_id.is_some() {
            presence |= PRESENCE_ASSET_ID;
        }
        if group.control_asset.is_some() {
            presence |= PRESENCE_CONTROL_ASSET;
        }
        if group.metadata.is_some() {
            presence |= PRESENCE_METADATA;
        }
        if group.immutable {
            presence |= PRESENCE_IMMUTABLE;
        }
        out.push(presence);

        if let Some(id) = &group.asset_id {
            encode_asset_id(&mut out, id);
        }

        if let Some(control) = &group.control_asset {
            match control {
                AssetRef::ById(id) => {
                    out.push(ASSET_REF_BY_ID);
                    encode_asset_id(&mut out, id);
                }
                AssetRef::ByGroup(index) => {
                    out.push(ASSET_REF_BY_GROUP);
                    out.extend_from_slice(&index.to_le_bytes());
                }
            }
        }

        if let Some(metadata) = &group.metadata {
            write_compact_size(&mut out, metadata.len() as u64);
            for (key, value) in metadata {
                write_var_bytes(&mut out, key.as_bytes());
                write_var_bytes(&mut out, value.as_bytes());
            }
        }

        write_compact_size(&mut out, group.inputs.len() as u64);
        for input in &group.inputs {
            match input {
                AssetInput::Local { vin, amount } => {
                    out.push(INPUT_LOCAL);
                    out.extend_from_slice(&vin.to_le_bytes());
                    write_compact_size(&mut out, *amount);
                }
                AssetInput::Teleport {
                    commitment,
                    nonce,
                    amount,
                } => {
                    out.push(INPUT_TELEPORT);
                    out.extend_from_slice(commitment);
                    out.extend_from_slice(nonce);
                    write_compact_size(&mut out, *amount);
                }
            }
        }

        write_compact_size(&mut out, group.outputs.len() as u64);
        for output in &group.outputs {
            match output {
                AssetOutput::Local { vout, amount } => {
                    out.push(OUTPUT_LOCAL);
                    out.extend_from_slice(&vout.to_le_bytes());
                    write_compact_size(&mut out, *amount);
                }
                AssetOutput::Teleport { commitment, amount } => {
                    out.push(OUTPUT_TELEPORT);
                    out.extend_from_slice(commitment);
                    write_compact_size(&mut out, *amount);
                }
            }
        }
    }

    out
}

/// Decode a packet payload with default limits
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, DecodeError> {
    PacketCodec::default().decode(bytes)
}
