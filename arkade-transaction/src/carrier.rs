//! Data-carrier scanning and asset packet selection

use crate::TransactionView;
use arkade_core::codec::PacketCodec;
use arkade_core::error::DecodeError;
use arkade_core::packet::Packet;
use arkade_core::record::{find_asset_packet, has_magic};
use log::debug;

const OP_0: u8 = 0x00;
const OP_PUSHBYTES_75: u8 = 0x4b;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_RETURN: u8 = 0x6a;

/// Largest payload a single standard push may carry
const MAX_PUSH_SIZE: usize = 520;

/// Outcome of looking for an asset packet in a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketSelection {
    /// No carrier holds an asset packet record
    Absent,
    /// The candidate record decoded successfully
    Present(Packet),
    /// The candidate record exists but failed to decode
    Malformed(DecodeError),
}

/// Extract the concatenated push payloads of an `OP_RETURN` script
///
/// Returns `None` if the script is not a data carrier or contains anything
/// other than data pushes after `OP_RETURN`.
pub fn carrier_data(script: &[u8]) -> Option<Vec<u8>> {
    let (&first, mut rest) = script.split_first()?;
    if first != OP_RETURN {
        return None;
    }

    let mut data = Vec::new();
    while let Some((&opcode, tail)) = rest.split_first() {
        let (len, tail) = match opcode {
            OP_0 => (0, tail),
            1..=OP_PUSHBYTES_75 => (opcode as usize, tail),
            OP_PUSHDATA1 => {
                let (&len, tail) = tail.split_first()?;
                (len as usize, tail)
            }
            OP_PUSHDATA2 => {
                let bytes = tail.get(..2)?;
                (u16::from_le_bytes([bytes[0], bytes[1]]) as usize, &tail[2..])
            }
            OP_PUSHDATA4 => {
                let bytes = tail.get(..4)?;
                let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (usize::try_from(len).ok()?, &tail[4..])
            }
            _ => return None,
        };
        data.extend_from_slice(tail.get(..len)?);
        rest = &tail[len..];
    }

    Some(data)
}

/// Build an `OP_RETURN` script carrying `data` in standard-size pushes
pub fn op_return_script(data: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_RETURN];
    for chunk in data.chunks(MAX_PUSH_SIZE) {
        match chunk.len() {
            len @ 1..=0x4b => script.push(len as u8),
            len @ 0x4c..=0xff => {
                script.push(OP_PUSHDATA1);
                script.push(len as u8);
            }
            len => {
                script.push(OP_PUSHDATA2);
                script.extend_from_slice(&(len as u16).to_le_bytes());
            }
        }
        script.extend_from_slice(chunk);
    }
    script
}

/// Select the asset packet of a transaction
///
/// Carriers are visited in output order. A carrier whose record envelope
/// cannot be parsed is skipped. The first asset packet record found is the
/// candidate and its decode result is final.
///
/// # Parameters
/// * `tx` - The transaction to scan
/// * `codec` - Codec used to decode the candidate record
///
/// # Returns
/// `Absent`, `Present` or `Malformed` as described on [`PacketSelection`]
pub fn select_packet(tx: &TransactionView, codec: &PacketCodec) -> PacketSelection {
    for (vout, output) in tx.outputs.iter().enumerate() {
        let Some(data) = carrier_data(&output.script_pubkey) else {
            continue;
        };
        if !has_magic(&data) {
            continue;
        }

        match find_asset_packet(&data) {
            Ok(Some(payload)) => {
                debug!("Tx {}: asset packet candidate in output {}", tx.txid, vout);
                return match codec.decode(payload) {
                    Ok(packet) => PacketSelection::Present(packet),
                    Err(e) => PacketSelection::Malformed(e),
                };
            }
            Ok(None) => continue,
            Err(e) => {
                debug!("Tx {}: skipping carrier in output {}: {}", tx.txid, vout, e);
            }
        }
    }

    PacketSelection::Absent
}
