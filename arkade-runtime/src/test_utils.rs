//! Builders shared by the runtime tests

use arkade_core::codec::encode_packet;
use arkade_core::id::{AssetId, OutPoint, Txid};
use arkade_core::packet::{AssetInput, AssetOutput, AssetRef, Group, Metadata, Packet};
use arkade_core::record::encode_carrier;
use arkade_transaction::{op_return_script, TransactionView, TxOut};

pub fn txid(fill: u8) -> Txid {
    Txid::new([fill; 32])
}

/// A distinct non-carrier output script
pub fn script(tag: u8) -> Vec<u8> {
    let mut script = vec![0x51, 0x20];
    script.extend_from_slice(&[tag; 32]);
    script
}

pub fn carrier(packet: &Packet) -> TxOut {
    TxOut::new(op_return_script(&encode_carrier(&[], &encode_packet(packet))), 0)
}

/// A transaction with `outputs` plain outputs followed by a carrier for
/// `packet`, if any
pub fn tx(
    fill: u8,
    inputs: Vec<OutPoint>,
    outputs: usize,
    packet: Option<&Packet>,
    tx_index: u32,
) -> TransactionView {
    let mut outs: Vec<TxOut> = (0..outputs)
        .map(|i| TxOut::new(script(fill ^ i as u8), 1000))
        .collect();
    if let Some(packet) = packet {
        outs.push(carrier(packet));
    }
    TransactionView::new(txid(fill), inputs, outs, tx_index)
}

pub fn local_in(vin: u16, amount: u64) -> AssetInput {
    AssetInput::Local { vin, amount }
}

pub fn local_out(vout: u16, amount: u64) -> AssetOutput {
    AssetOutput::Local { vout, amount }
}

pub fn metadata(entries: &[(&str, &str)]) -> Metadata {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Fresh group minting `amount` to `vout`
pub fn mint(vout: u16, amount: u64, control: Option<AssetRef>) -> Group {
    Group {
        control_asset: control,
        outputs: vec![local_out(vout, amount)],
        ..Default::default()
    }
}

/// Group operating on an existing asset
pub fn existing(asset_id: AssetId, inputs: Vec<AssetInput>, outputs: Vec<AssetOutput>) -> Group {
    Group {
        asset_id: Some(asset_id),
        inputs,
        outputs,
        ..Default::default()
    }
}
