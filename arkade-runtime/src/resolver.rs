//! Resolution of intra-packet asset references

use arkade_core::error::ResolveError;
use arkade_core::id::{AssetId, Txid};
use arkade_core::packet::{AssetRef, Group, Packet};

/// A packet whose groups all carry a concrete asset identity
///
/// The packet itself is borrowed unchanged; resolution only produces the
/// lookup tables next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPacket<'a> {
    packet: &'a Packet,
    txid: Txid,
    group_ids: Vec<AssetId>,
    controls: Vec<Option<AssetId>>,
}

impl<'a> ResolvedPacket<'a> {
    pub fn packet(&self) -> &'a Packet {
        self.packet
    }

    /// Transaction carrying the packet
    pub fn txid(&self) -> Txid {
        self.txid
    }

    pub fn group_count(&self) -> usize {
        self.group_ids.len()
    }

    pub fn group(&self, index: usize) -> Option<&'a Group> {
        self.packet.groups.get(index)
    }

    /// Resolved asset of group `index`
    pub fn group_id(&self, index: usize) -> Option<AssetId> {
        self.group_ids.get(index).copied()
    }

    /// Resolved control asset declared by group `index`
    pub fn control(&self, index: usize) -> Option<AssetId> {
        self.controls.get(index).copied().flatten()
    }

    pub fn group_ids(&self) -> &[AssetId] {
        &self.group_ids
    }

    /// Index of the first group operating on `asset_id`
    pub fn index_of(&self, asset_id: &AssetId) -> Option<usize> {
        self.group_ids.iter().position(|id| id == asset_id)
    }

    /// Iterate over `(index, group, resolved asset)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Group, AssetId)> + '_ {
        self.packet
            .groups
            .iter()
            .zip(self.group_ids.iter())
            .enumerate()
            .map(|(index, (group, id))| (index, group, *id))
    }
}

/// Resolves `ByGroup` references and fresh identities of a packet
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every group of `packet` carried by transaction `txid`
    ///
    /// # Parameters
    /// * `packet` - The decoded packet
    /// * `txid` - The transaction carrying it, which names fresh assets
    ///
    /// # Returns
    /// The resolution tables, or the first reference that cannot be resolved
    pub fn resolve<'a>(
        &self,
        packet: &'a Packet,
        txid: Txid,
    ) -> Result<ResolvedPacket<'a>, ResolveError> {
        let group_count = packet.group_count();

        // Pass 1: every group's own identity, so forward references work
        let mut group_ids = Vec::with_capacity(group_count);
        for (index, group) in packet.groups.iter().enumerate() {
            let index =
                u16::try_from(index).map_err(|_| ResolveError::TooManyGroups(group_count))?;
            group_ids.push(group.asset_id.unwrap_or(AssetId::new(txid, index)));
        }

        // Pass 2: control asset references
        let mut controls = Vec::with_capacity(group_count);
        for (index, group) in packet.groups.iter().enumerate() {
            let group_index = index as u16;
            let control = match group.control_asset {
                None => None,
                Some(AssetRef::ById(id)) => Some(id),
                Some(AssetRef::ByGroup(target)) => match group_ids.get(target as usize) {
                    Some(id) => Some(*id),
                    None => {
                        return Err(ResolveError::OutOfRangeGroupIndex {
                            group: group_index,
                            target,
                            group_count,
                        })
                    }
                },
            };

            if control == Some(group_ids[index]) {
                return Err(ResolveError::SelfControlReference {
                    group: group_index,
                    asset: group_ids[index],
                });
            }
            controls.push(control);
        }

        Ok(ResolvedPacket {
            packet,
            txid,
            group_ids,
            controls,
        })
    }
}
