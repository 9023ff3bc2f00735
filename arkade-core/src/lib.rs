pub mod codec;
pub mod config;
pub mod error;
pub mod id;
pub mod packet;
pub mod record;
pub mod state;
pub mod teleport;

// Re-export the main types for convenience
pub use codec::{decode_packet, encode_packet, CodecLimits, PacketCodec};
pub use config::{MalformedPacketPolicy, ValidatorConfig};
pub use error::{DecodeError, ResolveError, StorageError, TeleportError, ValidationError};
pub use id::{AssetId, OutPoint, Txid};
pub use packet::{AssetInput, AssetOutput, AssetRef, Commitment, Group, Metadata, Packet};
pub use state::{AssetDefinition, AssetRecord, AssetState};
pub use teleport::{ClaimPriority, ClaimStatus, PendingTeleport, TeleportLedger, TeleportOrigin};
