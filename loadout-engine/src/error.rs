//! Error types for the engine and the remote API.

use loadout_types::{BucketHash, CharacterId, ItemInstanceId, StoreId};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for raw remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Domain error codes reported by the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorCode {
    ItemNotFound,
    NoRoomInDestination,
    /// Equipping is not allowed where the character currently is.
    CannotPerformActionAtThisLocation,
    ItemAlreadyEquipped,
    UniqueEquipRestricted,
    ItemNotTransferrable,
    Other(i32),
}

impl PlatformErrorCode {
    /// Maps a numeric platform code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1623 => Self::ItemNotFound,
            1634 => Self::ItemAlreadyEquipped,
            1641 => Self::UniqueEquipRestricted,
            1642 => Self::NoRoomInDestination,
            1671 => Self::CannotPerformActionAtThisLocation,
            other => Self::Other(other),
        }
    }

    /// Maps the `ErrorStatus` name carried in response envelopes.
    pub fn from_status(status: &str, code: i32) -> Self {
        match status {
            "DestinyItemNotFound" => Self::ItemNotFound,
            "DestinyNoRoomInDestination" => Self::NoRoomInDestination,
            "DestinyCannotPerformActionAtThisLocation" => Self::CannotPerformActionAtThisLocation,
            "DestinyItemAlreadyEquipped" => Self::ItemAlreadyEquipped,
            "DestinyItemUniqueEquipRestricted" => Self::UniqueEquipRestricted,
            "DestinyItemNotTransferrable" => Self::ItemNotTransferrable,
            _ => Self::from_code(code),
        }
    }
}

/// How the engine should react to a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bounded retry with backoff.
    Retryable,
    /// May have been applied; re-fetch and compare before retrying.
    Ambiguous,
    /// Report immediately.
    Terminal,
    /// The requested state already holds.
    AlreadyApplied,
}

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("HTTP {status}: {message}")]
    Transport { status: u16, message: String },

    #[error("platform error {code:?}: {message}")]
    Domain {
        code: PlatformErrorCode,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn transport(status: u16) -> Self {
        Self::Transport {
            status,
            message: String::new(),
        }
    }

    pub fn domain(code: PlatformErrorCode) -> Self {
        Self::Domain {
            code,
            message: String::new(),
        }
    }

    /// Returns the platform code for domain errors.
    pub fn code(&self) -> Option<PlatformErrorCode> {
        match self {
            RemoteError::Domain { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classifies this failure.
    pub fn classify(&self) -> ErrorClass {
        match self {
            RemoteError::Transport { status, .. } if (500..600).contains(status) => {
                ErrorClass::Ambiguous
            }
            RemoteError::Transport { status: 429, .. } => ErrorClass::Retryable,
            RemoteError::Transport { .. } => ErrorClass::Terminal,
            // The request may or may not have reached the server.
            RemoteError::Network(_) => ErrorClass::Ambiguous,
            RemoteError::Malformed(_) => ErrorClass::Terminal,
            RemoteError::Domain { code, .. } => match code {
                PlatformErrorCode::ItemNotFound => ErrorClass::Retryable,
                PlatformErrorCode::ItemAlreadyEquipped => ErrorClass::AlreadyApplied,
                _ => ErrorClass::Terminal,
            },
        }
    }
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The item is not in the local inventory.
    #[error("item {0} not found")]
    ItemNotFound(ItemInstanceId),

    /// The item can never change store.
    #[error("item {0} cannot be transferred")]
    NotTransferable(ItemInstanceId),

    /// The item must be on the character for this operation.
    #[error("item {item} is not on character {character}")]
    NotOnCharacter {
        item: ItemInstanceId,
        character: CharacterId,
    },

    /// Equipped items must be dequipped before they can be transferred.
    #[error("item {0} is equipped and cannot be transferred")]
    StillEquipped(ItemInstanceId),

    /// The character is not part of the profile.
    #[error("unknown character {0}")]
    UnknownCharacter(CharacterId),

    /// The remote has no direct route for this transfer.
    #[error("cannot transfer directly from {from} to {to}")]
    InvalidRoute { from: StoreId, to: StoreId },

    /// No room could be made in the destination.
    #[error("no space in bucket {bucket} of {store}")]
    NoSpace { store: StoreId, bucket: BucketHash },

    /// Move-aside planning exceeded its depth bound.
    #[error("gave up making space for item {item} after {depth} relocations")]
    MoveAsideLimit { item: ItemInstanceId, depth: usize },

    /// An exclusivity conflict has no legal replacement.
    #[error("cannot equip {item}: {conflicting} conflicts and has no replacement")]
    ExclusivityUnresolved {
        item: ItemInstanceId,
        conflicting: ItemInstanceId,
    },

    /// An equipped item has nothing to be replaced with.
    #[error("no replacement available to dequip item {0}")]
    NoReplacement(ItemInstanceId),

    /// The remote refused because of where the character is.
    #[error("action not allowed at the character's current location")]
    RestrictedLocation,

    /// The remote reported the destination full.
    #[error("destination has no room")]
    DestinationFull,

    /// The remote failed after all retries.
    #[error("remote call failed after {attempts} attempts: {source}")]
    RemoteFailed {
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// A non-retryable remote failure.
    #[error("remote rejected call: {0}")]
    Remote(#[source] RemoteError),

    /// The remote state after an ambiguous failure did not match intent.
    #[error("remote state does not reflect the intended change for item {0}")]
    GhostMismatch(ItemInstanceId),

    /// The item was not equipped after the move finished.
    #[error("item {0} did not end up equipped")]
    NotEquipped(ItemInstanceId),

    /// The item has no socket at this index.
    #[error("item {item} has no socket {socket_index}")]
    InvalidSocket { item: ItemInstanceId, socket_index: u32 },

    /// The workflow was cancelled between phases.
    #[error("operation cancelled")]
    Cancelled,

    /// Another loadout application holds the queue.
    #[error("a loadout is already being applied")]
    WorkflowBusy,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Maps a terminal remote failure to the engine error a caller can act on.
    pub fn from_terminal(error: RemoteError) -> Self {
        match error.code() {
            Some(PlatformErrorCode::CannotPerformActionAtThisLocation) => {
                EngineError::RestrictedLocation
            }
            Some(PlatformErrorCode::NoRoomInDestination) => EngineError::DestinationFull,
            _ => EngineError::Remote(error),
        }
    }

    /// True when the remote refused because of the character's location.
    pub fn is_restricted_location(&self) -> bool {
        matches!(self, EngineError::RestrictedLocation)
    }
}
