use thiserror::Error;

use crate::engine::EngineError;

/// Failures the bridge absorbs and logs. None of them stop the relay.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The streaming sound or its channel could not be created. Retried on
    /// the next speech onset.
    #[error("failed to create playback resources: {0}")]
    ResourceCreationFailed(EngineError),
    /// Locking or unlocking the engine's ring failed. The cycle's write is
    /// dropped.
    #[error("failed to lock/unlock the playback ring: {0}")]
    LockUnlockFailed(EngineError),
    /// Reading the cursor or setting the frequency of a live channel failed.
    #[error("failed to control the playback channel: {0}")]
    ChannelControlFailed(EngineError),
    #[error("the bridge has been torn down")]
    Destroyed,
}
