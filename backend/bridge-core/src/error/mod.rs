pub mod cache;
pub mod channel;
pub mod protocol;
pub mod supervisor;
pub mod trust;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Trust(#[from] trust::TrustError),

    #[error(transparent)]
    Channel(#[from] channel::ChannelError),

    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),

    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    #[error(transparent)]
    Cache(#[from] cache::CacheError),
}
