//! Connection provider abstraction.

use async_trait::async_trait;

use crate::error::DomainError;

/// Yields ready-to-use, exclusively owned connections.
///
/// The returned handle is released when dropped, so a caller that holds it in
/// a local binding releases it on every exit path.
#[async_trait]
pub trait DataContext: Send + Sync {
    /// The connection handle type.
    type Connection: Send;

    /// Opens (or checks out) a connection.
    async fn open(&self) -> Result<Self::Connection, DomainError>;
}
