//! Auth header injection seam.
//!
//! Request signing lives with the exchange REST client, outside this
//! workspace. The listener only needs fresh headers per connection
//! attempt, so it takes them through this trait.

use crate::error::FeedResult;

/// Produces the authentication headers for one WebSocket handshake.
///
/// Implementations sign the current timestamp; headers are therefore
/// requested anew for every attempt, never cached across reconnects.
pub trait StreamAuth: Send + Sync {
    fn headers(&self) -> FeedResult<Vec<(String, String)>>;
}

/// No-op auth for public endpoints and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl StreamAuth for NoAuth {
    fn headers(&self) -> FeedResult<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}
