mod http;

pub use http::HttpTransport;

use anyhow::Result;
use futures_util::future::BoxFuture;

/// The side channel a beacon URL is loaded through.
///
/// The returned future resolves `Ok` once the collector confirmed the load
/// and `Err` when the load failed. Dropping it abandons the transfer.
pub trait Transport: Send + Sync {
    fn load(&self, src: String) -> BoxFuture<'static, Result<()>>;
}
