//! Asset fetcher trait used to stage remote inputs.

use std::path::Path;

use async_trait::async_trait;

use crate::result::AppResult;

/// Downloads a remote asset to a local file.
#[async_trait]
pub trait AssetFetcher: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch `url` into `dest`, returning the number of bytes written.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> AppResult<u64>;
}
