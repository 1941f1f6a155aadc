pub mod filters;
pub mod finviz;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use filters::FilterSet;
use types::RowSet;

#[async_trait]
pub trait ScreenerSource: Send + Sync {
    async fn fetch(&self, filters: &FilterSet) -> Result<RowSet>;
}
