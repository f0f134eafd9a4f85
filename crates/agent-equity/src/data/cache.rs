//! Per-run snapshot files of collected market data

use crate::data::model::StockContext;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each collected [`StockContext`] to a dated file
///
/// Snapshots are audit artifacts. Nothing reads them back during a run.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot for `ctx`: `{dir}/{symbol}_{YYYYMMDD}.json`
    pub fn path_for(&self, ctx: &StockContext) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.json",
            ctx.symbol,
            ctx.fetched_at.format("%Y%m%d")
        ))
    }

    /// Write `ctx` as pretty JSON, replacing any snapshot from the same day
    pub async fn save(&self, ctx: &StockContext) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(ctx);
        let body = serde_json::to_vec_pretty(ctx)?;
        tokio::fs::write(&path, body).await?;
        info!(path = %path.display(), "Market data snapshot saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::session::china_offset;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_save_writes_dated_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache"));
        let fetched_at = china_offset()
            .with_ymd_and_hms(2024, 3, 4, 10, 0, 0)
            .unwrap();
        let ctx = StockContext::new("600519.SH", fetched_at);

        let path = cache.save(&ctx).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "600519.SH_20240304.json");

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let back: StockContext = serde_json::from_str(&body).unwrap();
        assert_eq!(back, ctx);
    }
}
