use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::MySqlPool;

use super::{TimeSettings, TimeSettingsProvider};
use crate::config::parse_hh_mm;
use crate::engine::error::EngineResult;
use crate::store::mysql::map_sqlx_error;

const CACHE_KEY: &str = "time_settings";

/// Fixed window, for tests and single-site deployments.
#[derive(Debug, Clone, Copy)]
pub struct StaticTimeSettings(pub TimeSettings);

#[async_trait]
impl TimeSettingsProvider for StaticTimeSettings {
    async fn current(&self) -> EngineResult<TimeSettings> {
        Ok(self.0)
    }
}

/// Reads `max_clock_in`/`min_clock_out` from the settings table and keeps
/// the result for a short TTL so every check-in does not hit the database.
#[derive(Clone)]
pub struct CachedTimeSettings {
    pool: MySqlPool,
    defaults: TimeSettings,
    cache: Cache<&'static str, TimeSettings>,
}

impl CachedTimeSettings {
    pub fn new(pool: MySqlPool, defaults: TimeSettings, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self {
            pool,
            defaults,
            cache,
        }
    }

    async fn load(&self) -> EngineResult<TimeSettings> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT name, value FROM settings WHERE name IN ('max_clock_in', 'min_clock_out')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(merge_settings(self.defaults, &rows))
    }
}

/// Overlays stored values on the defaults, skipping unparsable ones.
fn merge_settings(defaults: TimeSettings, rows: &[(String, String)]) -> TimeSettings {
    let mut settings = defaults;
    for (name, value) in rows {
        let Ok(time) = parse_hh_mm(value) else {
            tracing::warn!(setting = %name, value = %value, "Ignoring malformed time setting");
            continue;
        };
        match name.as_str() {
            "max_clock_in" => settings.max_clock_in = time,
            "min_clock_out" => settings.min_clock_out = time,
            _ => {}
        }
    }
    settings
}

#[async_trait]
impl TimeSettingsProvider for CachedTimeSettings {
    async fn current(&self) -> EngineResult<TimeSettings> {
        if let Some(settings) = self.cache.get(CACHE_KEY).await {
            return Ok(settings);
        }
        let settings = self.load().await?;
        self.cache.insert(CACHE_KEY, settings).await;
        Ok(settings)
    }
}
