//! System configuration: table capacities, allocation policy constants and
//! per-UE logical channel setup.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

mod channel;
pub use channel::*;

/// Default number of UEs the system reserves room for.
pub const DEFAULT_MAX_UES: usize = 1024;
/// Default number of queued MAC CEs reserved across all UEs.
pub const DEFAULT_MAX_PENDING_CES: usize = 4096;
/// Default number of GBR channels/groups with throughput tracking.
pub const DEFAULT_MAX_QOS_CHANNELS: usize = 2048;
/// Leftover budget below this many bytes is folded into the SDU being
/// allocated rather than left for a tiny extra subPDU.
pub const DEFAULT_LEFTOVER_FOLD_THRESHOLD: u32 = 5;
/// Bytes added back to a partially drained channel to cover the RLC header
/// of the next segment.
pub const DEFAULT_RLC_SEGMENTATION_OVERHEAD: u32 = 4;
/// Default cap on queued MAC CEs per UE (ConRes not included).
pub const DEFAULT_MAX_CES_PER_UE: usize = 16;
/// UL bytes assumed pending for a UE that sent an SR but no BSR.
pub const DEFAULT_SR_GRANT_BYTES: u32 = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub max_ues: usize,
    pub max_pending_ces: usize,
    pub max_qos_channels: usize,
    pub policy: AllocationPolicy,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            max_ues: DEFAULT_MAX_UES,
            max_pending_ces: DEFAULT_MAX_PENDING_CES,
            max_qos_channels: DEFAULT_MAX_QOS_CHANNELS,
            policy: AllocationPolicy::default(),
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ues == 0 {
            return Err(ConfigError::ZeroCapacity("max_ues"));
        }
        if self.policy.max_ces_per_ue == 0 {
            return Err(ConfigError::ZeroCapacity("policy.max_ces_per_ue"));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Tunables of the subPDU allocation algorithms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub leftover_fold_threshold: u32,
    pub rlc_segmentation_overhead: u32,
    pub max_ces_per_ue: usize,
    pub sr_grant_bytes: u32,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        AllocationPolicy {
            leftover_fold_threshold: DEFAULT_LEFTOVER_FOLD_THRESHOLD,
            rlc_segmentation_overhead: DEFAULT_RLC_SEGMENTATION_OVERHEAD,
            max_ces_per_ue: DEFAULT_MAX_CES_PER_UE,
            sr_grant_bytes: DEFAULT_SR_GRANT_BYTES,
        }
    }
}

/// Installs the global tracing subscriber. Only the first call has an effect.
pub fn set_logger(level: Option<tracing::level_filters::LevelFilter>) {
    #[cfg(feature = "trace")]
    {
        static LOGGER_SET: std::sync::atomic::AtomicBool =
            std::sync::atomic::AtomicBool::new(false);
        if LOGGER_SET
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::Release,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        tracer::init_tracer(level).expect("failed tracing initialization")
    }
    #[cfg(not(feature = "trace"))]
    {
        let _ = level;
    }
}

#[cfg(feature = "trace")]
mod tracer {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, Layer, Registry};

    pub fn init_tracer(level: Option<LevelFilter>) -> anyhow::Result<()> {
        let default_filter = if cfg!(any(test, debug_assertions)) {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let default_filter = level.unwrap_or(default_filter);
        let filter_layer = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(default_filter.into())
            .from_env_lossy();

        let to_stderr = std::env::var("LCSIM_LOG_TO_STDERR").is_ok();
        let fmt_layer = tracing_subscriber::fmt::layer().with_level(true);
        let fmt_layer = if cfg!(any(test, debug_assertions)) {
            fmt_layer.with_file(true).with_line_number(true)
        } else {
            fmt_layer
        };
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if to_stderr {
            fmt_layer.with_writer(std::io::stderr).boxed()
        } else {
            fmt_layer.boxed()
        };

        let subscriber = Registry::default().with(fmt_layer).with(filter_layer);
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = SystemConfig::from_toml_str("").unwrap();
        assert_eq!(config, SystemConfig::default());
        assert_eq!(config.policy.leftover_fold_threshold, 5);
        assert_eq!(config.policy.rlc_segmentation_overhead, 4);
    }

    #[test]
    fn test_partial_policy_override() {
        let config = SystemConfig::from_toml_str(
            r#"
            max_ues = 16

            [policy]
            rlc_segmentation_overhead = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.max_ues, 16);
        assert_eq!(config.policy.rlc_segmentation_overhead, 3);
        assert_eq!(
            config.policy.leftover_fold_threshold,
            DEFAULT_LEFTOVER_FOLD_THRESHOLD
        );
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = SystemConfig::from_toml_str("max_ues = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity("max_ues")));
    }

    #[test]
    fn test_missing_file() {
        let err = SystemConfig::load_from_file("/nonexistent/lcsim.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
