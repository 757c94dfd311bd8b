use std::env;
use std::str::FromStr;

use crate::signals::config::PipelineConfig;
use crate::signals::ConfigurationError;

/// Process-level settings for the replay binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    /// 帧通道容量，生产者超前时背压
    pub frame_channel_capacity: usize,
    /// 仅输出会话汇总，不逐帧输出结果
    pub summary_only: bool,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Ok(Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            frame_channel_capacity: env_or_parse("FRAME_CHANNEL_CAPACITY", 256_usize).max(1),
            summary_only: env_or_bool("SUMMARY_ONLY", false),
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// 未设置时返回默认值；已设置但无法解析时报错
pub fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigurationError>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigurationError::new(key, format!("cannot parse {:?}", raw.trim()))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ConfigurationError::new(key, "value is not valid unicode"))
        }
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
