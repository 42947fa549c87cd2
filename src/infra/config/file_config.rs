use serde::Deserialize;

use crate::infra::config::{ApiConfig, AppConfig, LogConfig, RealtimeConfig};

/// Optional-field mirror of [`AppConfig`] as read from disk; present
/// values are merged over the defaults.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub api: Option<FileApiConfig>,
    pub realtime: Option<FileRealtimeConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(api) = self.api {
            api.merge_into(&mut config.api);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileApiConfig {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl FileApiConfig {
    fn merge_into(self, config: &mut ApiConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub url: Option<String>,
    pub handshake_timeout_ms: Option<u64>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(url) = self.url {
            config.url = url;
        }

        if let Some(timeout_ms) = self.handshake_timeout_ms {
            config.handshake_timeout_ms = timeout_ms;
        }
    }
}
