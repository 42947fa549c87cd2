use anyhow::Result;

use crate::infra::config::AppConfig;

/// Source of the engine's configuration, owned by the host application.
pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig>;
}
