use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceConfig;

/// Configuration for the messenger module (`modules.messenger` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    /// Root of the avatar store. Relative paths resolve against the home dir.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    #[serde(default = "default_avatar_prefix")]
    pub avatar_prefix: String,
    #[serde(default = "default_max_link_length")]
    pub max_link_length: usize,
    #[serde(default = "default_max_username_length")]
    pub max_username_length: usize,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            avatar_prefix: default_avatar_prefix(),
            max_link_length: default_max_link_length(),
            max_username_length: default_max_username_length(),
        }
    }
}

impl MessengerConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            avatar_prefix: self.avatar_prefix.clone(),
            max_link_length: self.max_link_length,
            max_username_length: self.max_username_length,
        }
    }
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_avatar_prefix() -> String {
    "profiles".to_string()
}

fn default_max_link_length() -> usize {
    200
}

fn default_max_username_length() -> usize {
    150
}
