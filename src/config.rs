use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::service::types::RoleType;

/// Top-level configuration for the demo binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub entry: EntryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    5000
}

/// Direct invocation arguments for the feed entry point, as configured.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EntryConfig {
    pub program_id: Option<String>,
    #[serde(rename = "type")]
    pub role_type: Option<u8>,
    pub show_header: Option<bool>,
    pub organizer: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }
}

impl EntryConfig {
    pub fn to_direct_args(&self) -> DirectArgs {
        DirectArgs {
            program_id: self.program_id.clone(),
            role: self.role_type.and_then(RoleType::from_wire),
            show_header: self.show_header,
            organizer: self.organizer,
        }
    }
}

/// Direct invocation arguments. Each field, when present, takes precedence
/// over the routing-context parameter of the same meaning.
#[derive(Debug, Clone, Default)]
pub struct DirectArgs {
    pub program_id: Option<String>,
    pub role: Option<RoleType>,
    pub show_header: Option<bool>,
    pub organizer: Option<bool>,
}

/// Routing-context parameters, all string-valued as a router delivers them.
#[derive(Debug, Clone, Default)]
pub struct RouteParams(HashMap<String, String>);

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Fully-resolved feed entry parameters, assembled once at entry with the
/// precedence: direct argument, else route parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedParams {
    pub program_id: String,
    pub role: Option<RoleType>,
    pub show_header: bool,
    pub organizer: bool,
}

impl FeedParams {
    pub fn resolve(direct: &DirectArgs, route: &RouteParams) -> Result<Self> {
        let program_id = direct
            .program_id
            .clone()
            .or_else(|| route.get("programId").map(str::to_string))
            .context("programId missing from both arguments and route")?;
        let role = direct.role.or_else(|| {
            route
                .get("type")
                .and_then(|raw| raw.parse::<u8>().ok())
                .and_then(RoleType::from_wire)
        });
        let show_header = direct
            .show_header
            .or_else(|| route.get("showHeader").map(|raw| raw == "true"))
            .unwrap_or(false);
        let organizer = direct
            .organizer
            .or_else(|| route.get("organizer").and_then(|raw| raw.parse().ok()))
            .unwrap_or(false);
        Ok(Self {
            program_id,
            role,
            show_header,
            organizer,
        })
    }
}
