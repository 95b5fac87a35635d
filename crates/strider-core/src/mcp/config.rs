//! MCP configuration parsing
//!
//! Parses `.mcp.json` files. Two server types:
//! - Stdio: spawns a local process, we act as MCP client over stdin/stdout
//! - Remote: persistent WebSocket stream to a hosted server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// MCP configuration from .mcp.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// Local server (spawns process, stdio transport)
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Remote server (persistent WebSocket stream)
    Remote { url: String },
}

impl McpServerConfig {
    pub fn is_stdio(&self) -> bool {
        matches!(self, McpServerConfig::Stdio { .. })
    }

    pub fn transport_type(&self) -> &'static str {
        match self {
            McpServerConfig::Stdio { .. } => "stdio",
            McpServerConfig::Remote { .. } => "websocket",
        }
    }
}

impl McpConfig {
    /// Load config from .mcp.json in the working directory
    pub async fn load(working_dir: &Path) -> Result<Self> {
        let config_path = working_dir.join(".mcp.json");

        if !config_path.exists() {
            tracing::debug!("No .mcp.json found at {:?}", config_path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read {:?}", config_path))?;

        let config: McpConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", config_path))?;

        tracing::info!(
            "Loaded MCP config with {} servers from {:?}",
            config.mcp_servers.len(),
            config_path
        );

        Ok(config)
    }

    /// Server configurations with `${VAR}` env references expanded.
    pub fn servers(&self) -> HashMap<String, McpServerConfig> {
        let mut result = HashMap::new();
        for (name, raw) in &self.mcp_servers {
            let config = match raw {
                McpServerConfig::Stdio { command, args, env } => {
                    let expanded_env = env
                        .iter()
                        .map(|(k, v)| (k.clone(), expand_env_var(v)))
                        .collect();
                    McpServerConfig::Stdio {
                        command: command.clone(),
                        args: args.clone(),
                        env: expanded_env,
                    }
                }
                McpServerConfig::Remote { url } => McpServerConfig::Remote {
                    url: expand_env_var(url),
                },
            };
            result.insert(name.clone(), config);
        }
        result
    }
}

/// Expand `${VAR}` environment variable references. Unknown variables expand
/// to the empty string.
fn expand_env_var(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end_offset) = result[start..].find('}') {
            let end = start + end_offset;
            let var_name = &result[start + 2..end];
            let value = std::env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!("Environment variable '{}' not set", var_name);
                String::new()
            });
            result.replace_range(start..end + 1, &value);
        } else {
            break;
        }
    }

    result
}
