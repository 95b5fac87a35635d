//! MCP manager - connection lifecycle over all configured servers
//!
//! Connections are acquired on first use and torn down together at session
//! teardown. Tool calls route by server name; a call against a configured but
//! not-yet-connected server triggers the connect + handshake transparently.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::client::McpClient;
use super::config::{McpConfig, McpServerConfig};
use super::protocol::{McpToolDef, McpToolResult};

/// MCP Manager
pub struct McpManager {
    /// Connected clients
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    /// Server configurations
    configs: RwLock<HashMap<String, McpServerConfig>>,
    /// Working directory for spawned servers
    working_dir: PathBuf,
}

impl McpManager {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            working_dir,
        }
    }

    /// Load configuration from .mcp.json
    pub async fn load_config(&self) -> Result<()> {
        let config = McpConfig::load(&self.working_dir).await?;
        let servers = config.servers();

        info!("Loaded MCP config: {} servers", servers.len());
        *self.configs.write().await = servers;

        Ok(())
    }

    /// Add a server configuration directly
    pub async fn add_server(&self, name: &str, config: McpServerConfig) {
        self.configs.write().await.insert(name.to_string(), config);
    }

    /// Get a connected client, connecting on first use.
    pub async fn ensure_connected(&self, name: &str) -> Result<Arc<McpClient>> {
        if let Some(client) = self.clients.read().await.get(name) {
            if client.is_alive().await {
                return Ok(client.clone());
            }
        }

        let config = {
            let configs = self.configs.read().await;
            configs
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Unknown MCP server: {}", name))?
        };

        // Drop any dead client before reconnecting
        self.clients.write().await.remove(name);

        let client = McpClient::connect(name, &config, &self.working_dir).await?;
        client.initialize().await?;
        client.list_tools().await?;

        let client = Arc::new(client);
        self.clients
            .write()
            .await
            .insert(name.to_string(), client.clone());

        info!("Connected to MCP server: {}", name);
        Ok(client)
    }

    /// Discover tools from every configured server, connecting as needed.
    ///
    /// Servers that fail to connect are skipped with a warning; discovery of
    /// one server never poisons the rest.
    pub async fn discover_all(&self) -> Vec<(String, McpToolDef)> {
        let names: Vec<String> = self.configs.read().await.keys().cloned().collect();
        let mut tools = Vec::new();

        for name in names {
            match self.ensure_connected(&name).await {
                Ok(client) => {
                    for tool in client.get_tools().await {
                        tools.push((name.clone(), tool));
                    }
                }
                Err(e) => {
                    warn!("Failed to connect to MCP server {}: {:?}", name, e);
                }
            }
        }

        tools
    }

    /// Call a tool on a server, connecting on first use.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<McpToolResult> {
        let client = self.ensure_connected(server).await?;
        client.call_tool(tool, arguments).await
    }

    /// Disconnect from a server
    pub async fn disconnect(&self, name: &str) {
        if self.clients.write().await.remove(name).is_some() {
            info!("Disconnected from MCP server: {}", name);
        }
    }

    /// Disconnect from every server (session teardown).
    pub async fn disconnect_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        if count > 0 {
            info!("Disconnected from {} MCP servers", count);
        }
    }

    /// Check if any servers are configured
    pub async fn has_servers(&self) -> bool {
        !self.configs.read().await.is_empty()
    }
}
