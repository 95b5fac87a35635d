//! MCP transports
//!
//! Two ways to reach a tool server behind one send/receive surface:
//! - `StdioTransport`: local subprocess, newline-delimited JSON over stdio
//! - `WsTransport`: remote server over a persistent WebSocket stream
//!
//! The client above never branches on which one it holds.

use anyhow::{anyhow, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport to an MCP server.
pub enum McpTransport {
    Stdio(StdioTransport),
    WebSocket(WsTransport),
}

impl McpTransport {
    /// Send a JSON-RPC message
    pub async fn send(&self, message: &str) -> Result<()> {
        match self {
            McpTransport::Stdio(t) => t.send(message).await,
            McpTransport::WebSocket(t) => t.send(message).await,
        }
    }

    /// Receive the next JSON-RPC message
    pub async fn receive(&self) -> Result<String> {
        match self {
            McpTransport::Stdio(t) => t.receive().await,
            McpTransport::WebSocket(t) => t.receive().await,
        }
    }

    /// Check if the connection is still usable
    pub async fn is_alive(&self) -> bool {
        match self {
            McpTransport::Stdio(t) => t.is_alive().await,
            McpTransport::WebSocket(t) => t.is_alive(),
        }
    }
}

/// Stdio transport for local MCP servers. Newline-delimited JSON: each
/// message is a JSON object followed by a newline.
pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Child>,
}

impl StdioTransport {
    /// Spawn an MCP server process
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<Self> {
        tracing::info!("Spawning MCP server: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(working_dir)
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow!(
                    "Command not found: {}. Is it installed and in PATH?",
                    command
                )
            } else {
                anyhow!("Failed to spawn {}: {}", command, e)
            }
        })?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("No stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;

        Ok(Self {
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(child),
        })
    }

    /// Send a JSON-RPC message (newline-delimited JSON)
    pub async fn send(&self, message: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(message.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        tracing::debug!("Sent: {}", message);
        Ok(())
    }

    /// Receive a JSON-RPC message (newline-delimited JSON)
    pub async fn receive(&self) -> Result<String> {
        let mut stdout = self.stdout.lock().await;

        loop {
            let mut line = String::new();
            let bytes = stdout.read_line(&mut line).await?;

            if bytes == 0 {
                // EOF - check if process died
                let mut child = self.child.lock().await;
                match child.try_wait() {
                    Ok(Some(status)) => {
                        return Err(anyhow!("MCP server exited with {}", status));
                    }
                    Ok(None) => {
                        return Err(anyhow!("MCP server closed stdout unexpectedly"));
                    }
                    Err(e) => {
                        return Err(anyhow!("Error checking MCP server status: {}", e));
                    }
                }
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Skip non-JSON lines (could be debug output from server)
            if line.starts_with('{') {
                tracing::debug!("Received: {}", line);
                return Ok(line.to_string());
            }
            tracing::debug!("Skipping non-JSON line: {}", line);
        }
    }

    /// Check if process is still running
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }
}

/// WebSocket transport for remote MCP servers. One persistent stream per
/// connection; each text frame carries one JSON-RPC message.
pub struct WsTransport {
    write: Mutex<SplitSink<WsStream, Message>>,
    read: Mutex<SplitStream<WsStream>>,
    connected: AtomicBool,
}

impl WsTransport {
    /// Connect to a remote MCP server
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!("Connecting to remote MCP server: {}", url);

        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| anyhow!("Failed to connect to {}: {}", url, e))?;
        let (write, read) = stream.split();

        Ok(Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
            connected: AtomicBool::new(true),
        })
    }

    /// Send a JSON-RPC message as one text frame
    pub async fn send(&self, message: &str) -> Result<()> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| {
                self.connected.store(false, Ordering::SeqCst);
                anyhow!("WebSocket send failed: {}", e)
            })?;
        tracing::debug!("Sent: {}", message);
        Ok(())
    }

    /// Receive the next JSON-RPC message
    pub async fn receive(&self) -> Result<String> {
        let mut read = self.read.lock().await;

        loop {
            let Some(message) = read.next().await else {
                self.connected.store(false, Ordering::SeqCst);
                return Err(anyhow!("WebSocket stream ended"));
            };

            match message {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received: {}", text);
                    return Ok(text);
                }
                Ok(Message::Binary(bytes)) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                Ok(Message::Close(_)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(anyhow!("MCP server closed the connection"));
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(anyhow!("WebSocket receive failed: {}", e));
                }
            }
        }
    }

    /// Check if the connection is still usable
    pub fn is_alive(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
