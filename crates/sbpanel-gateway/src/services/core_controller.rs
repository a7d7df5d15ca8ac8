//! Proxy core lifecycle
//!
//! The gateway never speaks the proxy protocols itself; it renders a
//! configuration, hands it to a [`CoreController`] and asks for restarts.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Runtime state of the proxy core
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CoreStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Unix seconds of the last successful start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

/// Proxy engine boundary
#[async_trait]
pub trait CoreController: Send + Sync {
    /// Apply `config` and (re)start the engine
    async fn restart(&self, config: &Value) -> Result<()>;

    async fn status(&self) -> CoreStatus;

    /// Generate key material; `kind` is one of reality, wireguard, tls, ech
    async fn keypairs(&self, kind: &str, option: &str) -> Result<Vec<String>>;
}

/// Runs the core binary as a child process
pub struct CommandCoreController {
    binary: PathBuf,
    config_path: PathBuf,
    child: Mutex<Option<(Child, i64)>>,
}

impl CommandCoreController {
    pub fn new(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
            child: Mutex::new(None),
        }
    }

    fn generate_args(kind: &str, option: &str) -> Result<Vec<String>> {
        let mut args = vec!["generate".to_string()];
        match kind {
            "reality" => args.push("reality-keypair".to_string()),
            "wireguard" => args.push("wg-keypair".to_string()),
            "tls" | "ech" => {
                if option.trim().is_empty() {
                    bail!("{} key pair needs a server name", kind);
                }
                args.push(format!("{}-keypair", kind));
                args.push(option.trim().to_string());
            }
            other => bail!("unknown key pair kind: {}", other),
        }
        Ok(args)
    }
}

#[async_trait]
impl CoreController for CommandCoreController {
    async fn restart(&self, config: &Value) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.config_path, serde_json::to_vec_pretty(config)?)
            .await
            .with_context(|| format!("Failed to write core config {:?}", self.config_path))?;

        let mut guard = self.child.lock().await;
        if let Some((mut previous, _)) = guard.take() {
            if let Err(e) = previous.kill().await {
                warn!("[Core] Failed to stop previous core process: {}", e);
            }
        }

        let child = Command::new(&self.binary)
            .arg("run")
            .arg("-c")
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start core binary {:?}", self.binary))?;

        info!("[Core] Started core process (pid {:?})", child.id());
        *guard = Some((child, chrono::Utc::now().timestamp()));
        Ok(())
    }

    async fn status(&self) -> CoreStatus {
        let mut guard = self.child.lock().await;
        let Some((child, started_at)) = guard.as_mut() else {
            return CoreStatus::default();
        };

        match child.try_wait() {
            Ok(None) => CoreStatus {
                running: true,
                pid: child.id(),
                started_at: Some(*started_at),
            },
            Ok(Some(exit)) => {
                warn!("[Core] Core process exited: {}", exit);
                *guard = None;
                CoreStatus::default()
            }
            Err(e) => {
                warn!("[Core] Failed to poll core process: {}", e);
                CoreStatus::default()
            }
        }
    }

    async fn keypairs(&self, kind: &str, option: &str) -> Result<Vec<String>> {
        let args = Self::generate_args(kind, option)?;
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.binary))?;

        if !output.status.success() {
            bail!(
                "key generation failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}
