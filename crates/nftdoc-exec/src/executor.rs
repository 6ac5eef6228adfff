use crate::error::ExecError;
use crate::settings::Settings;
use nftdoc::Config;
use std::future::Future;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Something that applies nftables JSON documents to a live system and
/// lists them back. Payloads are passed through untouched; nothing here
/// retries.
pub trait Executor {
    /// `nft list <filters>`, or the whole ruleset when `filters` is empty.
    /// The reply starts with a metainfo entry.
    fn read_config(
        &self,
        filters: &[&str],
    ) -> impl Future<Output = Result<Vec<u8>, ExecError>> + Send;

    fn apply_config(&self, payload: &[u8]) -> impl Future<Output = Result<(), ExecError>> + Send;

    /// Applies and returns what the kernel accepted, handles included.
    fn apply_config_echo(
        &self,
        payload: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ExecError>> + Send;
}

/// Runs the `nft` binary in JSON mode.
#[derive(Debug, Clone, Default)]
pub struct NftCommand {
    settings: Settings,
}

impl NftCommand {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn run(&self, args: &[&str], input: Option<&[u8]>) -> Result<Vec<u8>, ExecError> {
        let binary = &self.settings.binary;
        debug!(%binary, ?args, "running nft");

        let mut child = Command::new(binary)
            .args(&self.settings.extra_args)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let exchange = async move {
            if let (Some(payload), Some(mut stdin)) = (input, stdin) {
                match stdin.write_all(payload).await {
                    // exited before reading everything; its stderr says why
                    Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
                    other => other?,
                }
                drop(stdin);
            }
            let output = child.wait_with_output().await?;
            Ok::<_, std::io::Error>(output)
        };

        let timeout = self.settings.timeout();
        let output = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ExecError::Timeout(timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code();
            warn!(?code, %stderr, "nft command failed");
            return Err(ExecError::Failed { stderr, code });
        }

        Ok(output.stdout)
    }
}

impl Executor for NftCommand {
    async fn read_config(&self, filters: &[&str]) -> Result<Vec<u8>, ExecError> {
        let mut args = vec!["-j", "list"];
        if filters.is_empty() {
            args.push("ruleset");
        } else {
            args.extend_from_slice(filters);
        }
        self.run(&args, None).await
    }

    async fn apply_config(&self, payload: &[u8]) -> Result<(), ExecError> {
        self.run(&["-j", "-f", "-"], Some(payload)).await?;
        Ok(())
    }

    async fn apply_config_echo(&self, payload: &[u8]) -> Result<Vec<u8>, ExecError> {
        self.run(&["-j", "-e", "-f", "-"], Some(payload)).await
    }
}

pub async fn read_config<E: Executor>(executor: &E, filters: &[&str]) -> Result<Config, ExecError> {
    let data = executor.read_config(filters).await?;
    let config = Config::from_json(&data)?;
    if let Some(info) = config.metainfo() {
        debug!(version = %info.version, schema = info.json_schema_version, "read nftables document");
    }
    Ok(config)
}

pub async fn apply_config<E: Executor>(executor: &E, config: &Config) -> Result<(), ExecError> {
    let payload = config.to_json()?;
    info!(entries = config.len(), "applying nftables document");
    executor.apply_config(&payload).await
}

pub async fn apply_config_echo<E: Executor>(
    executor: &E,
    config: &Config,
) -> Result<Config, ExecError> {
    let payload = config.to_json()?;
    info!(entries = config.len(), "applying nftables document with echo");
    let echoed = executor.apply_config_echo(&payload).await?;
    Ok(Config::from_json(&echoed)?)
}
