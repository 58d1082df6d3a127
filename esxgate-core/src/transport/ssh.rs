//! System OpenSSH client transport
//!
//! Drives the `ssh` binary (or `sshpass -e ssh` for password
//! authentication) through `tokio::process`. Each command runs as one ssh
//! exec; there is no persistent channel to tear down, so the remote side
//! sees a clean connection per dispatch and `close` is a no-op handshake.
//!
//! A TCP preflight against the ssh port distinguishes an unreachable host
//! from rejected credentials before any authentication is attempted.

use std::net::{SocketAddr, ToSocketAddrs};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;

use super::{CommandOutput, Transport, TransportError, TransportFactory};

/// Default ssh port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Exit code the ssh client uses for connection and authentication errors
const SSH_CLIENT_ERROR_EXIT: i32 = 255;

/// Factory for [`SshCliTransport`] instances
#[derive(Debug, Clone)]
pub struct SshCliFactory {
    port: u16,
}

impl Default for SshCliFactory {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
        }
    }
}

impl SshCliFactory {
    /// Creates a factory targeting the default ssh port
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ssh port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[async_trait]
impl TransportFactory for SshCliFactory {
    async fn connect(
        &self,
        host: &str,
        username: &str,
        credential: &SecretString,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        ensure_ssh_client().await?;

        let use_sshpass = !credential.expose_secret().is_empty() && sshpass_available().await;

        check_port(host, self.port, connect_timeout).await?;

        let transport = SshCliTransport {
            host: host.to_string(),
            username: username.to_string(),
            password: credential.clone(),
            port: self.port,
            use_sshpass,
            connect_timeout,
        };

        // Authentication probe: a trivial remote command. The port is known
        // reachable, so a client-level failure here means bad credentials.
        match transport.run("true").await {
            Ok(output) if output.exit_code == Some(SSH_CLIENT_ERROR_EXIT) => {
                Err(TransportError::AuthFailed)
            }
            Ok(_) => Ok(Box::new(transport)),
            Err(e) => Err(e),
        }
    }
}

/// A transport backed by the system ssh client
#[derive(Debug)]
pub struct SshCliTransport {
    host: String,
    username: String,
    password: SecretString,
    port: u16,
    use_sshpass: bool,
    connect_timeout: Duration,
}

impl SshCliTransport {
    /// Spawns one ssh exec and collects its output.
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let mut cmd;

        if self.use_sshpass {
            cmd = Command::new("sshpass");
            cmd.arg("-e").arg("ssh");
            cmd.env("SSHPASS", self.password.expose_secret());
        } else {
            cmd = Command::new("ssh");
            // Batch mode only when NOT using password auth
            cmd.arg("-o").arg("BatchMode=yes");
        }

        cmd.arg("-o").arg("StrictHostKeyChecking=no");
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs()));

        if self.port != DEFAULT_SSH_PORT {
            cmd.arg("-p").arg(self.port.to_string());
        }

        cmd.arg(format!("{}@{}", self.username, self.host));
        cmd.arg(command);

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let output = cmd
            .output()
            .await
            .map_err(|e| TransportError::Stream(format!("Failed to spawn ssh process: {e}")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

#[async_trait]
impl Transport for SshCliTransport {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let output = self.run(command).await?;

        // 255 is the ssh client reporting its own failure, not the remote
        // command's exit status
        if output.exit_code == Some(SSH_CLIENT_ERROR_EXIT) {
            return Err(TransportError::Stream(
                "ssh client reported a connection failure".to_string(),
            ));
        }

        Ok(output)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // One exec per command: nothing persistent to terminate
        Ok(())
    }
}

/// Verifies the ssh client exists on this host
async fn ensure_ssh_client() -> Result<(), TransportError> {
    let status = Command::new("ssh")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(_) => Ok(()),
        Err(e) => Err(TransportError::Unavailable(format!(
            "ssh client not found on PATH: {e}"
        ))),
    }
}

/// Checks whether sshpass is installed, once per connect
async fn sshpass_available() -> bool {
    Command::new("sshpass")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

/// Fast TCP reachability check against the ssh port.
///
/// Resolves the host and tries each address within the timeout, so an
/// unreachable host fails fast instead of surfacing as an opaque
/// authentication error.
async fn check_port(host: &str, port: u16, timeout: Duration) -> Result<(), TransportError> {
    let addr_str = format!("{host}:{port}");

    // Resolution is blocking but fast
    let addrs: Vec<SocketAddr> = addr_str
        .to_socket_addrs()
        .map_err(|_| TransportError::Unreachable(host.to_string()))?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::Unreachable(host.to_string()));
    }

    for addr in addrs {
        if let Ok(Ok(_stream)) =
            tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await
        {
            return Ok(());
        }
    }

    Err(TransportError::Unreachable(host.to_string()))
}
