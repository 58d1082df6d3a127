//! Scripted transport double for tests
//!
//! Produces transports with canned outputs, programmable failures, and
//! artificial execution delays. Counters expose how many transports were
//! created and closed so lifecycle invariants (fresh transport per connect
//! attempt, teardown on expiry/disconnect) are observable from tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{CommandOutput, Transport, TransportError, TransportFactory};

/// Scripted [`TransportFactory`] for tests
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    connect_error: Option<TransportError>,
    expected_password: Option<String>,
    responses: HashMap<String, CommandOutput>,
    execute_delay: Option<Duration>,
    execute_error: Option<TransportError>,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    /// Creates a factory whose transports echo the command back as stdout
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Makes every connect attempt fail with the given error
    #[must_use]
    pub fn with_connect_error(mut self, error: TransportError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Requires this password on connect; anything else is `AuthFailed`
    #[must_use]
    pub fn with_expected_password(mut self, password: impl Into<String>) -> Self {
        self.expected_password = Some(password.into());
        self
    }

    /// Cans the output for a specific command
    #[must_use]
    pub fn with_response(mut self, command: impl Into<String>, output: CommandOutput) -> Self {
        self.responses.insert(command.into(), output);
        self
    }

    /// Delays every execute by the given duration
    #[must_use]
    pub const fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    /// Makes every execute fail with the given error
    #[must_use]
    pub fn with_execute_error(mut self, error: TransportError) -> Self {
        self.execute_error = Some(error);
        self
    }

    /// Number of transports handed out so far
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of transports that have been closed
    #[must_use]
    pub fn transports_closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn connect(
        &self,
        _host: &str,
        _username: &str,
        credential: &SecretString,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.connect_error {
            return Err(error.clone());
        }

        if let Some(expected) = &self.expected_password {
            if credential.expose_secret() != expected {
                return Err(TransportError::AuthFailed);
            }
        }

        Ok(Box::new(ScriptedTransport {
            responses: self.responses.clone(),
            execute_delay: self.execute_delay,
            execute_error: self.execute_error.clone(),
            closes: Arc::clone(&self.closes),
        }))
    }
}

/// Transport handed out by [`ScriptedFactory`]
#[derive(Debug)]
pub struct ScriptedTransport {
    responses: HashMap<String, CommandOutput>,
    execute_delay: Option<Duration>,
    execute_error: Option<TransportError>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.execute_error {
            return Err(error.clone());
        }

        Ok(self.responses.get(command).cloned().unwrap_or_else(|| {
            CommandOutput {
                stdout: format!("{command}\n"),
                stderr: String::new(),
                exit_code: Some(0),
            }
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
