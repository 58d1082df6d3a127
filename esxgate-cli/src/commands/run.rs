//! Gateway request processing loop.
//!
//! Reads one JSON request per line, drives the connection manager, and
//! writes one JSON response per line to stdout. A malformed line yields a
//! failure response rather than aborting the stream; responses never echo
//! credentials or rejected command text.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use esxgate_core::transport::SshCliFactory;
use esxgate_core::{
    CommandOutput, ConnectionManager, GatewayConfig, GatewayRequest, GatewayResponse, SessionStore,
};

use crate::error::CliError;
use crate::util::{build_policy_engine, load_config};

/// Run command handler
pub fn cmd_run(config_path: Option<&Path>, file: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let engine = build_policy_engine(&config)?;
    let store = Arc::new(Mutex::new(SessionStore::new()));
    let manager = ConnectionManager::new(
        config.clone(),
        engine,
        store,
        Arc::new(SshCliFactory::new()),
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to create async runtime: {e}")))?;

    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::stdin().lock()),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<GatewayRequest>(&line) {
            Ok(request) => runtime.block_on(handle_request(&manager, &config, request)),
            Err(e) => {
                tracing::debug!("request did not parse: {e}");
                GatewayResponse::failure("Invalid request")
            }
        };

        let rendered = serde_json::to_string(&response)
            .map_err(|e| CliError::Runtime(format!("Failed to encode response: {e}")))?;
        println!("{rendered}");
    }

    Ok(())
}

/// Processes one checked or unchecked request into a response.
///
/// Field errors, policy rejections, and connection failures all come back
/// as failure responses; this function never returns an error because a
/// bad request must not end the stream.
async fn handle_request(
    manager: &ConnectionManager,
    config: &GatewayConfig,
    request: GatewayRequest,
) -> GatewayResponse {
    if let Err(e) = request.check() {
        return GatewayResponse::failure(e.to_string());
    }

    if request.is_disconnect() {
        let Some(id) = request.session_id else {
            return GatewayResponse::failure("Missing required parameter: session_id");
        };
        return match manager.disconnect(id).await {
            Ok(()) => GatewayResponse::ok("Disconnected successfully"),
            Err(e) => GatewayResponse::failure(e.to_string()),
        };
    }

    let Some(command) = request.command.as_deref() else {
        return GatewayResponse::failure("Missing required parameter: command");
    };

    let (id, fresh) = match request.session_id {
        Some(id) => (id, false),
        None => {
            // Validate before any transport work: a denied command must
            // never trigger authentication or consume a connection slot
            let verdict = manager.policy().validate(command);
            if !verdict.is_admitted() {
                return GatewayResponse::failure(verdict.reason.to_string());
            }

            let (Some(host), Some(username), Some(password)) = (
                request.host.as_deref(),
                request.username.as_deref(),
                request.password.as_ref(),
            ) else {
                return GatewayResponse::failure("Missing connection parameters");
            };

            let timeout = request
                .timeout
                .unwrap_or_else(|| i64::try_from(config.default_timeout_secs).unwrap_or(i64::MAX));

            match manager.connect(host, username, password, timeout).await {
                Ok(id) => (id, true),
                Err(e) => return GatewayResponse::failure(e.to_string()),
            }
        }
    };

    match manager.execute(id, command).await {
        Ok(output) => GatewayResponse::ok("Command executed successfully")
            .with_output(render_output(&output))
            .with_session_id(id),
        Err(e) => {
            let response = GatewayResponse::failure(e.to_string());
            // A session opened by this very request is still returned so
            // the caller can reuse or disconnect it
            if fresh {
                response.with_session_id(id)
            } else {
                response
            }
        }
    }
}

/// Combines a command's output streams for the response body.
fn render_output(output: &CommandOutput) -> String {
    if output.stderr.is_empty() {
        output.stdout.clone()
    } else if output.stdout.is_empty() {
        output.stderr.clone()
    } else {
        format!("{}\n{}", output.stdout.trim_end_matches('\n'), output.stderr)
    }
}
