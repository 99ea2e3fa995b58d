//! [`SessionGateway`] backed by the libimobiledevice `ideviceinfo` tool.
//!
//! Every query is one `ideviceinfo -u <udid> [-q <domain>] -x` invocation;
//! the tool performs the usbmux connect and lockdown handshake itself and
//! prints the reply as an XML plist.

use std::io::Cursor;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::SessionError;
use crate::gateway::{DeviceSession, GatewayFuture, SessionGateway};
use crate::types::{Domain, PropertyBag};

/// Upper bound for a single tool invocation.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`IdeviceinfoGateway`].
#[derive(Debug, Clone)]
pub struct IdeviceinfoConfig {
    /// Path or name of the `ideviceinfo` executable.
    pub program: PathBuf,
    /// Per-invocation timeout.
    pub timeout: Duration,
}

impl Default for IdeviceinfoConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ideviceinfo"),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Gateway that shells out to `ideviceinfo`.
#[derive(Debug, Clone, Default)]
pub struct IdeviceinfoGateway {
    config: IdeviceinfoConfig,
}

impl IdeviceinfoGateway {
    pub fn new(config: IdeviceinfoConfig) -> Self {
        Self { config }
    }
}

impl SessionGateway for IdeviceinfoGateway {
    fn open<'a>(
        &'a self,
        device_id: &'a str,
    ) -> GatewayFuture<'a, Result<Box<dyn DeviceSession>, SessionError>> {
        Box::pin(async move {
            let args = ["-u", device_id, "-k", "UniqueDeviceID"];
            // A probe that cannot run or times out means the device is unreachable.
            let output = run_tool(&self.config, &args).await.map_err(|failure| {
                SessionError::Connect {
                    device_id: device_id.to_string(),
                    reason: failure.describe(&self.config),
                }
            })?;

            if !output.status.success() {
                return Err(classify_failure(
                    device_id,
                    &output.failure_reason(&self.config),
                ));
            }

            tracing::debug!(udid = %device_id, "lockdown session opened");
            let session: Box<dyn DeviceSession> = Box::new(IdeviceinfoSession {
                device_id: device_id.to_string(),
                config: self.config.clone(),
            });
            Ok(session)
        })
    }
}

/// Session handle for one device. Holds no OS resources between queries.
struct IdeviceinfoSession {
    device_id: String,
    config: IdeviceinfoConfig,
}

impl DeviceSession for IdeviceinfoSession {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn query(&mut self, domain: Domain) -> GatewayFuture<'_, Result<PropertyBag, SessionError>> {
        Box::pin(async move {
            let mut args = vec!["-u", self.device_id.as_str(), "-x"];
            if let Some(token) = domain.token() {
                args.extend(["-q", token]);
            }

            let output = run_tool(&self.config, &args)
                .await
                .map_err(|failure| SessionError::Query {
                    domain,
                    reason: failure.describe(&self.config),
                })?;

            if !output.status.success() {
                return Err(SessionError::Query {
                    domain,
                    reason: output.failure_reason(&self.config),
                });
            }

            parse_property_bag(&output.stdout)
                .map_err(|reason| SessionError::Query { domain, reason })
        })
    }

    fn close(&mut self) {
        tracing::debug!(udid = %self.device_id, "lockdown session closed");
    }
}

struct ToolOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: String,
}

impl ToolOutput {
    fn failure_reason(&self, config: &IdeviceinfoConfig) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("{} exited with {}", config.program.display(), self.status)
        } else {
            stderr.to_string()
        }
    }
}

enum ToolFailure {
    Spawn(std::io::Error),
    TimedOut,
}

impl ToolFailure {
    fn describe(&self, config: &IdeviceinfoConfig) -> String {
        match self {
            ToolFailure::Spawn(e) => format!("failed to run {}: {e}", config.program.display()),
            ToolFailure::TimedOut => format!(
                "{} timed out after {:?}",
                config.program.display(),
                config.timeout
            ),
        }
    }
}

async fn run_tool(config: &IdeviceinfoConfig, args: &[&str]) -> Result<ToolOutput, ToolFailure> {
    let child = Command::new(&config.program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(config.timeout, child)
        .await
        .map_err(|_| ToolFailure::TimedOut)?
        .map_err(ToolFailure::Spawn)?;

    Ok(ToolOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Maps a failed connect probe to the session error taxonomy.
///
/// The tool reports lockdown failures as "Could not connect to lockdownd";
/// everything else (unknown UDID, usbmuxd unreachable) is a transport error.
pub fn classify_failure(device_id: &str, reason: &str) -> SessionError {
    if reason.to_ascii_lowercase().contains("lockdown") {
        SessionError::Handshake {
            device_id: device_id.to_string(),
            reason: reason.to_string(),
        }
    } else {
        SessionError::Connect {
            device_id: device_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parses an XML plist reply into a dictionary.
pub fn parse_property_bag(bytes: &[u8]) -> Result<PropertyBag, String> {
    plist::Value::from_reader_xml(Cursor::new(bytes))
        .map_err(|e| format!("invalid plist reply: {e}"))?
        .into_dictionary()
        .ok_or_else(|| "plist reply is not a dictionary".to_string())
}
