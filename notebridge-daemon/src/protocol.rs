//! Newline-delimited JSON over `~/.notebridge/daemon.sock`.
//!
//! Each request is one line `{"cmd": "status" | "sync" | "stop"}`; the daemon
//! answers with one line `{"ok": bool, "data": .., "error": ..}`.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

pub const CMD_STATUS: &str = "status";
pub const CMD_SYNC: &str = "sync";
pub const CMD_STOP: &str = "stop";

const STATUS_ATTEMPTS: usize = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
}

impl DaemonRequest {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// The payload of a successful response, or the daemon's message as a
    /// [`DaemonError::Protocol`].
    pub fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(DaemonError::Protocol(
            self.error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

/// Send one request and wait for its single-line response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        }
        _ => io_err(&socket, err),
    })?;

    let mut payload = serde_json::to_string(request)?;
    payload.push('\n');
    stream
        .write_all(payload.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Query daemon status. A socket that is not accepting yet is retried a few
/// times so `status` right after `start` does not race the bind.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new(CMD_STATUS);
    let mut attempt = 1;
    loop {
        match send_request(home, &request) {
            Ok(response) => return response.into_data(),
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Ask the daemon to run a pass now; returns the pass summary.
pub fn request_sync(home: &Path) -> Result<Value, DaemonError> {
    send_request(home, &DaemonRequest::new(CMD_SYNC))?.into_data()
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    send_request(home, &DaemonRequest::new(CMD_STOP))?
        .into_data()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn request_encodes_as_single_cmd_field() {
        let line = serde_json::to_string(&DaemonRequest::new(CMD_SYNC)).expect("encode");
        assert_eq!(line, r#"{"cmd":"sync"}"#);
    }

    #[test]
    fn error_response_omits_data() {
        let line = serde_json::to_string(&DaemonResponse::error("boom")).expect("encode");
        assert_eq!(line, r#"{"ok":false,"error":"boom"}"#);
    }

    #[test]
    fn into_data_surfaces_daemon_errors() {
        let data = DaemonResponse::ok(json!({"running": true}))
            .into_data()
            .expect("ok");
        assert_eq!(data["running"], json!(true));

        let err = DaemonResponse::error("sync queue closed")
            .into_data()
            .unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "sync queue closed"));
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().expect("home");
        let err = request_stop(home.path()).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
