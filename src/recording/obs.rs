//! OBS Studio recording over obs-websocket protocol v5.

use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use tungstenite::{Message, WebSocket};

use super::RecordingBackend;
use crate::config::ObsConfig;
use crate::error::{CollectorError, Result};

const RPC_VERSION: u64 = 1;

// obs-websocket opcodes
const OP_HELLO: u64 = 0;
const OP_IDENTIFY: u64 = 1;
const OP_IDENTIFIED: u64 = 2;
const OP_REQUEST: u64 = 6;
const OP_REQUEST_RESPONSE: u64 = 7;

pub struct ObsBackend {
    config: ObsConfig,
    socket: Option<WebSocket<TcpStream>>,
    next_request: u64,
}

struct ObsResponse {
    ok: bool,
    comment: Option<String>,
    data: Value,
}

impl ObsBackend {
    pub fn new(config: ObsConfig) -> Self {
        Self {
            config,
            socket: None,
            next_request: 1,
        }
    }

    fn send_json(&mut self, value: &Value) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| CollectorError::BackendUnavailable("OBS is not connected".into()))?;
        socket
            .send(Message::Text(value.to_string()))
            .map_err(|e| CollectorError::Recording(format!("OBS send failed: {}", e)))
    }

    /// Next text frame parsed as JSON. Non-text frames are skipped.
    fn read_json(&mut self) -> Result<Value> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| CollectorError::BackendUnavailable("OBS is not connected".into()))?;
        loop {
            let message = socket
                .read()
                .map_err(|e| CollectorError::Recording(format!("OBS read failed: {}", e)))?;
            match message {
                Message::Text(text) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| CollectorError::Recording(format!("bad OBS message: {}", e)));
                }
                Message::Close(_) => {
                    return Err(CollectorError::Recording("OBS closed the connection".into()));
                }
                _ => continue,
            }
        }
    }

    fn request(&mut self, request_type: &str, data: Value) -> Result<ObsResponse> {
        let request_id = self.next_request.to_string();
        self.next_request += 1;
        self.send_json(&json!({
            "op": OP_REQUEST,
            "d": { "requestType": request_type, "requestId": request_id, "requestData": data }
        }))?;

        // Events are not subscribed, but skip anything that is not our response
        loop {
            let message = self.read_json()?;
            if message["op"].as_u64() != Some(OP_REQUEST_RESPONSE)
                || message["d"]["requestId"].as_str() != Some(request_id.as_str())
            {
                continue;
            }
            let d = &message["d"];
            let response = ObsResponse {
                ok: d["requestStatus"]["result"].as_bool().unwrap_or(false),
                comment: d["requestStatus"]["comment"].as_str().map(str::to_string),
                data: d["responseData"].clone(),
            };
            debug!(
                "OBS {} -> ok={} {}",
                request_type,
                response.ok,
                response.comment.as_deref().unwrap_or("")
            );
            return Ok(response);
        }
    }

    fn set_profile_parameter(&mut self, category: &str, name: &str, value: &str) -> Result<()> {
        let response = self.request(
            "SetProfileParameter",
            json!({ "parameterCategory": category, "parameterName": name, "parameterValue": value }),
        )?;
        if !response.ok {
            debug!("OBS rejected {}/{}: {:?}", category, name, response.comment);
        }
        Ok(())
    }
}

/// Authentication string for the Identify message:
/// base64(sha256(base64(sha256(password + salt)) + challenge)).
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{}{}", password, salt).as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{}{}", secret, challenge).as_bytes()))
}

fn unavailable(e: impl std::fmt::Display) -> CollectorError {
    CollectorError::BackendUnavailable(e.to_string())
}

impl RecordingBackend for ObsBackend {
    fn name(&self) -> &'static str {
        "OBS"
    }

    fn connect(&mut self) -> Result<()> {
        let timeout = Duration::from_millis(self.config.timeout_ms.max(1));
        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(unavailable)?
            .next()
            .ok_or_else(|| unavailable(format!("cannot resolve {}", self.config.host)))?;

        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(unavailable)?;
        stream.set_read_timeout(Some(timeout)).map_err(unavailable)?;
        stream.set_write_timeout(Some(timeout)).map_err(unavailable)?;

        let url = format!("ws://{}:{}", self.config.host, self.config.port);
        let (socket, _) = tungstenite::client(url.as_str(), stream).map_err(unavailable)?;
        self.socket = Some(socket);

        let hello = self.read_json().map_err(unavailable)?;
        if hello["op"].as_u64() != Some(OP_HELLO) {
            self.socket = None;
            return Err(unavailable("OBS did not send Hello"));
        }

        let mut identify = json!({ "rpcVersion": RPC_VERSION, "eventSubscriptions": 0 });
        let auth = &hello["d"]["authentication"];
        if let (Some(challenge), Some(salt)) = (auth["challenge"].as_str(), auth["salt"].as_str()) {
            identify["authentication"] =
                Value::String(auth_response(&self.config.password, salt, challenge));
        }
        self.send_json(&json!({ "op": OP_IDENTIFY, "d": identify }))
            .map_err(unavailable)?;

        let identified = self.read_json().map_err(unavailable)?;
        if identified["op"].as_u64() != Some(OP_IDENTIFIED) {
            self.socket = None;
            return Err(unavailable("OBS rejected identification (wrong password?)"));
        }
        Ok(())
    }

    fn start(&mut self, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let dir = output_dir.to_string_lossy().to_string();
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string());

        // Simple and advanced output modes keep the directory under different keys
        self.set_profile_parameter("SimpleOutput", "FilePath", &dir)?;
        self.set_profile_parameter("AdvOut", "RecFilePath", &dir)?;
        self.set_profile_parameter("Output", "FilenameFormatting", &stem)?;

        let response = self.request("StartRecord", json!({}))?;
        if response.ok {
            Ok(Some(output_dir.join(filename)))
        } else {
            Ok(None)
        }
    }

    fn stop(&mut self) -> Result<Option<PathBuf>> {
        let response = self.request("StopRecord", json!({}))?;
        if !response.ok {
            return Err(CollectorError::Recording(
                response
                    .comment
                    .unwrap_or_else(|| "StopRecord failed".to_string()),
            ));
        }
        Ok(response.data["outputPath"].as_str().map(PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_shape() {
        let a = auth_response("secret", "salt", "challenge");
        let b = auth_response("secret", "salt", "challenge");
        assert_eq!(a, b);
        // base64 of a 32-byte digest
        assert_eq!(a.len(), 44);
        assert_ne!(a, auth_response("secret", "salt", "other"));
        assert_ne!(a, auth_response("wrong", "salt", "challenge"));
    }

    #[test]
    fn test_unreachable_obs_is_backend_unavailable() {
        let mut backend = ObsBackend::new(ObsConfig {
            host: "127.0.0.1".into(),
            // Port 1 is reserved and closed on test machines
            port: 1,
            password: String::new(),
            timeout_ms: 200,
        });
        assert!(matches!(
            backend.connect(),
            Err(CollectorError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_request_without_connection() {
        let mut backend = ObsBackend::new(ObsConfig::default());
        assert!(matches!(
            backend.stop(),
            Err(CollectorError::BackendUnavailable(_))
        ));
    }
}
