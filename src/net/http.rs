//! HTTP control endpoints
//!
//! A minimal HTTP/1.1 server: one request per connection, JSON bodies,
//! permissive CORS. Serves room creation and lookup plus health and metrics.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::constants::net::{HTTP_READ_TIMEOUT, MAX_HTTP_REQUEST_SIZE};
use crate::lobby::RoomRegistry;

const ROOMS_PATH: &str = "/api/rooms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Path without query string
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    fn no_content() -> Self {
        Self::text(204, "text/plain", String::new())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Connection: close\r\n\r\n{}",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Malformed request")]
    Malformed,
    #[error("Request too large")]
    TooLarge,
    #[error("Connection closed")]
    Closed,
    #[error("Timed out reading request")]
    TimedOut,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    #[serde(default)]
    time_limit: u32,
}

/// Parse a buffered request; `Ok(None)` means more bytes are needed
pub fn parse_request(buf: &[u8]) -> Result<Option<HttpRequest>, HttpError> {
    let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };

    let head = std::str::from_utf8(&buf[..header_end]).map_err(|_| HttpError::Malformed)?;
    let mut lines = head.split("\r\n");

    let mut request_line = lines.next().ok_or(HttpError::Malformed)?.split_whitespace();
    let method = request_line.next().ok_or(HttpError::Malformed)?;
    let target = request_line.next().ok_or(HttpError::Malformed)?;

    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().map_err(|_| HttpError::Malformed)?;
            }
        }
    }
    if content_length > MAX_HTTP_REQUEST_SIZE {
        return Err(HttpError::TooLarge);
    }

    let body_start = header_end + 4;
    if buf.len() < body_start + content_length {
        return Ok(None);
    }

    let path = target.split('?').next().unwrap_or(target);
    Ok(Some(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        body: buf[body_start..body_start + content_length].to_vec(),
    }))
}

/// Read one request from a stream
pub async fn read_request<R: AsyncRead + Unpin>(stream: &mut R) -> Result<HttpRequest, HttpError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(request) = parse_request(&buf)? {
            return Ok(request);
        }
        if buf.len() >= MAX_HTTP_REQUEST_SIZE {
            return Err(HttpError::TooLarge);
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(if buf.is_empty() {
                HttpError::Closed
            } else {
                HttpError::Malformed
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Read one request, giving up if it is not complete within `limit`
pub async fn read_request_within<R: AsyncRead + Unpin>(
    stream: &mut R,
    limit: Duration,
) -> Result<HttpRequest, HttpError> {
    tokio::time::timeout(limit, read_request(stream))
        .await
        .map_err(|_| HttpError::TimedOut)?
}

/// Dispatch a request
pub async fn route(registry: &RoomRegistry, request: &HttpRequest) -> HttpResponse {
    let method = request.method.as_str();
    let path = request.path.as_str();

    if method == "OPTIONS" {
        return HttpResponse::no_content();
    }

    match (method, path) {
        ("POST", ROOMS_PATH) => create_room(registry, &request.body),
        ("GET", "/health") => HttpResponse::text(200, "text/plain", "OK".to_string()),
        ("GET", "/metrics") => HttpResponse::text(
            200,
            "text/plain; version=0.0.4",
            registry.metrics().to_prometheus(),
        ),
        ("GET", "/metrics/json") => {
            HttpResponse::text(200, "application/json", registry.metrics().to_json())
        }
        ("GET", _) => match path.strip_prefix(ROOMS_PATH).and_then(|p| p.strip_prefix('/')) {
            Some(room_id) if !room_id.is_empty() => get_room(registry, room_id).await,
            _ => HttpResponse::error(404, "Not found"),
        },
        _ => HttpResponse::error(404, "Not found"),
    }
}

fn create_room(registry: &RoomRegistry, body: &[u8]) -> HttpResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateRoomRequest::default()
    } else {
        match serde_json::from_slice::<CreateRoomRequest>(body) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejecting create-room body: {}", e);
                return HttpResponse::error(400, "Invalid request body");
            }
        }
    };

    match registry.create_room(request.time_limit) {
        Ok(handle) => HttpResponse::json(200, json!({ "roomId": handle.code().as_str() })),
        Err(e) => HttpResponse::error(503, &e.to_string()),
    }
}

async fn get_room(registry: &RoomRegistry, room_id: &str) -> HttpResponse {
    match registry.room_snapshot(room_id).await {
        Some(snapshot) => match serde_json::to_value(snapshot) {
            Ok(value) => HttpResponse::json(200, value),
            Err(_) => HttpResponse::error(404, "Room not found"),
        },
        None => HttpResponse::error(404, "Room not found"),
    }
}

/// Serve the control endpoints until the listener fails
pub async fn start_control_server(
    registry: RoomRegistry,
    bind_address: IpAddr,
    port: u16,
) -> anyhow::Result<()> {
    let addr = SocketAddr::new(bind_address, port);
    let listener = TcpListener::bind(addr).await?;

    info!("Control server listening on http://{}", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let registry = registry.clone();

        tokio::spawn(async move {
            let response = match read_request_within(&mut socket, HTTP_READ_TIMEOUT).await {
                Ok(request) => {
                    debug!("{} {} from {}", request.method, request.path, peer);
                    route(&registry, &request).await
                }
                Err(HttpError::Closed) => return,
                Err(HttpError::TooLarge) => HttpResponse::error(413, "Request too large"),
                Err(HttpError::TimedOut) => {
                    debug!("Request from {} timed out", peer);
                    HttpResponse::error(408, "Request timeout")
                }
                Err(e) => {
                    debug!("Bad request from {}: {}", peer, e);
                    HttpResponse::error(400, "Bad request")
                }
            };

            if let Err(e) = socket.write_all(&response.to_bytes()).await {
                debug!("Failed to write response to {}: {}", peer, e);
            }
        });
    }
}
