//! CDP Transport Layer
//!
//! Speaks the DevTools protocol to Chrome over a minimal client-side WebSocket.
//! Responses are matched to requests by id; events are only traced.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::Child;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use super::types::Command;
use crate::error::{Error, Result};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Write half of the socket, shared with the reader thread for PONG replies
type Writer = Arc<std::sync::Mutex<TcpStream>>;

const OPCODE_TEXT: u8 = 0x1;
const OPCODE_CLOSE: u8 = 0x8;
const OPCODE_PING: u8 = 0x9;
const OPCODE_PONG: u8 = 0xA;

/// Encode a masked client frame (RFC 6455 §5.2)
fn encode_frame(opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(14 + len);
    frame.push(0x80 | opcode);

    match len {
        0..=125 => frame.push(0x80 | len as u8),
        126..=0xFFFF => {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            frame.push(0x80 | 127);
            frame.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }

    frame.extend_from_slice(&mask);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}

/// Read one frame, returning (opcode, unmasked payload)
fn read_frame<R: Read>(stream: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header)?;

    let opcode = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let len = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext)?;
            u16::from_be_bytes(ext) as usize
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext)?;
            u64::from_be_bytes(ext) as usize
        }
        n => n as usize,
    };

    let mask = if masked {
        let mut m = [0u8; 4];
        stream.read_exact(&mut m)?;
        Some(m)
    } else {
        None
    };

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok((opcode, payload))
}

/// Split `ws://host:port/path` into (`host:port`, `/path`)
fn split_ws_url(ws_url: &str) -> Result<(&str, String)> {
    let rest = ws_url
        .strip_prefix("ws://")
        .ok_or_else(|| Error::transport(format!("Unsupported DevTools URL: {}", ws_url)))?;
    Ok(match rest.split_once('/') {
        Some((host, path)) => (host, format!("/{}", path)),
        None => (rest, "/".to_string()),
    })
}

/// CDP transport over a WebSocket to a Chrome child process
pub struct Transport {
    child: Mutex<Child>,
    writer: Writer,
    next_id: AtomicU64,
    pending: Pending,
}

impl Transport {
    /// Connect to Chrome's DevTools WebSocket
    pub fn connect(child: Child, ws_url: &str) -> Result<Self> {
        let (host, path) = split_ws_url(ws_url)?;

        let mut stream = TcpStream::connect(host)
            .map_err(|e| Error::transport_io("Failed to connect to Chrome", e))?;

        let key = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            rand::random::<[u8; 16]>(),
        );
        let handshake = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        stream
            .write_all(handshake.as_bytes())
            .map_err(|e| Error::transport_io("Handshake write failed", e))?;

        let mut response = [0u8; 1024];
        let n = stream
            .read(&mut response)
            .map_err(|e| Error::transport_io("Handshake read failed", e))?;
        let response = String::from_utf8_lossy(&response[..n]);
        if !response.starts_with("HTTP/1.1 101") {
            return Err(Error::transport(format!(
                "WebSocket handshake failed: {}",
                response.lines().next().unwrap_or_default()
            )));
        }
        tracing::debug!("WebSocket connected to {}", ws_url);

        let reader = stream
            .try_clone()
            .map_err(|e| Error::transport_io("Failed to clone stream", e))?;
        let writer: Writer = Arc::new(std::sync::Mutex::new(stream));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = Arc::clone(&pending);
        let writer_reader = Arc::clone(&writer);
        std::thread::spawn(move || reader_loop(reader, writer_reader, pending_reader));

        Ok(Self {
            child: Mutex::new(child),
            writer,
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    /// Send a typed command, optionally routed to a flattened target session
    pub async fn call<C: Command>(&self, session_id: Option<&str>, params: &C) -> Result<C::Response> {
        let value = self
            .send_raw(session_id, C::METHOD, serde_json::to_value(params)?)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn send_raw(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut msg = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            msg["sessionId"] = Value::String(session_id.to_string());
        }
        let frame = encode_frame(OPCODE_TEXT, msg.to_string().as_bytes(), rand::random());

        let written = write_frame(&self.writer, &frame);
        if let Err(e) = written {
            self.pending.lock().await.remove(&id);
            return Err(Error::transport_io("WebSocket write failed", e));
        }
        tracing::trace!(method, id, session = session_id.unwrap_or("-"), "cdp send");

        rx.await
            .map_err(|_| Error::transport("Response channel closed"))?
            .map_err(|e| match e {
                Error::Cdp { code, message, .. } => Error::cdp(method, code, message),
                other => other,
            })
    }

    /// Close the socket and kill Chrome
    pub async fn close(&self) -> Result<()> {
        let _ = write_frame(&self.writer, &encode_frame(OPCODE_CLOSE, &[], [0; 4]));
        let mut child = self.child.lock().await;
        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.kill();
        }
    }
}

/// Route a decoded text message to its waiting request
fn dispatch_message(text: &str, pending: &Pending) {
    let msg: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Failed to parse CDP message: {}", e);
            return;
        }
    };

    let Some(id) = msg.get("id").and_then(Value::as_u64) else {
        if let Some(method) = msg.get("method").and_then(Value::as_str) {
            tracing::trace!(method, "cdp event");
        }
        return;
    };

    let result = match msg.get("error") {
        Some(error) => Err(Error::cdp(
            "unknown",
            error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        )),
        None => Ok(msg.get("result").cloned().unwrap_or_else(|| json!({}))),
    };

    match pending.blocking_lock().remove(&id) {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => tracing::trace!(id, "response for unknown id"),
    }
}

/// Write a whole frame under the writer lock so frames never interleave
fn write_frame<W: Write>(writer: &std::sync::Mutex<W>, frame: &[u8]) -> std::io::Result<()> {
    // A poisoned lock still guards a usable stream
    let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
    writer.write_all(frame)?;
    writer.flush()
}

fn reader_loop(mut stream: TcpStream, writer: Writer, pending: Pending) {
    loop {
        let (opcode, payload) = match read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("WebSocket read error: {}", e);
                break;
            }
        };

        match opcode {
            OPCODE_TEXT => match String::from_utf8(payload) {
                Ok(text) => dispatch_message(&text, &pending),
                Err(_) => continue,
            },
            OPCODE_PING => {
                let _ = write_frame(&writer, &encode_frame(OPCODE_PONG, &payload, rand::random()));
            }
            OPCODE_CLOSE => {
                tracing::debug!("WebSocket closed by Chrome");
                break;
            }
            _ => {}
        }
    }

    // Fail everything still waiting so callers see a transport error
    pending.blocking_lock().clear();
    tracing::debug!("CDP reader loop ended");
}
