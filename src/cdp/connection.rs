//! CDP Connection/Session Management
//!
//! A [`Connection`] talks to the browser target; a [`Session`] is a flattened
//! attachment to one page target and carries its session id on every call.

use std::sync::Arc;

use super::transport::Transport;
use super::types::*;
use crate::error::{Error, Result};

/// A CDP connection to Chrome
pub struct Connection {
    transport: Arc<Transport>,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Get browser version info
    pub async fn version(&self) -> Result<BrowserVersion> {
        self.transport.call(None, &BrowserGetVersion {}).await
    }

    /// Open a new tab and attach a flattened session to it
    pub async fn open_page(&self, url: &str) -> Result<Session> {
        let target = self
            .transport
            .call(
                None,
                &TargetCreateTarget {
                    url: url.to_string(),
                },
            )
            .await?;

        let attached = self
            .transport
            .call(
                None,
                &TargetAttachToTarget {
                    target_id: target.target_id.clone(),
                    flatten: true,
                },
            )
            .await?;

        tracing::debug!(target = %target.target_id, session = %attached.session_id, "attached to page");
        Ok(Session {
            transport: Arc::clone(&self.transport),
            session_id: attached.session_id,
            target_id: target.target_id,
        })
    }

    /// Close the browser
    pub async fn close(&self) -> Result<()> {
        let _ = self.transport.call(None, &BrowserClose {}).await;
        self.transport.close().await
    }
}

/// A CDP session attached to a specific page target
pub struct Session {
    transport: Arc<Transport>,
    session_id: String,
    target_id: String,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a typed command to this session
    pub async fn call<C: Command>(&self, params: &C) -> Result<C::Response> {
        self.transport.call(Some(&self.session_id), params).await
    }

    pub async fn page_enable(&self) -> Result<()> {
        self.call(&PageEnable {}).await?;
        Ok(())
    }

    /// Navigate, surfacing Chrome's net error text as a navigation error
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self
            .call(&PageNavigate {
                url: url.to_string(),
            })
            .await?;
        match result.error_text {
            Some(error) => Err(Error::Navigation(format!("{}: {}", url, error))),
            None => Ok(()),
        }
    }

    /// Evaluate an expression by value and deserialize the result.
    ///
    /// Script exceptions become [`Error::CdpSimple`]. An `undefined` result
    /// deserializes as JSON `null`.
    pub async fn evaluate<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let evaluated = self
            .call(&RuntimeEvaluate {
                expression: expression.to_string(),
                return_by_value: true,
                await_promise: true,
            })
            .await?;

        if let Some(exception) = evaluated.exception_details {
            return Err(Error::CdpSimple(format!(
                "JavaScript error: {} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        let value = evaluated.result.value.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Node ids of every element matching `selector`
    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<i32>> {
        let doc = self.call(&DOMGetDocument { depth: 0 }).await?;
        let nodes = self
            .call(&DOMQuerySelectorAll {
                node_id: doc.root.node_id,
                selector: selector.to_string(),
            })
            .await?;
        Ok(nodes.node_ids.into_iter().filter(|&id| id != 0).collect())
    }

    /// Viewport center of a node, or `None` if it has no layout box
    pub async fn node_center(&self, node_id: i32) -> Result<Option<(f64, f64)>> {
        match self.call(&DOMGetBoxModel { node_id }).await {
            Ok(result) => Ok(result.model.center()),
            Err(Error::Cdp { message, .. }) if message.contains("box model") => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn dispatch_mouse_event(
        &self,
        r#type: MouseEventType,
        x: f64,
        y: f64,
        pressed: bool,
    ) -> Result<()> {
        let (button, click_count) = if pressed {
            (Some(MouseButton::Left), Some(1))
        } else {
            (None, None)
        };
        self.call(&InputDispatchMouseEvent {
            r#type,
            x,
            y,
            button,
            click_count,
        })
        .await?;
        Ok(())
    }

    /// Capture a PNG screenshot
    pub async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        let shot = self
            .call(&PageCaptureScreenshot {
                format: Some("png".into()),
            })
            .await?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}
