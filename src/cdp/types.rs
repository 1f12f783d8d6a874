//! Hand-written CDP types for the handful of commands the checkout flow needs
//!
//! Every command implements [`Command`], which ties the method name to its
//! response type so call sites can't mismatch them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A CDP command with a fixed method name and response shape
pub trait Command: Serialize {
    const METHOD: &'static str;
    type Response: DeserializeOwned;
}

/// Empty response body (`{}`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

macro_rules! command {
    ($ty:ty, $method:literal, $resp:ty) => {
        impl Command for $ty {
            const METHOD: &'static str = $method;
            type Response = $resp;
        }
    };
}

// === Browser ===

#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowserGetVersion {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowserClose {}

command!(BrowserGetVersion, "Browser.getVersion", BrowserVersion);
command!(BrowserClose, "Browser.close", Empty);

// === Target ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreateTarget {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTarget {
    #[serde(default)]
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAttachToTarget {
    pub target_id: String,
    pub flatten: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedTarget {
    #[serde(default)]
    pub session_id: String,
}

command!(TargetCreateTarget, "Target.createTarget", CreatedTarget);
command!(TargetAttachToTarget, "Target.attachToTarget", AttachedTarget);

// === Page ===

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageEnable {}

#[derive(Debug, Clone, Serialize)]
pub struct PageNavigate {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigated {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageCaptureScreenshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Screenshot {
    #[serde(default)]
    pub data: String,
}

command!(PageEnable, "Page.enable", Empty);
command!(PageNavigate, "Page.navigate", Navigated);
command!(PageCaptureScreenshot, "Page.captureScreenshot", Screenshot);

// === Runtime ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvaluate {
    pub expression: String,
    pub return_by_value: bool,
    pub await_promise: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluated {
    #[serde(default)]
    pub result: RemoteObject,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub text: String,
    pub line_number: i32,
    pub column_number: i32,
}

command!(RuntimeEvaluate, "Runtime.evaluate", Evaluated);

// === DOM ===

#[derive(Debug, Clone, Serialize)]
pub struct DOMGetDocument {
    pub depth: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentRoot {
    #[serde(default)]
    pub root: DOMNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMNode {
    #[serde(default)]
    pub node_id: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMQuerySelectorAll {
    pub node_id: i32,
    pub selector: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIds {
    #[serde(default)]
    pub node_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMGetBoxModel {
    pub node_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxModelResult {
    #[serde(default)]
    pub model: BoxModel,
}

/// Content quad of a rendered node: `[x1,y1, x2,y2, x3,y3, x4,y4]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxModel {
    #[serde(default)]
    pub content: Vec<f64>,
}

impl BoxModel {
    /// Center of the content quad, or `None` when the node is not rendered
    pub fn center(&self) -> Option<(f64, f64)> {
        let quad = self.content.get(..8)?;
        let x = quad.iter().step_by(2).sum::<f64>() / 4.0;
        let y = quad.iter().skip(1).step_by(2).sum::<f64>() / 4.0;
        Some((x, y))
    }
}

command!(DOMGetDocument, "DOM.getDocument", DocumentRoot);
command!(DOMQuerySelectorAll, "DOM.querySelectorAll", NodeIds);
command!(DOMGetBoxModel, "DOM.getBoxModel", BoxModelResult);

// === Input ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDispatchMouseEvent {
    pub r#type: MouseEventType,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
    MouseMoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
}

command!(InputDispatchMouseEvent, "Input.dispatchMouseEvent", Empty);
