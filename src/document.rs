//! The sequencer's view of a page
//!
//! [`Document`] is the only capability the sequencer needs: count elements,
//! click one, set a field value, read texts and scroll. It is implemented by
//! the CDP-backed [`Page`](crate::page::Page) and by the scripted
//! [`ScriptedDocument`](crate::fixture::ScriptedDocument).

use async_trait::async_trait;

use crate::error::Result;

/// How an element is addressed.
///
/// Checkout ids contain `.` and `:`, so ids are matched on the attribute
/// rather than through a `#id` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Exact `id` attribute
    Id(&'static str),
    /// CSS selector
    Css(&'static str),
}

impl Locator {
    /// CSS selector equivalent to this locator
    pub fn css(&self) -> String {
        match self {
            Locator::Id(id) => {
                format!("[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Locator::Css(selector) => selector.to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{}", id),
            Locator::Css(selector) => f.write_str(selector),
        }
    }
}

/// A live, externally mutated document.
#[async_trait]
pub trait Document: Send + Sync {
    /// Number of elements matching `locator`
    async fn count(&self, locator: &Locator) -> Result<usize>;

    async fn exists(&self, locator: &Locator) -> Result<bool> {
        Ok(self.count(locator).await? > 0)
    }

    /// Number of matches that are actually rendered.
    ///
    /// Defaults to [`count`](Document::count) for documents without layout.
    async fn visible_count(&self, locator: &Locator) -> Result<usize> {
        self.count(locator).await
    }

    /// Click the `index`-th match.
    ///
    /// Returns [`Error::ElementNotFound`](crate::Error::ElementNotFound) when
    /// there is no such element.
    async fn click(&self, locator: &Locator, index: usize) -> Result<()>;

    /// Set a field through the native value setter and fire
    /// [`NOTIFY_EVENTS`](crate::inject::NOTIFY_EVENTS).
    ///
    /// React-style frameworks track input state behind an overridden `value`
    /// property, so a plain assignment is invisible to them. Returns the value
    /// read back from the field after the events fired.
    async fn set_value(&self, locator: &Locator, value: &str) -> Result<String>;

    /// Text content of every rendered match, in document order
    async fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Scroll to `fraction` of the body height (`1.0` is the bottom)
    async fn scroll_to(&self, fraction: f64) -> Result<()>;
}
