//! # Orderbot
//!
//! Drives a store's guest checkout over the Chrome DevTools Protocol.
//!
//! A polling dispatcher looks at the current page, picks the highest-priority
//! step whose element is present and hasn't run yet, and acts on it: pick a
//! coverage option, add to bag, check out as guest, fill the shipping form,
//! hold until the delivery quote matches the target date, fill the card and
//! billing forms, and confirm.
//!
//! ## Features
//!
//! - **One-shot steps** - every step fires at most once per run
//! - **Framework-safe input** - values go through the native setter and the
//!   input/change/blur events, then get read back
//! - **Delivery gate** - the shipping step only continues on the target date
//! - **Bounded waits** - every poll has an attempt budget and a typed timeout
//! - **Scripted documents** - the whole flow runs against an in-memory page
//! - **Page errors and popups** - a rendered error banner stops the run, and
//!   dialogs covering the page are closed when nothing else is ready
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderbot::{Browser, RunConfig, Sequencer};
//!
//! #[tokio::main]
//! async fn main() -> orderbot::Result<()> {
//!     let config = RunConfig::load("orderbot.yaml")?;
//!
//!     let browser = Browser::launch(&config.browser).await?;
//!     let page = browser.new_page(&config.product_url).await?;
//!     page.wait_for_load(config.timing.page_load_timeout()).await?;
//!
//!     let mut sequencer = Sequencer::new(&page, &config)?;
//!     sequencer.run().await?;
//!     sequencer.report().save("report.json")?;
//!
//!     browser.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`runner::live_run`] does the same with a Ctrl-C style interrupt, and always
//! records the failure and closes the browser.
//!
//! ## Without a browser
//!
//! ```rust
//! use orderbot::{RunConfig, ScriptedDocument, Sequencer, Timing};
//!
//! # #[tokio::main]
//! # async fn main() -> orderbot::Result<()> {
//! let doc = ScriptedDocument::checkout("Delivers Fri, Sep 19");
//! let config = RunConfig {
//!     timing: Timing {
//!         time_scale: 0.001,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let mut sequencer = Sequencer::new(&doc, &config)?;
//! sequencer.run().await?;
//! assert!(sequencer.report().is_success());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod cdp;
pub mod config;
pub mod delivery;
pub mod document;
pub mod error;
pub mod fixture;
pub mod human;
pub mod inject;
pub mod page;
pub mod report;
pub mod runner;
pub mod selectors;
pub mod sequencer;
pub mod step;
pub mod wait;

// Re-exports
pub use browser::Browser;
pub use config::{BrowserConfig, Profile, RunConfig, Timing};
pub use delivery::{DeliveryGate, DeliveryTarget, GateVerdict};
pub use document::{Document, Locator};
pub use error::{Error, Result};
pub use fixture::{ScriptedDocument, Stage};
pub use page::Page;
pub use report::{Outcome, RunReport};
pub use sequencer::{Sequencer, Tick};
pub use step::{RunState, Step};
pub use wait::Poller;
