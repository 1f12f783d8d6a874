//! Run configuration
//!
//! Loaded from YAML. Every section is optional; missing values fall back to
//! the defaults below, which are the values the checkout flow was tuned with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryTarget;
use crate::error::{Error, Result};

const DEFAULT_PRODUCT_URL: &str =
    "https://www.apple.com/shop/buy-iphone/iphone-16-pro/6.3-inch-display-128gb-desert-titanium-unlocked";

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Product page the run starts from.
    #[serde(default = "default_product_url")]
    pub product_url: String,

    /// Identity and payment values used to fill the checkout forms.
    #[serde(default)]
    pub profile: Profile,

    /// Required delivery date. `null` disables the gate.
    #[serde(default = "default_delivery")]
    pub delivery: Option<DeliveryTarget>,

    /// Browser launch configuration.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Dispatcher and poller timing.
    #[serde(default)]
    pub timing: Timing,
}

fn default_product_url() -> String {
    DEFAULT_PRODUCT_URL.into()
}

fn default_delivery() -> Option<DeliveryTarget> {
    Some(DeliveryTarget::default())
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            product_url: default_product_url(),
            profile: Profile::default(),
            delivery: default_delivery(),
            browser: BrowserConfig::default(),
            timing: Timing::default(),
        }
    }
}

impl RunConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        // An empty file is a valid "all defaults" config
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config.
    pub fn validate(&self) -> Result<()> {
        if !self.product_url.starts_with("http://") && !self.product_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "product_url must be an http(s) URL, got {:?}",
                self.product_url
            )));
        }
        self.profile.validate()?;
        if let Some(ref delivery) = self.delivery {
            if delivery.month.trim().is_empty() {
                return Err(Error::Config("delivery.month is required".into()));
            }
            if !(1..=31).contains(&delivery.day) {
                return Err(Error::Config(format!(
                    "delivery.day must be 1-31, got {}",
                    delivery.day
                )));
            }
        }
        self.browser.validate()?;
        self.timing.validate()
    }
}

/// Identity and payment values. Immutable for the run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub street_address: String,
    pub email: String,
    pub phone: String,
    pub postal_code: String,
    pub card_number: String,
    /// MMYY
    pub expiration: String,
    pub security_code: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            first_name: "test".into(),
            last_name: "test".into(),
            street_address: "2934 NW 72nd Ave".into(),
            email: "test@example.com".into(),
            phone: "1234567890".into(),
            postal_code: "33122".into(),
            card_number: "4111111111111111".into(),
            expiration: "0426".into(),
            security_code: "123".into(),
        }
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("street_address", &self.street_address)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("postal_code", &self.postal_code)
            .field("card_number", &mask_card(&self.card_number))
            .field("expiration", &self.expiration)
            .field("security_code", &"***")
            .finish()
    }
}

/// Keep only the last four digits
pub fn mask_card(number: &str) -> String {
    let len = number.chars().count();
    number
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < len { '*' } else { c })
        .collect()
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

impl Profile {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("street_address", &self.street_address),
            ("email", &self.email),
            ("phone", &self.phone),
            ("postal_code", &self.postal_code),
            ("card_number", &self.card_number),
            ("expiration", &self.expiration),
            ("security_code", &self.security_code),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("profile.{} is required", name)));
            }
        }

        if !self.email.contains('@') {
            return Err(Error::Config("profile.email must contain '@'".into()));
        }
        if !all_digits(&self.phone) || self.phone.len() != 10 {
            return Err(Error::Config("profile.phone must be 10 digits".into()));
        }
        if !all_digits(&self.card_number) || !(12..=19).contains(&self.card_number.len()) {
            return Err(Error::Config(
                "profile.card_number must be 12-19 digits".into(),
            ));
        }
        if !all_digits(&self.expiration) || self.expiration.len() != 4 {
            return Err(Error::Config(
                "profile.expiration must be four digits (MMYY)".into(),
            ));
        }
        let month: u32 = self.expiration[..2].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(Error::Config(format!(
                "profile.expiration month must be 01-12, got {}",
                &self.expiration[..2]
            )));
        }
        if !all_digits(&self.security_code) || !(3..=4).contains(&self.security_code.len()) {
            return Err(Error::Config(
                "profile.security_code must be 3-4 digits".into(),
            ));
        }
        Ok(())
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode.
    pub headless: bool,

    /// Chrome binary. Falls back to `CHROME_PATH`, then well-known locations.
    pub chrome_path: Option<PathBuf>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Click with simulated mouse movement instead of `element.click()`.
    pub human_mouse: bool,

    /// Directory for failure screenshots. Disabled when unset.
    pub debug_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            viewport_width: 1280,
            viewport_height: 900,
            human_mouse: false,
            debug_dir: None,
        }
    }
}

impl BrowserConfig {
    fn validate(&self) -> Result<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(Error::Config("browser viewport must be non-zero".into()));
        }
        Ok(())
    }
}

/// Dispatcher and poller timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Delay between dispatcher ticks when no step is ready.
    pub dispatch_interval_ms: u64,

    /// Consecutive idle ticks before the run is declared stuck.
    pub max_idle_ticks: u32,

    /// Poll attempts a step handler makes before giving up.
    pub max_poll_attempts: u32,

    /// Poll interval multiplier applied after each miss.
    pub backoff_factor: f64,

    /// Upper bound for a backed-off poll interval.
    pub max_poll_interval_ms: u64,

    /// Consecutive ticks a blocked delivery gate is tolerated.
    pub gate_patience: u32,

    /// Bound on waiting for the initial page load.
    pub page_load_timeout_ms: u64,

    /// Multiplier applied to every fixed delay and poll interval.
    pub time_scale: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 2000,
            max_idle_ticks: 150,
            max_poll_attempts: 300,
            backoff_factor: 1.5,
            max_poll_interval_ms: 2000,
            gate_patience: 30,
            page_load_timeout_ms: 20_000,
            time_scale: 1.0,
        }
    }
}

impl Timing {
    fn validate(&self) -> Result<()> {
        if self.dispatch_interval_ms == 0 {
            return Err(Error::Config("timing.dispatch_interval_ms must be > 0".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(Error::Config("timing.max_poll_attempts must be at least 1".into()));
        }
        if self.max_idle_ticks == 0 || self.gate_patience == 0 {
            return Err(Error::Config(
                "timing.max_idle_ticks and timing.gate_patience must be at least 1".into(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Config("timing.backoff_factor must be >= 1.0".into()));
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(Error::Config("timing.time_scale must be > 0".into()));
        }
        Ok(())
    }

    /// Scale a fixed delay by `time_scale`
    pub fn delay(&self, ms: u64) -> Duration {
        Duration::from_nanos((ms as f64 * self.time_scale * 1_000_000.0).round() as u64)
    }

    pub fn dispatch_interval(&self) -> Duration {
        self.delay(self.dispatch_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        self.delay(self.max_poll_interval_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }
}
