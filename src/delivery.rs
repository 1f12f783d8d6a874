//! Delivery-date gate for the shipping-continue step
//!
//! The fulfillment section renders text like `Delivers Fri, Sep 19 - Free`.
//! The gate only lets the flow continue when every quoted day for the target
//! month equals the target day. Pages that show no delivery quote at all pass.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Marker that identifies a delivery quote among the section titles
const DELIVERY_MARKER: &str = "Delivers";

/// Month abbreviation and day the order must be delivered on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub month: String,
    pub day: u32,
}

impl Default for DeliveryTarget {
    fn default() -> Self {
        Self {
            month: "Sep".into(),
            day: 19,
        }
    }
}

impl std::fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.month, self.day)
    }
}

/// Outcome of evaluating the gate against the rendered quotes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// No conflicting quote; the step may fire
    Pass,
    /// At least one quoted day differs from the target
    Blocked { days: Vec<u32> },
}

impl GateVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateVerdict::Pass)
    }
}

/// Compiled delivery-date predicate
#[derive(Debug, Clone)]
pub struct DeliveryGate {
    target: DeliveryTarget,
    pattern: Regex,
}

impl DeliveryGate {
    pub fn new(target: DeliveryTarget) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{}\s+(\d{{1,2}})", regex::escape(&target.month)))
            .map_err(|e| Error::Config(format!("delivery.month: {}", e)))?;
        Ok(Self { target, pattern })
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    /// Evaluate the gate over the texts of every delivery section title
    pub fn check<S: AsRef<str>>(&self, texts: &[S]) -> GateVerdict {
        let days: Vec<u32> = texts
            .iter()
            .map(|text| text.as_ref())
            .filter(|text| text.contains(DELIVERY_MARKER) && text.contains(&self.target.month))
            .flat_map(|text| self.pattern.captures_iter(text))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .filter(|&day| day != self.target.day)
            .collect();

        if days.is_empty() {
            GateVerdict::Pass
        } else {
            GateVerdict::Blocked { days }
        }
    }
}
