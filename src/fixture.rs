//! Scripted in-memory document
//!
//! A [`ScriptedDocument`] walks through a list of [`Stage`]s the way the real
//! checkout walks through pages: each stage exposes a set of elements and
//! moves on when a trigger fires (a click, a field being set, or a number of
//! element lookups). Every click, fill and scroll is logged so tests can
//! assert on exactly what the sequencer did. `--dry-run` drives the same fixture.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::document::{Document, Locator};
use crate::error::{Error, Result};
use crate::inject::NOTIFY_EVENTS;
use crate::selectors::*;

/// What moves a stage on to the next one
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Any click on the locator
    Click(Locator),
    /// The locator's value being set
    Set(Locator),
    /// The n-th `count` call made while the stage is current
    Lookups(u32),
}

/// One page state
#[derive(Debug, Clone, Default)]
pub struct Stage {
    name: String,
    elements: HashMap<Locator, usize>,
    texts: HashMap<Locator, Vec<String>>,
    advance: Option<Trigger>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Expose one element
    pub fn with(self, locator: Locator) -> Self {
        self.with_count(locator, 1)
    }

    pub fn with_all(mut self, locators: &[Locator]) -> Self {
        for locator in locators {
            self.elements.insert(*locator, 1);
        }
        self
    }

    /// Expose `count` elements matching `locator`
    pub fn with_count(mut self, locator: Locator, count: usize) -> Self {
        self.elements.insert(locator, count);
        self
    }

    /// Add a text node (also makes the locator present)
    pub fn with_text(mut self, locator: Locator, text: impl Into<String>) -> Self {
        let texts = self.texts.entry(locator).or_default();
        texts.push(text.into());
        let n = texts.len();
        self.elements.insert(locator, n);
        self
    }

    pub fn advance_on(mut self, trigger: Trigger) -> Self {
        self.advance = Some(trigger);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Something the sequencer did to the document
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { locator: Locator, index: usize },
    Set { locator: Locator, value: String },
    Scroll(f64),
}

#[derive(Debug, Default)]
struct Inner {
    stages: Vec<Stage>,
    current: usize,
    lookups: u32,
    values: HashMap<Locator, String>,
    events: Vec<(Locator, &'static str)>,
    actions: Vec<Action>,
    rejecting: HashSet<Locator>,
}

impl Inner {
    fn stage(&self) -> Option<&Stage> {
        self.stages.get(self.current)
    }

    fn count(&self, locator: &Locator) -> usize {
        self.stage()
            .and_then(|s| s.elements.get(locator))
            .copied()
            .unwrap_or(0)
    }

    fn fire(&mut self, trigger: &Trigger) {
        let hit = self.stage().and_then(|s| s.advance.as_ref()) == Some(trigger);
        if hit && self.current + 1 < self.stages.len() {
            self.current += 1;
            self.lookups = 0;
            tracing::debug!(stage = self.current, name = %self.stages[self.current].name, "fixture advanced");
        }
    }
}

/// In-memory [`Document`] driven by scripted stages
#[derive(Debug, Default)]
pub struct ScriptedDocument {
    inner: Mutex<Inner>,
}

impl ScriptedDocument {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                stages,
                ..Default::default()
            }),
        }
    }

    /// A single page that never changes
    pub fn static_page(stage: Stage) -> Self {
        Self::new(vec![stage])
    }

    /// The whole checkout, page by page, quoting `delivery` in the
    /// fulfillment section
    pub fn checkout(delivery: &str) -> Self {
        Self::new(checkout_stages(delivery, false))
    }

    /// Make `set_value` on `locator` leave the field unchanged, as a
    /// framework that rejects the input would
    pub fn reject_input(&self, locator: Locator) {
        self.lock().rejecting.insert(locator);
    }

    /// Zero-based index of the current stage
    pub fn stage(&self) -> usize {
        self.lock().current
    }

    pub fn stage_name(&self) -> String {
        let inner = self.lock();
        inner.stage().map(|s| s.name.clone()).unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        let inner = self.lock();
        inner.current + 1 == inner.stages.len()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    pub fn clicks(&self, locator: &Locator) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| matches!(a, Action::Click { locator: l, .. } if l == locator))
            .count()
    }

    pub fn sets(&self, locator: &Locator) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| matches!(a, Action::Set { locator: l, .. } if l == locator))
            .count()
    }

    /// Current field value as the framework sees it
    pub fn value(&self, locator: &Locator) -> Option<String> {
        self.lock().values.get(locator).cloned()
    }

    /// Events dispatched on `locator`, in order
    pub fn events(&self, locator: &Locator) -> Vec<&'static str> {
        self.lock()
            .events
            .iter()
            .filter(|(l, _)| l == locator)
            .map(|(_, e)| *e)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning only follows a panic in another test thread
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Document for ScriptedDocument {
    async fn count(&self, locator: &Locator) -> Result<usize> {
        let mut inner = self.lock();
        let n = inner.count(locator);
        inner.lookups += 1;
        let lookups = inner.lookups;
        inner.fire(&Trigger::Lookups(lookups));
        Ok(n)
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<()> {
        let mut inner = self.lock();
        if index >= inner.count(locator) {
            return Err(Error::ElementNotFound(locator.to_string()));
        }
        inner.actions.push(Action::Click {
            locator: *locator,
            index,
        });
        inner.fire(&Trigger::Click(*locator));
        Ok(())
    }

    async fn set_value(&self, locator: &Locator, value: &str) -> Result<String> {
        let mut inner = self.lock();
        if inner.count(locator) == 0 {
            return Err(Error::ElementNotFound(locator.to_string()));
        }
        inner.actions.push(Action::Set {
            locator: *locator,
            value: value.to_string(),
        });
        if !inner.rejecting.contains(locator) {
            inner.values.insert(*locator, value.to_string());
        }
        for event in NOTIFY_EVENTS {
            inner.events.push((*locator, event));
        }
        let actual = inner.values.get(locator).cloned().unwrap_or_default();
        inner.fire(&Trigger::Set(*locator));
        Ok(actual)
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let inner = self.lock();
        Ok(inner
            .stage()
            .and_then(|s| s.texts.get(locator))
            .cloned()
            .unwrap_or_default())
    }

    async fn scroll_to(&self, fraction: f64) -> Result<()> {
        self.lock().actions.push(Action::Scroll(fraction));
        Ok(())
    }
}

/// Pages of a guest checkout, in the order the site shows them.
///
/// After the shipping address is entered the fulfillment section re-renders,
/// so the continue button and the delivery quote only appear once the page
/// has been looked at again.
pub fn checkout_stages(delivery: &str, other_payments: bool) -> Vec<Stage> {
    let mut stages = vec![
        Stage::new("product")
            .with_count(COVERAGE_OPTIONS, 3)
            .with(ADD_TO_CART)
            .advance_on(Trigger::Click(ADD_TO_CART)),
        Stage::new("bag")
            .with(PROCEED)
            .advance_on(Trigger::Click(PROCEED)),
    ];
    if other_payments {
        stages.push(
            Stage::new("checkout-options")
                .with(OTHER_PAYMENTS)
                .advance_on(Trigger::Click(OTHER_PAYMENTS)),
        );
    }
    stages.extend([
        Stage::new("sign-in")
            .with(GUEST_LOGIN)
            .advance_on(Trigger::Click(GUEST_LOGIN)),
        Stage::new("shipping-address")
            .with_all(&SHIPPING_FIELDS)
            .advance_on(Trigger::Set(SHIPPING_PHONE)),
        Stage::new("fulfillment-loading").advance_on(Trigger::Lookups(1)),
        Stage::new("fulfillment")
            .with(CONTINUE)
            .with_text(DELIVERY_TEXT, delivery)
            .advance_on(Trigger::Click(CONTINUE)),
        Stage::new("billing-options")
            .with(BILLING_CREDIT)
            .advance_on(Trigger::Click(BILLING_CREDIT)),
        Stage::new("card")
            .with_all(&CARD_FIELDS)
            .advance_on(Trigger::Set(CARD_SECURITY_CODE)),
        Stage::new("same-as-shipping")
            .with(SHIPPING_CHECKBOX)
            .advance_on(Trigger::Click(SHIPPING_CHECKBOX)),
        Stage::new("billing-address")
            .with_all(&BILLING_FIELDS)
            .with(CONTINUE)
            .advance_on(Trigger::Click(CONTINUE)),
        Stage::new("review")
            .with(CONTINUE)
            .advance_on(Trigger::Click(CONTINUE)),
        Stage::new("confirmation"),
    ]);
    stages
}
