//! Polling action sequencer
//!
//! A dispatcher checks the dispatchable steps in priority order and runs the
//! first one whose flag is unset and whose element is present. Each handler
//! polls for its element with a bounded [`Poller`], acts once, and either
//! returns to the dispatcher after a settle delay or chains straight into the
//! next handler where the flow is strictly linear:
//!
//! - coverage → add to cart
//! - card form → shipping checkbox → billing address → first continue →
//!   final continue
//!
//! A step's flag is set only once its click or fill has gone through. An
//! element that vanishes between the poll and the action (the page
//! re-rendering) is polled for again.
//!
//! Every tick first looks for a rendered page error and fails the run with
//! [`Error::UnexpectedPageState`] if one is showing. When no step is ready, a
//! visible popup close button is clicked instead.
//!
//! The run ends when the final continue is clicked. It fails when a handler
//! exhausts its poll budget, the delivery gate stays blocked for
//! `gate_patience` ticks, or nothing becomes ready for `max_idle_ticks`.

use tokio::time::{sleep, Instant};

use crate::config::{mask_card, Profile, RunConfig, Timing};
use crate::delivery::{DeliveryGate, GateVerdict};
use crate::document::{Document, Locator};
use crate::error::{Error, Result};
use crate::report::{Outcome, RunReport};
use crate::selectors::*;
use crate::step::{RunState, Step};
use crate::wait::Poller;

// Poll intervals (ms)
const CLICK_POLL: u64 = 100;
const SHIPPING_FORM_POLL: u64 = 300;
const BILLING_CREDIT_POLL: u64 = 200;
const CARD_FORM_POLL: u64 = 1000;
const CHECKBOX_POLL: u64 = 200;
const BILLING_ADDRESS_POLL: u64 = 1000;
const CONTINUE_POLL: u64 = 500;

// Fixed delays (ms)
const HANDOFF: u64 = 200;
const SETTLE: u64 = 2000;
const BILLING_CREDIT_SETTLE: u64 = 5000;
const SHIPPING_FIELD_PAUSE: u64 = 200;
const PAYMENT_FIELD_PAUSE: u64 = 300;
const SHIPPING_CONTINUE_PAUSE: u64 = 300;
const FORM_CONTINUE_PAUSE: u64 = 500;
const CARD_TO_CHECKBOX: u64 = 1000;
const CHECKBOX_TO_CONTINUE: u64 = 300;
const CHECKBOX_TO_BILLING: u64 = 10_000;
const BILLING_TO_CONTINUE: u64 = 10_000;
const FIRST_TO_FINAL: u64 = 20_000;
const FINAL_SCROLL_PAUSE: u64 = 1000;
const POPUP_SETTLE: u64 = 1000;

/// Fraction of the page scrolled before picking a coverage option
const COVERAGE_SCROLL: f64 = 0.25;
const BOTTOM: f64 = 1.0;

/// Result of one dispatcher tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The step's handler ran, including any chain it started
    Fired(Step),
    /// The delivery gate held the step back; its flag stays unset
    Blocked(Step),
    /// No step was ready and a popup was closed
    Dismissed,
    /// No step was ready, or the handler had nothing left to do
    Idle,
}

/// How a handler was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dispatched,
    Chained,
}

/// Drives one checkout run against a [`Document`]
pub struct Sequencer<'a, D: Document + ?Sized> {
    doc: &'a D,
    profile: Profile,
    gate: Option<DeliveryGate>,
    timing: Timing,
    state: RunState,
    report: RunReport,
    started: Instant,
}

impl<'a, D: Document + ?Sized> Sequencer<'a, D> {
    pub fn new(doc: &'a D, config: &RunConfig) -> Result<Self> {
        let gate = config.delivery.clone().map(DeliveryGate::new).transpose()?;
        Ok(Self {
            doc,
            profile: config.profile.clone(),
            gate,
            timing: config.timing.clone(),
            state: RunState::new(),
            report: RunReport::new(config.product_url.clone()),
            started: Instant::now(),
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Tick until the final continue is clicked or the run fails.
    ///
    /// The outcome is recorded in the report either way.
    pub async fn run(&mut self) -> Result<()> {
        self.started = Instant::now();
        tracing::info!(url = %self.report.url, "checkout run started");

        let result = self.drive().await;
        let elapsed = self.started.elapsed();
        match &result {
            Ok(()) => {
                self.report.finish(Outcome::Completed, elapsed);
                tracing::info!(
                    steps = self.state.completed().len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "checkout run complete"
                );
            }
            Err(e) => self.report.fail(e, elapsed),
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let mut idle_ticks = 0u32;
        let mut blocked_ticks = 0u32;

        while !self.state.is_complete() {
            let tick = match self.tick().await {
                Ok(tick) => tick,
                // The page moved under a handler; look again next tick
                Err(e) if e.is_transient() => {
                    tracing::debug!(error = %e, "transient error during tick");
                    Tick::Idle
                }
                Err(e) => return Err(e),
            };

            match tick {
                Tick::Fired(_) => {
                    idle_ticks = 0;
                    blocked_ticks = 0;
                    continue;
                }
                Tick::Blocked(step) => {
                    blocked_ticks += 1;
                    if blocked_ticks >= self.timing.gate_patience {
                        return Err(Error::page_state(
                            step.name(),
                            format!(
                                "delivery date stayed off target for {} ticks",
                                blocked_ticks
                            ),
                        ));
                    }
                }
                Tick::Dismissed | Tick::Idle => {
                    idle_ticks += 1;
                    if idle_ticks >= self.timing.max_idle_ticks {
                        return Err(Error::page_state(
                            "dispatcher",
                            format!("no step became ready in {} ticks", idle_ticks),
                        ));
                    }
                    if tick == Tick::Dismissed {
                        continue;
                    }
                }
            }
            sleep(self.timing.dispatch_interval()).await;
        }
        Ok(())
    }

    /// Evaluate readiness in priority order and run the first ready step.
    ///
    /// Fails with [`Error::UnexpectedPageState`] when the page shows an error.
    pub async fn tick(&mut self) -> Result<Tick> {
        self.check_page_errors().await?;

        for step in Step::DISPATCH_ORDER {
            if self.state.is_done(step) {
                continue;
            }
            if step == Step::CardForm && !self.state.is_done(Step::BillingCredit) {
                continue;
            }
            if !self.present(&step.target()).await? {
                continue;
            }

            tracing::debug!(%step, priority = ?step.priority(), "dispatching");
            sleep(self.timing.delay(HANDOFF)).await;
            return self.handle(step).await;
        }

        if self.dismiss_popup().await? {
            return Ok(Tick::Dismissed);
        }

        tracing::debug!("no step ready");
        Ok(Tick::Idle)
    }

    /// Run the handler for `step` as the dispatcher would.
    ///
    /// A step whose flag is already set performs nothing.
    pub async fn handle(&mut self, step: Step) -> Result<Tick> {
        if self.state.is_done(step) {
            tracing::debug!(%step, "already done");
            return Ok(Tick::Idle);
        }

        match step {
            Step::Coverage => self.coverage().await?,
            Step::AddToCart | Step::Proceed | Step::OtherPayments | Step::GuestLogin => {
                self.click_step(step).await?
            }
            Step::ShippingContinue => {
                if !self.shipping_continue().await? {
                    return Ok(Tick::Blocked(step));
                }
            }
            Step::ShippingForm => self.shipping_form().await?,
            Step::BillingCredit => self.billing_credit().await?,
            Step::CardForm => self.card_form().await?,
            Step::ShippingCheckbox => self.shipping_checkbox(Mode::Dispatched).await?,
            Step::BillingAddress => self.billing_address().await?,
            Step::FirstContinue => self.first_continue().await?,
            Step::FinalContinue => self.final_continue().await?,
        }
        Ok(Tick::Fired(step))
    }

    async fn check_page_errors(&self) -> Result<()> {
        let texts = match self.doc.texts(&PAGE_ERROR).await {
            Ok(texts) => texts,
            Err(e) if e.is_transient() => return Ok(()),
            Err(e) => return Err(e),
        };
        match texts.iter().map(|t| t.trim()).find(|t| !t.is_empty()) {
            Some(message) => {
                tracing::error!(banner = message, "page error detected");
                Err(Error::page_state("page", format!("page shows an error: {}", message)))
            }
            None => Ok(()),
        }
    }

    async fn dismiss_popup(&self) -> Result<bool> {
        let shown = match self.doc.visible_count(&POPUP_CLOSE).await {
            Ok(n) => n > 0,
            Err(e) if e.is_transient() => false,
            Err(e) => return Err(e),
        };
        if !shown || !self.click_if_present(POPUP_CLOSE).await? {
            return Ok(false);
        }
        tracing::info!("closed popup");
        self.pause(POPUP_SETTLE).await;
        Ok(true)
    }

    // === Handlers ===

    async fn coverage(&mut self) -> Result<()> {
        let step = Step::Coverage;
        self.doc.scroll_to(COVERAGE_SCROLL).await?;
        self.click_when_ready(step, COVERAGE_OPTIONS, COVERAGE_CHOICE, CLICK_POLL)
            .await?;
        self.complete(step);
        self.click_step(Step::AddToCart).await
    }

    /// Poll for the step's element and click it
    async fn click_step(&mut self, step: Step) -> Result<()> {
        if self.state.is_done(step) {
            return Ok(());
        }
        self.click_when_ready(step, step.target(), 0, CLICK_POLL).await?;
        self.complete(step);
        Ok(())
    }

    /// Returns `false` when the delivery gate blocks the step
    async fn shipping_continue(&mut self) -> Result<bool> {
        let step = Step::ShippingContinue;
        self.wait_for(step, CONTINUE, CLICK_POLL).await?;

        if let Some(gate) = &self.gate {
            let texts = self.doc.texts(&DELIVERY_TEXT).await?;
            if let GateVerdict::Blocked { days } = gate.check(texts.as_slice()) {
                tracing::warn!(
                    %step,
                    target = %gate.target(),
                    ?days,
                    "delivery date off target, holding"
                );
                return Ok(false);
            }
        }

        self.doc.scroll_to(BOTTOM).await?;
        self.pause(SHIPPING_CONTINUE_PAUSE).await;
        self.click_when_ready(step, CONTINUE, 0, CLICK_POLL).await?;
        self.complete(step);
        self.pause(SETTLE).await;
        Ok(true)
    }

    async fn shipping_form(&mut self) -> Result<()> {
        let step = Step::ShippingForm;
        self.wait_for_all(step, &SHIPPING_FIELDS, SHIPPING_FORM_POLL).await?;

        let p = &self.profile;
        let values = [
            (SHIPPING_FIRST_NAME, p.first_name.clone()),
            (SHIPPING_LAST_NAME, p.last_name.clone()),
            (SHIPPING_STREET, p.street_address.clone()),
            (SHIPPING_POSTAL_CODE, p.postal_code.clone()),
            (SHIPPING_EMAIL, p.email.clone()),
            (SHIPPING_PHONE, p.phone.clone()),
        ];
        self.fill(step, &values, SHIPPING_FIELD_PAUSE, SHIPPING_FORM_POLL)
            .await?;
        self.complete(step);
        self.pause(SHIPPING_FIELD_PAUSE).await;

        if self.present(&CONTINUE).await? {
            self.doc.scroll_to(BOTTOM).await?;
            self.pause(FORM_CONTINUE_PAUSE).await;
            self.click_if_present(CONTINUE).await?;
        } else {
            tracing::debug!(%step, "no continue button after shipping form");
        }
        self.pause(SETTLE).await;
        Ok(())
    }

    async fn billing_credit(&mut self) -> Result<()> {
        let step = Step::BillingCredit;
        self.click_when_ready(step, BILLING_CREDIT, 0, BILLING_CREDIT_POLL)
            .await?;
        self.complete(step);
        self.pause(BILLING_CREDIT_SETTLE).await;
        Ok(())
    }

    async fn card_form(&mut self) -> Result<()> {
        let step = Step::CardForm;
        self.wait_for_all(step, &CARD_FIELDS, CARD_FORM_POLL).await?;

        let p = &self.profile;
        let values = [
            (CARD_NUMBER, p.card_number.clone()),
            (CARD_EXPIRATION, p.expiration.clone()),
            (CARD_SECURITY_CODE, p.security_code.clone()),
        ];
        self.fill(step, &values, PAYMENT_FIELD_PAUSE, CARD_FORM_POLL)
            .await?;
        self.complete(step);

        self.pause(CARD_TO_CHECKBOX).await;
        self.shipping_checkbox(Mode::Chained).await
    }

    async fn shipping_checkbox(&mut self, mode: Mode) -> Result<()> {
        let step = Step::ShippingCheckbox;

        // A second click would untick it
        if self.state.is_done(step) {
            self.wait_for(step, SHIPPING_CHECKBOX, CHECKBOX_POLL).await?;
        } else {
            self.click_when_ready(step, SHIPPING_CHECKBOX, 0, CHECKBOX_POLL)
                .await?;
            self.complete(step);
        }

        match mode {
            Mode::Chained => {
                self.pause(CHECKBOX_TO_BILLING).await;
                self.billing_address().await
            }
            Mode::Dispatched => {
                self.pause(CHECKBOX_TO_CONTINUE).await;
                if self.present(&CONTINUE).await? {
                    self.doc.scroll_to(BOTTOM).await?;
                    self.pause(FORM_CONTINUE_PAUSE).await;
                    self.click_if_present(CONTINUE).await?;
                }
                self.pause(SETTLE).await;
                Ok(())
            }
        }
    }

    async fn billing_address(&mut self) -> Result<()> {
        let step = Step::BillingAddress;
        if self.state.is_done(step) {
            return Ok(());
        }
        self.wait_for_all(step, &BILLING_FIELDS, BILLING_ADDRESS_POLL).await?;

        let p = &self.profile;
        let values = [
            (BILLING_FIRST_NAME, p.first_name.clone()),
            (BILLING_LAST_NAME, p.last_name.clone()),
            (BILLING_STREET, p.street_address.clone()),
            (BILLING_POSTAL_CODE, p.postal_code.clone()),
        ];
        self.fill(step, &values, PAYMENT_FIELD_PAUSE, BILLING_ADDRESS_POLL)
            .await?;
        self.complete(step);
        self.doc.scroll_to(BOTTOM).await?;

        self.pause(BILLING_TO_CONTINUE).await;
        self.first_continue().await
    }

    async fn first_continue(&mut self) -> Result<()> {
        let step = Step::FirstContinue;
        if self.state.is_done(step) {
            return Ok(());
        }
        self.click_when_ready(step, CONTINUE, 0, CONTINUE_POLL).await?;
        self.complete(step);

        self.pause(FIRST_TO_FINAL).await;
        self.final_continue().await
    }

    async fn final_continue(&mut self) -> Result<()> {
        let step = Step::FinalContinue;
        if self.state.is_done(step) {
            return Ok(());
        }
        self.doc.scroll_to(BOTTOM).await?;
        self.pause(FINAL_SCROLL_PAUSE).await;
        self.click_when_ready(step, CONTINUE, 0, CONTINUE_POLL).await?;
        self.complete(step);
        Ok(())
    }

    // === Helpers ===

    /// Set the step's flag. Returns `false` if it was already set.
    fn complete(&mut self, step: Step) -> bool {
        if !self.state.mark(step) {
            return false;
        }
        let at = self.started.elapsed();
        self.report.record(step, at);
        tracing::info!(%step, at_ms = at.as_millis() as u64, "step complete");
        true
    }

    async fn pause(&self, ms: u64) {
        sleep(self.timing.delay(ms)).await;
    }

    fn poller(&self, base_ms: u64) -> Poller {
        Poller::from_timing(&self.timing, base_ms)
    }

    /// Presence check where a transient error reads as "not there"
    async fn present(&self, locator: &Locator) -> Result<bool> {
        match self.doc.exists(locator).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_transient() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Click an optional element. Returns `false` if it vanished first.
    async fn click_if_present(&self, locator: Locator) -> Result<bool> {
        match self.doc.click(&locator, 0).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_transient() => {
                tracing::debug!(%locator, "gone before it could be clicked");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_for(&self, step: Step, locator: Locator, base_ms: u64) -> Result<()> {
        let doc = self.doc;
        self.poller(base_ms)
            .until(step.name(), &locator.to_string(), || async move {
                let found = doc.exists(&locator).await?;
                Ok::<_, Error>(found.then_some(()))
            })
            .await
    }

    async fn wait_for_all(&self, step: Step, locators: &[Locator], base_ms: u64) -> Result<()> {
        let doc = self.doc;
        let target = locators
            .iter()
            .map(Locator::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.poller(base_ms)
            .until(step.name(), &target, || async move {
                for locator in locators {
                    if !doc.exists(locator).await? {
                        return Ok(None);
                    }
                }
                Ok::<_, Error>(Some(()))
            })
            .await
    }

    /// Poll until the `index`-th match exists and a click on it lands
    async fn click_when_ready(
        &self,
        step: Step,
        locator: Locator,
        index: usize,
        base_ms: u64,
    ) -> Result<()> {
        let doc = self.doc;
        self.poller(base_ms)
            .until(step.name(), &locator.to_string(), || async move {
                if doc.count(&locator).await? <= index {
                    return Ok(None);
                }
                doc.click(&locator, index).await?;
                Ok::<_, Error>(Some(()))
            })
            .await
    }

    /// Poll until the field exists and a value can be set on it.
    ///
    /// Returns the value read back.
    async fn set_when_ready(
        &self,
        step: Step,
        locator: Locator,
        value: &str,
        base_ms: u64,
    ) -> Result<String> {
        let doc = self.doc;
        self.poller(base_ms)
            .until(step.name(), &locator.to_string(), || async move {
                if !doc.exists(&locator).await? {
                    return Ok(None);
                }
                let actual = doc.set_value(&locator, value).await?;
                Ok::<_, Error>(Some(actual))
            })
            .await
    }

    /// Set each field in turn, pausing between fields, and verify the value
    /// the framework ended up with
    async fn fill(
        &self,
        step: Step,
        fields: &[(Locator, String)],
        pause_ms: u64,
        poll_ms: u64,
    ) -> Result<()> {
        for (i, (locator, value)) in fields.iter().enumerate() {
            if i > 0 {
                self.pause(pause_ms).await;
            }
            let actual = self.set_when_ready(step, *locator, value, poll_ms).await?;
            if actual != *value {
                let redact = |v: &str| {
                    if CARD_FIELDS.contains(locator) {
                        mask_card(v)
                    } else {
                        v.to_string()
                    }
                };
                return Err(Error::ActionRejected {
                    field: locator.to_string(),
                    expected: redact(value),
                    actual: redact(&actual),
                });
            }
            tracing::debug!(field = %locator, "field set");
        }
        Ok(())
    }
}
