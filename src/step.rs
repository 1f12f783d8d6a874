//! Checkout steps and one-shot run state

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::Locator;
use crate::selectors;

/// One automatable action in the checkout flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Coverage,
    AddToCart,
    Proceed,
    OtherPayments,
    GuestLogin,
    ShippingContinue,
    ShippingForm,
    BillingCredit,
    CardForm,
    ShippingCheckbox,
    BillingAddress,
    FirstContinue,
    FinalContinue,
}

impl Step {
    /// Steps the dispatcher checks, highest priority first
    pub const DISPATCH_ORDER: [Step; 9] = [
        Step::Coverage,
        Step::Proceed,
        Step::OtherPayments,
        Step::GuestLogin,
        Step::ShippingContinue,
        Step::ShippingForm,
        Step::BillingCredit,
        Step::CardForm,
        Step::ShippingCheckbox,
    ];

    pub const ALL: [Step; 13] = [
        Step::Coverage,
        Step::AddToCart,
        Step::Proceed,
        Step::OtherPayments,
        Step::GuestLogin,
        Step::ShippingContinue,
        Step::ShippingForm,
        Step::BillingCredit,
        Step::CardForm,
        Step::ShippingCheckbox,
        Step::BillingAddress,
        Step::FirstContinue,
        Step::FinalContinue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Coverage => "coverage",
            Step::AddToCart => "add-to-cart",
            Step::Proceed => "proceed",
            Step::OtherPayments => "other-payments",
            Step::GuestLogin => "guest-login",
            Step::ShippingContinue => "shipping-continue",
            Step::ShippingForm => "shipping-form",
            Step::BillingCredit => "billing-credit",
            Step::CardForm => "card-form",
            Step::ShippingCheckbox => "shipping-checkbox",
            Step::BillingAddress => "billing-address",
            Step::FirstContinue => "first-continue",
            Step::FinalContinue => "final-continue",
        }
    }

    /// Dispatch priority (1 is checked first), `None` for chain-only steps
    pub fn priority(&self) -> Option<usize> {
        Self::DISPATCH_ORDER
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
    }

    /// Element whose presence makes the step ready
    pub fn target(&self) -> Locator {
        match self {
            Step::Coverage => selectors::COVERAGE_OPTIONS,
            Step::AddToCart => selectors::ADD_TO_CART,
            Step::Proceed => selectors::PROCEED,
            Step::OtherPayments => selectors::OTHER_PAYMENTS,
            Step::GuestLogin => selectors::GUEST_LOGIN,
            Step::ShippingContinue | Step::FirstContinue | Step::FinalContinue => {
                selectors::CONTINUE
            }
            Step::ShippingForm => selectors::SHIPPING_FIRST_NAME,
            Step::BillingCredit => selectors::BILLING_CREDIT,
            Step::CardForm => selectors::CARD_NUMBER,
            Step::ShippingCheckbox => selectors::SHIPPING_CHECKBOX,
            Step::BillingAddress => selectors::BILLING_FIRST_NAME,
        }
    }

    /// Only reachable through a chain, never from the dispatcher
    pub fn is_chained(&self) -> bool {
        self.priority().is_none()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion flags for one run.
///
/// A flag is set once and never cleared.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    done: HashSet<Step>,
    order: Vec<Step>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, step: Step) -> bool {
        self.done.contains(&step)
    }

    /// Set the flag for `step`. Returns `false` if it was already set.
    pub fn mark(&mut self, step: Step) -> bool {
        if self.done.insert(step) {
            self.order.push(step);
            true
        } else {
            false
        }
    }

    /// Steps in the order their flags were set
    pub fn completed(&self) -> &[Step] {
        &self.order
    }

    /// Shipping form milestone
    pub fn form_filled(&self) -> bool {
        self.is_done(Step::ShippingForm)
    }

    /// Card form milestone
    pub fn payment_filled(&self) -> bool {
        self.is_done(Step::CardForm)
    }

    pub fn is_complete(&self) -> bool {
        self.is_done(Step::FinalContinue)
    }
}
