//! Checkout flow tests against the scripted document
//!
//! These run on a paused clock, so the real-world delays cost nothing.

use orderbot::fixture::{checkout_stages, Action, Trigger};
use orderbot::selectors::*;
use orderbot::{
    DeliveryTarget, Error, Outcome, Profile, RunConfig, ScriptedDocument, Sequencer, Stage, Step,
    Tick, Timing,
};

fn config() -> RunConfig {
    RunConfig {
        timing: Timing {
            max_poll_attempts: 10,
            max_idle_ticks: 5,
            gate_patience: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Every element of every page at once
fn everything() -> Stage {
    Stage::new("everything")
        .with_count(COVERAGE_OPTIONS, 3)
        .with(ADD_TO_CART)
        .with(PROCEED)
        .with(OTHER_PAYMENTS)
        .with(GUEST_LOGIN)
        .with(CONTINUE)
        .with_all(&SHIPPING_FIELDS)
        .with(BILLING_CREDIT)
        .with_all(&CARD_FIELDS)
        .with(SHIPPING_CHECKBOX)
        .with_all(&BILLING_FIELDS)
}

fn field_values(profile: &Profile) -> Vec<(orderbot::Locator, String)> {
    vec![
        (SHIPPING_FIRST_NAME, profile.first_name.clone()),
        (SHIPPING_LAST_NAME, profile.last_name.clone()),
        (SHIPPING_STREET, profile.street_address.clone()),
        (SHIPPING_POSTAL_CODE, profile.postal_code.clone()),
        (SHIPPING_EMAIL, profile.email.clone()),
        (SHIPPING_PHONE, profile.phone.clone()),
        (CARD_NUMBER, profile.card_number.clone()),
        (CARD_EXPIRATION, profile.expiration.clone()),
        (CARD_SECURITY_CODE, profile.security_code.clone()),
        (BILLING_FIRST_NAME, profile.first_name.clone()),
        (BILLING_LAST_NAME, profile.last_name.clone()),
        (BILLING_STREET, profile.street_address.clone()),
        (BILLING_POSTAL_CODE, profile.postal_code.clone()),
    ]
}

// === One-shot steps ===

#[tokio::test(start_paused = true)]
async fn test_click_steps_fire_once() {
    for step in [
        Step::Proceed,
        Step::OtherPayments,
        Step::GuestLogin,
        Step::BillingCredit,
    ] {
        let target = step.target();
        let doc = ScriptedDocument::static_page(Stage::new("page").with(target));
        let config = config();
        let mut seq = Sequencer::new(&doc, &config).unwrap();

        assert_eq!(seq.handle(step).await.unwrap(), Tick::Fired(step));
        assert_eq!(seq.handle(step).await.unwrap(), Tick::Idle);
        assert_eq!(doc.clicks(&target), 1, "{} clicked more than once", step);
        assert!(seq.state().is_done(step));
    }
}

#[tokio::test(start_paused = true)]
async fn test_form_is_filled_once() {
    let doc = ScriptedDocument::static_page(Stage::new("shipping").with_all(&SHIPPING_FIELDS));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(
        seq.handle(Step::ShippingForm).await.unwrap(),
        Tick::Fired(Step::ShippingForm)
    );
    assert_eq!(seq.handle(Step::ShippingForm).await.unwrap(), Tick::Idle);
    assert_eq!(seq.tick().await.unwrap(), Tick::Idle);

    for field in SHIPPING_FIELDS {
        assert_eq!(doc.sets(&field), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_present_element_is_not_dispatched_twice() {
    let doc = ScriptedDocument::static_page(Stage::new("bag").with(PROCEED));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::Proceed));
    assert_eq!(seq.tick().await.unwrap(), Tick::Idle);
    assert_eq!(seq.tick().await.unwrap(), Tick::Idle);
    assert_eq!(doc.clicks(&PROCEED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_chained_and_gated_steps_fire_once() {
    let cases = [
        (
            Step::Coverage,
            Stage::new("product")
                .with_count(COVERAGE_OPTIONS, 3)
                .with(ADD_TO_CART),
        ),
        (Step::ShippingContinue, fulfillment("Delivers Fri, Sep 19")),
        (Step::CardForm, everything()),
        (
            Step::ShippingCheckbox,
            Stage::new("same-as-shipping")
                .with(SHIPPING_CHECKBOX)
                .with(CONTINUE),
        ),
    ];
    for (step, stage) in cases {
        let doc = ScriptedDocument::static_page(stage);
        let config = config();
        let mut seq = Sequencer::new(&doc, &config).unwrap();

        assert_eq!(seq.handle(step).await.unwrap(), Tick::Fired(step));
        let actions = doc.actions().len();
        assert_eq!(seq.handle(step).await.unwrap(), Tick::Idle);
        assert_eq!(doc.actions().len(), actions, "{} acted again", step);
        assert!(seq.state().is_done(step));
    }
}

#[tokio::test(start_paused = true)]
async fn test_each_chained_element_is_acted_on_once() {
    let doc = ScriptedDocument::static_page(everything());
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    seq.handle(Step::Coverage).await.unwrap();
    seq.handle(Step::CardForm).await.unwrap();
    seq.handle(Step::Coverage).await.unwrap();
    seq.handle(Step::CardForm).await.unwrap();

    assert_eq!(doc.clicks(&COVERAGE_OPTIONS), 1);
    assert_eq!(doc.clicks(&ADD_TO_CART), 1);
    assert_eq!(doc.clicks(&SHIPPING_CHECKBOX), 1);
    // First and final continue
    assert_eq!(doc.clicks(&CONTINUE), 2);
    for field in CARD_FIELDS.iter().chain(&BILLING_FIELDS) {
        assert_eq!(doc.sets(field), 1, "{}", field);
    }
}

#[tokio::test(start_paused = true)]
async fn test_card_form_does_not_untick_dispatched_checkbox() {
    let doc = ScriptedDocument::static_page(
        Stage::new("card")
            .with_all(&CARD_FIELDS)
            .with(SHIPPING_CHECKBOX)
            .with_all(&BILLING_FIELDS)
            .with(CONTINUE),
    );
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(
        seq.handle(Step::ShippingCheckbox).await.unwrap(),
        Tick::Fired(Step::ShippingCheckbox)
    );
    assert_eq!(
        seq.handle(Step::CardForm).await.unwrap(),
        Tick::Fired(Step::CardForm)
    );

    assert_eq!(doc.clicks(&SHIPPING_CHECKBOX), 1);
    assert!(seq.state().is_done(Step::BillingAddress));
    assert!(seq.state().is_complete());
}

// === Re-rendering ===

#[tokio::test(start_paused = true)]
async fn test_click_retried_when_element_rerenders() {
    // The button is seen, then swapped out before the click lands
    let doc = ScriptedDocument::new(vec![
        Stage::new("bag")
            .with(PROCEED)
            .advance_on(Trigger::Lookups(3)),
        Stage::new("rerendering").advance_on(Trigger::Lookups(1)),
        Stage::new("bag-rerendered").with(PROCEED),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::Proceed));
    assert_eq!(doc.stage_name(), "bag-rerendered");
    assert_eq!(doc.clicks(&PROCEED), 1);
    assert!(seq.state().is_done(Step::Proceed));
    assert_eq!(seq.report().completed(), vec![Step::Proceed]);
}

#[tokio::test(start_paused = true)]
async fn test_fill_retried_when_field_rerenders() {
    // Six lookups to see the form, the seventh finds the first field just
    // before it is swapped out
    let doc = ScriptedDocument::new(vec![
        Stage::new("shipping")
            .with_all(&SHIPPING_FIELDS)
            .advance_on(Trigger::Lookups(7)),
        Stage::new("shipping-rerendering").advance_on(Trigger::Lookups(1)),
        Stage::new("shipping-rerendered").with_all(&SHIPPING_FIELDS),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(
        seq.handle(Step::ShippingForm).await.unwrap(),
        Tick::Fired(Step::ShippingForm)
    );
    assert_eq!(doc.sets(&SHIPPING_FIRST_NAME), 1);
    assert_eq!(
        doc.value(&SHIPPING_FIRST_NAME).as_deref(),
        Some(config.profile.first_name.as_str())
    );
    assert!(seq.state().form_filled());
}

#[tokio::test(start_paused = true)]
async fn test_vanished_element_is_not_marked_done() {
    // Seen by the dispatcher, gone for good before the click
    let doc = ScriptedDocument::new(vec![
        Stage::new("bag")
            .with(PROCEED)
            .advance_on(Trigger::Lookups(3)),
        Stage::new("elsewhere"),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.tick().await.unwrap_err();
    assert!(matches!(err, Error::StepTimeout { ref step, .. } if step == "proceed"));
    assert!(!seq.state().is_done(Step::Proceed));
    assert!(seq.report().completed().is_empty());
}

// === Page errors and popups ===

#[tokio::test(start_paused = true)]
async fn test_page_error_ends_run() {
    let doc = ScriptedDocument::new(vec![
        Stage::new("bag")
            .with(PROCEED)
            .advance_on(Trigger::Click(PROCEED)),
        Stage::new("sign-in")
            .with(GUEST_LOGIN)
            .with_text(PAGE_ERROR, "Something went wrong. Please try again."),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.run().await.unwrap_err();
    assert_eq!(err.kind(), "unexpected_page_state");
    assert!(err.to_string().contains("Something went wrong"));
    assert_eq!(doc.clicks(&GUEST_LOGIN), 0);
    assert_eq!(seq.report().completed(), vec![Step::Proceed]);
}

#[tokio::test(start_paused = true)]
async fn test_popup_dismissed_then_run_continues() {
    let doc = ScriptedDocument::new(vec![
        Stage::new("bag")
            .with(PROCEED)
            .advance_on(Trigger::Click(PROCEED)),
        Stage::new("promo")
            .with(POPUP_CLOSE)
            .advance_on(Trigger::Click(POPUP_CLOSE)),
        Stage::new("sign-in").with(GUEST_LOGIN),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::Proceed));
    assert_eq!(seq.tick().await.unwrap(), Tick::Dismissed);
    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::GuestLogin));
    assert_eq!(doc.clicks(&POPUP_CLOSE), 1);
}

// === Dispatch order ===

#[tokio::test(start_paused = true)]
async fn test_highest_priority_step_wins() {
    let doc = ScriptedDocument::static_page(everything());
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let expected = [
        Step::Coverage,
        Step::Proceed,
        Step::OtherPayments,
        Step::GuestLogin,
        Step::ShippingContinue,
        Step::ShippingForm,
        Step::BillingCredit,
        Step::CardForm,
    ];
    for step in expected {
        assert_eq!(seq.tick().await.unwrap(), Tick::Fired(step));
    }
    assert!(seq.state().is_complete());
    assert_eq!(seq.tick().await.unwrap(), Tick::Idle);

    assert_eq!(
        seq.state().completed(),
        &[
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
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guest_login_waits_for_proceed() {
    let doc = ScriptedDocument::static_page(
        Stage::new("mixed").with(GUEST_LOGIN).with(PROCEED),
    );
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    seq.tick().await.unwrap();
    assert_eq!(
        doc.actions(),
        vec![Action::Click {
            locator: PROCEED,
            index: 0
        }]
    );
}

// === Delivery gate ===

fn fulfillment(quote: &str) -> Stage {
    Stage::new("fulfillment")
        .with(CONTINUE)
        .with_text(DELIVERY_TEXT, quote)
}

#[tokio::test(start_paused = true)]
async fn test_target_date_continues() {
    let doc = ScriptedDocument::static_page(fulfillment("Delivers Fri, Sep 19 - Free"));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::ShippingContinue));
    assert_eq!(doc.clicks(&CONTINUE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_other_date_holds_and_repolls() {
    let doc = ScriptedDocument::static_page(fulfillment("Delivers Sat, Sep 20 - Free"));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Blocked(Step::ShippingContinue));
    assert_eq!(seq.tick().await.unwrap(), Tick::Blocked(Step::ShippingContinue));
    assert_eq!(doc.clicks(&CONTINUE), 0);
    assert!(!seq.state().is_done(Step::ShippingContinue));
}

#[tokio::test(start_paused = true)]
async fn test_gate_opens_when_quote_changes() {
    // Each tick looks up coverage, proceed, other payments, guest login and
    // the continue button, then the continue button again in the handler
    let doc = ScriptedDocument::new(vec![
        fulfillment("Delivers Sat, Sep 20").advance_on(Trigger::Lookups(7)),
        fulfillment("Delivers Fri, Sep 19"),
    ]);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Blocked(Step::ShippingContinue));
    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::ShippingContinue));
    assert_eq!(doc.clicks(&CONTINUE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gate_patience_ends_run() {
    let doc = ScriptedDocument::static_page(fulfillment("Delivers Sep 20"));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.run().await.unwrap_err();
    match &err {
        Error::UnexpectedPageState { step, .. } => assert_eq!(step, "shipping-continue"),
        other => panic!("expected UnexpectedPageState, got {:?}", other),
    }
    assert!(matches!(seq.report().outcome, Outcome::Failed { .. }));
    assert_eq!(doc.clicks(&CONTINUE), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_gate_accepts_any_date() {
    let doc = ScriptedDocument::static_page(fulfillment("Delivers Oct 2"));
    let config = RunConfig {
        delivery: None,
        ..config()
    };
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::ShippingContinue));
}

#[tokio::test(start_paused = true)]
async fn test_custom_target_date() {
    let doc = ScriptedDocument::static_page(fulfillment("Delivers Wed, Oct 2"));
    let config = RunConfig {
        delivery: Some(DeliveryTarget {
            month: "Oct".into(),
            day: 2,
        }),
        ..config()
    };
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    assert_eq!(seq.tick().await.unwrap(), Tick::Fired(Step::ShippingContinue));
}

// === Field values ===

#[tokio::test(start_paused = true)]
async fn test_fields_hold_profile_values() {
    let doc = ScriptedDocument::static_page(everything());
    let config = RunConfig {
        profile: Profile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            street_address: "12 St James's Square".into(),
            email: "ada@example.org".into(),
            phone: "5551234567".into(),
            postal_code: "10001".into(),
            card_number: "5555555555554444".into(),
            expiration: "1230".into(),
            security_code: "987".into(),
        },
        ..config()
    };
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    seq.handle(Step::ShippingForm).await.unwrap();
    seq.handle(Step::CardForm).await.unwrap();

    for (field, expected) in field_values(&config.profile) {
        assert_eq!(doc.value(&field).as_deref(), Some(expected.as_str()), "{}", field);
        assert_eq!(doc.events(&field), vec!["input", "change", "blur"], "{}", field);
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejected_shipping_value_fails_step() {
    let doc = ScriptedDocument::static_page(Stage::new("shipping").with_all(&SHIPPING_FIELDS));
    doc.reject_input(SHIPPING_EMAIL);
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.handle(Step::ShippingForm).await.unwrap_err();
    match err {
        Error::ActionRejected {
            field,
            expected,
            actual,
        } => {
            assert!(field.contains("emailAddress"));
            assert_eq!(expected, "test@example.com");
            assert_eq!(actual, "");
        }
        other => panic!("expected ActionRejected, got {:?}", other),
    }
    // Fields after the rejected one are left alone
    assert_eq!(doc.sets(&SHIPPING_PHONE), 0);
}

// === Stalls ===

#[tokio::test(start_paused = true)]
async fn test_missing_element_times_out_without_acting() {
    for step in [Step::Proceed, Step::ShippingForm, Step::CardForm] {
        let doc = ScriptedDocument::static_page(Stage::new("blank"));
        let config = config();
        let mut seq = Sequencer::new(&doc, &config).unwrap();

        match seq.handle(step).await.unwrap_err() {
            Error::StepTimeout {
                step: name,
                attempts,
                ..
            } => {
                assert_eq!(name, step.name());
                assert_eq!(attempts, 10);
            }
            other => panic!("expected StepTimeout for {}, got {:?}", step, other),
        }
        assert!(doc.actions().is_empty(), "{} acted on a blank page", step);
        assert!(!seq.state().is_done(step));
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_chain_target_times_out() {
    // Card form is present but the page never shows the checkbox
    let doc = ScriptedDocument::static_page(Stage::new("card").with_all(&CARD_FIELDS));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.handle(Step::CardForm).await.unwrap_err();
    assert!(
        matches!(err, Error::StepTimeout { ref step, .. } if step == "shipping-checkbox"),
        "{:?}",
        err
    );
    assert!(seq.state().is_done(Step::CardForm));
    assert!(!seq.state().is_done(Step::ShippingCheckbox));
}

// === Full runs ===

#[tokio::test(start_paused = true)]
async fn test_full_checkout() {
    let doc = ScriptedDocument::checkout("Delivers Fri, Sep 19");
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    seq.run().await.unwrap();

    assert!(doc.is_finished());
    assert_eq!(doc.stage_name(), "confirmation");
    let report = seq.report();
    assert!(report.is_success());
    assert_eq!(
        report.completed(),
        vec![
            Step::Coverage,
            Step::AddToCart,
            Step::Proceed,
            Step::GuestLogin,
            Step::ShippingForm,
            Step::ShippingContinue,
            Step::BillingCredit,
            Step::CardForm,
            Step::ShippingCheckbox,
            Step::BillingAddress,
            Step::FirstContinue,
            Step::FinalContinue,
        ]
    );
    assert!(report.steps.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
    assert_eq!(doc.clicks(&SHIPPING_CHECKBOX), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_checkout_through_other_payments() {
    let doc = ScriptedDocument::new(checkout_stages("Delivers Fri, Sep 19", true));
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    seq.run().await.unwrap();

    assert!(doc.is_finished());
    let completed = seq.report().completed();
    assert_eq!(completed.len(), Step::ALL.len());
    assert_eq!(&completed[2..4], &[Step::Proceed, Step::OtherPayments]);
}

#[tokio::test(start_paused = true)]
async fn test_late_delivery_stops_before_payment() {
    let doc = ScriptedDocument::checkout("Delivers Mon, Sep 22");
    let config = config();
    let mut seq = Sequencer::new(&doc, &config).unwrap();

    let err = seq.run().await.unwrap_err();
    assert_eq!(err.kind(), "unexpected_page_state");
    assert_eq!(doc.stage_name(), "fulfillment");
    assert!(seq.state().form_filled());
    assert!(!seq.state().is_done(Step::BillingCredit));
    assert_eq!(doc.sets(&CARD_NUMBER), 0);
}
