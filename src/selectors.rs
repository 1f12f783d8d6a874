//! Element identifiers on the checkout pages

use crate::document::Locator;

pub const COVERAGE_OPTIONS: Locator = Locator::Css(r#"input[name="applecare-options"]"#);
/// Zero-based index of the coverage radio that gets selected
pub const COVERAGE_CHOICE: usize = 2;

pub const ADD_TO_CART: Locator = Locator::Css(r#"[name="add-to-cart"]"#);
pub const PROCEED: Locator = Locator::Css(r#"[name="proceed"]"#);
pub const OTHER_PAYMENTS: Locator = Locator::Id("shoppingCart.actions.navCheckoutOtherPayments");
pub const GUEST_LOGIN: Locator = Locator::Id("signIn.guestLogin.guestLogin");
pub const CONTINUE: Locator = Locator::Id("rs-checkout-continue-button-bottom");
pub const DELIVERY_TEXT: Locator = Locator::Css(".rs-fulfillment-sectiontitle span");

/// Error and alert banners; any rendered one with text fails the run
pub const PAGE_ERROR: Locator = Locator::Css(r#"div[class*="error"], div[class*="alert"]"#);
/// Close buttons of dialogs and overlays that cover the checkout
pub const POPUP_CLOSE: Locator = Locator::Css(
    r#"button[aria-label="Close"], div[class*="modal"] button[class*="close"], div[class*="overlay"] button[class*="close"]"#,
);

pub const SHIPPING_FIRST_NAME: Locator =
    Locator::Id("checkout.shipping.addressSelector.newAddress.address.firstName");
pub const SHIPPING_LAST_NAME: Locator =
    Locator::Id("checkout.shipping.addressSelector.newAddress.address.lastName");
pub const SHIPPING_STREET: Locator =
    Locator::Id("checkout.shipping.addressSelector.newAddress.address.street");
pub const SHIPPING_POSTAL_CODE: Locator =
    Locator::Id("checkout.shipping.addressSelector.newAddress.address.zipLookup.postalCode");
pub const SHIPPING_EMAIL: Locator =
    Locator::Id("checkout.shipping.addressContactEmail.address.emailAddress");
pub const SHIPPING_PHONE: Locator =
    Locator::Id("checkout.shipping.addressContactPhone.address.fullDaytimePhone");

pub const BILLING_CREDIT: Locator = Locator::Id("checkout.billing.billingoptions.credit");

pub const CARD_NUMBER: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.cardInputs.cardInput-0.cardNumber",
);
pub const CARD_EXPIRATION: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.cardInputs.cardInput-0.expiration",
);
pub const CARD_SECURITY_CODE: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.cardInputs.cardInput-0.securityCode",
);

/// Framework-generated id; breaks whenever the page's component tree changes
pub const SHIPPING_CHECKBOX: Locator = Locator::Id(":r1f:");

pub const BILLING_FIRST_NAME: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.billingAddress.address.firstName",
);
pub const BILLING_LAST_NAME: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.billingAddress.address.lastName",
);
pub const BILLING_STREET: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.billingAddress.address.street",
);
pub const BILLING_POSTAL_CODE: Locator = Locator::Id(
    "checkout.billing.billingOptions.selectedBillingOptions.creditCard.billingAddress.address.zipLookup.postalCode",
);

/// Shipping form fields in fill order
pub const SHIPPING_FIELDS: [Locator; 6] = [
    SHIPPING_FIRST_NAME,
    SHIPPING_LAST_NAME,
    SHIPPING_STREET,
    SHIPPING_POSTAL_CODE,
    SHIPPING_EMAIL,
    SHIPPING_PHONE,
];

/// Card fields in fill order
pub const CARD_FIELDS: [Locator; 3] = [CARD_NUMBER, CARD_EXPIRATION, CARD_SECURITY_CODE];

/// Billing address fields in fill order
pub const BILLING_FIELDS: [Locator; 4] = [
    BILLING_FIRST_NAME,
    BILLING_LAST_NAME,
    BILLING_STREET,
    BILLING_POSTAL_CODE,
];
