//! Payments API endpoint constants

/// Default resource API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.sky.blackbaud.com";

/// Header carrying the developer subscription key on every resource call
pub const SUBSCRIPTION_KEY_HEADER: &str = "Bb-Api-Subscription-Key";

pub const PAYMENT_CONFIGURATIONS_PATH: &str = "/payments/v1/paymentconfigurations";

pub const PUBLIC_KEY_PATH: &str = "/payments/v1/checkout/publickey";

pub const CHECKOUT_TRANSACTION_PATH: &str = "/payments/v1/checkout/transaction";

/// Payment configurations in this process mode charge real cards.
pub const LIVE_PROCESS_MODE: &str = "Live";
