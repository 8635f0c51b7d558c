//! Payments API wire models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::LIVE_PROCESS_MODE;
use crate::error::Error;

/// Error payload the Payments API embeds in non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfiguration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub process_mode: String,
}

impl PaymentConfiguration {
    pub fn is_live(&self) -> bool {
        self.process_mode == LIVE_PROCESS_MODE
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfigurationList {
    #[serde(default)]
    pub value: Vec<PaymentConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct PublicKeyData {
    pub public_key: String,
}

/// Body of a checkout transaction charge.
#[derive(Debug, Serialize)]
pub struct TransactionBody<'a> {
    /// Minor currency units (cents)
    pub amount: i64,
    pub authorization_token: &'a str,
}

/// Which configurations a checkout may offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationSelection {
    /// At least one non-Live configuration.
    Usable(Vec<PaymentConfiguration>),
    /// The API returned no configurations at all.
    NoneReturned,
    /// Every configuration returned is in Live process mode.
    AllLive,
}

/// Drop Live configurations, distinguishing "nothing returned" from
/// "nothing usable".
pub fn select_configurations(configurations: Vec<PaymentConfiguration>) -> ConfigurationSelection {
    if configurations.is_empty() {
        return ConfigurationSelection::NoneReturned;
    }
    let usable: Vec<_> = configurations.into_iter().filter(|c| !c.is_live()).collect();
    if usable.is_empty() {
        ConfigurationSelection::AllLive
    } else {
        ConfigurationSelection::Usable(usable)
    }
}

/// Non-negative monetary amount held in minor units.
///
/// Parsed from decimal text; digits past the second decimal place are
/// truncated, not rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    pub fn from_minor_units(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidRequest(format!("invalid amount: {s:?}"));
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut cents = 0i64;
        for (i, digit) in frac.chars().take(2).enumerate() {
            let value = i64::from(digit as u8 - b'0');
            cents += if i == 0 { value * 10 } else { value };
        }

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let minor = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", minor / 100, minor % 100)
    }
}

/// Accepts `"12.50"` or `12.5`.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, mode: &str) -> PaymentConfiguration {
        PaymentConfiguration {
            id: id.into(),
            name: format!("Config {id}"),
            process_mode: mode.into(),
        }
    }

    #[test]
    fn configuration_list_deserializes() {
        let json = r#"{"count":2,"value":[
            {"id":"a","name":"Test A","process_mode":"Test"},
            {"id":"b","name":"Live B","process_mode":"Live"}
        ]}"#;
        let list: PaymentConfigurationList = serde_json::from_str(json).unwrap();
        assert_eq!(list.value.len(), 2);
        assert!(!list.value[0].is_live());
        assert!(list.value[1].is_live());
    }

    #[test]
    fn selection_filters_live_configurations() {
        let selection = select_configurations(vec![config("a", "Test"), config("b", "Live")]);
        assert_eq!(selection, ConfigurationSelection::Usable(vec![config("a", "Test")]));
    }

    #[test]
    fn selection_distinguishes_empty_from_all_live() {
        assert_eq!(select_configurations(vec![]), ConfigurationSelection::NoneReturned);
        assert_eq!(
            select_configurations(vec![config("b", "Live")]),
            ConfigurationSelection::AllLive
        );
    }

    #[test]
    fn amount_parses_decimal_text() {
        assert_eq!("12.50".parse::<Amount>().unwrap().minor_units(), 1250);
        assert_eq!("12.5".parse::<Amount>().unwrap().minor_units(), 1250);
        assert_eq!("7".parse::<Amount>().unwrap().minor_units(), 700);
        assert_eq!(".99".parse::<Amount>().unwrap().minor_units(), 99);
        assert_eq!("1.999".parse::<Amount>().unwrap().minor_units(), 199);
    }

    #[test]
    fn amount_rejects_garbage() {
        for bad in ["", ".", "-1", "abc", "1.2.3", "1e5", "99999999999999999999"] {
            assert!(bad.parse::<Amount>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn amount_deserializes_from_number_or_string() {
        let from_number: Amount = serde_json::from_str("10.25").unwrap();
        let from_text: Amount = serde_json::from_str(r#""10.25""#).unwrap();
        assert_eq!(from_number.minor_units(), 1025);
        assert_eq!(from_text, from_number);
        assert_eq!(from_number.to_string(), "10.25");
    }

    #[test]
    fn negative_amounts_display_with_sign() {
        assert_eq!(Amount::from_minor_units(-5).to_string(), "-0.05");
        assert_eq!(Amount::from_minor_units(-1050).to_string(), "-10.50");
        assert_eq!(Amount::from_minor_units(7).to_string(), "0.07");
        assert_eq!(Amount::from_minor_units(i64::MIN).to_string(), "-92233720368547758.08");
    }

    #[test]
    fn transaction_body_wire_format() {
        let body = TransactionBody {
            amount: 1025,
            authorization_token: "tok_123",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "amount": 1025, "authorization_token": "tok_123" })
        );
    }
}
