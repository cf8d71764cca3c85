use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use super::error::{SourceError, SourceResult};
use crate::models::{CurrencyCode, CurrencyRates, RateSnapshot};
use crate::utils::validation::is_valid_rate;

/// Body of a Fixer.io `/latest` response
#[derive(Debug, Clone, Deserialize)]
pub struct FixerResponse {
    /// Whether the request was successful
    #[serde(default)]
    pub success: bool,

    /// Unix timestamp (seconds) of when the rates were collected
    #[serde(default)]
    pub timestamp: Option<i64>,

    /// Base currency of the listed rates
    #[serde(default)]
    pub base: Option<String>,

    /// Collection date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,

    /// Rates keyed by currency code
    #[serde(default)]
    pub rates: HashMap<String, f64>,

    /// Present when `success` is false
    #[serde(default)]
    pub error: Option<FixerErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixerErrorBody {
    #[serde(default)]
    pub code: i64,

    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub info: String,
}

impl FixerResponse {
    /// Parse a raw response body
    pub fn from_body(body: &str) -> SourceResult<Self> {
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    /// Validate the response and convert it into a snapshot against `expected_base`
    pub fn into_snapshot(self, expected_base: &CurrencyCode) -> SourceResult<RateSnapshot> {
        if !self.success {
            let error = self.error.unwrap_or(FixerErrorBody {
                code: 0,
                kind: "unknown".to_string(),
                info: "response flagged as unsuccessful without error details".to_string(),
            });
            return Err(SourceError::Api {
                code: error.code,
                kind: error.kind,
                info: error.info,
            });
        }

        let base = self
            .base
            .ok_or_else(|| SourceError::Decode("missing field `base`".to_string()))?;
        match CurrencyCode::new(&base) {
            Ok(code) if &code == expected_base => {}
            _ => {
                return Err(SourceError::BaseMismatch {
                    expected: expected_base.clone(),
                    actual: base,
                })
            }
        }

        let timestamp = self
            .timestamp
            .ok_or_else(|| SourceError::Decode("missing field `timestamp`".to_string()))?;
        let collected_at = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| SourceError::Decode(format!("timestamp out of range: {}", timestamp)))?;

        let mut rates = CurrencyRates::new();
        for (code, value) in self.rates {
            let currency = CurrencyCode::new(&code)
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            let rate = Decimal::from_f64(value)
                .filter(|rate| is_valid_rate(*rate))
                .ok_or_else(|| {
                    SourceError::Decode(format!("invalid rate for {}: {}", currency, value))
                })?;
            rates.insert(currency, rate);
        }

        let mut snapshot = RateSnapshot::new(expected_base.clone(), collected_at, rates);
        if let Some(date) = self.date {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| SourceError::Decode(format!("invalid date '{}': {}", date, e)))?;
            snapshot = snapshot.with_date(date);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LATEST_BODY: &str = r#"{
        "success": true,
        "timestamp": 1519296206,
        "base": "EUR",
        "date": "2018-02-22",
        "rates": {"USD": 1.23396, "GBP": 0.882047, "JPY": 132.360679}
    }"#;

    #[test]
    fn test_decode_latest_response() {
        let snapshot = FixerResponse::from_body(LATEST_BODY)
            .unwrap()
            .into_snapshot(&CurrencyCode::eur())
            .unwrap();

        assert_eq!(snapshot.base, CurrencyCode::eur());
        assert_eq!(snapshot.collected_at.timestamp(), 1519296206);
        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2018, 2, 22));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.rates[&CurrencyCode::new("USD").unwrap()], dec!(1.23396));
        assert_eq!(snapshot.rates[&CurrencyCode::new("GBP").unwrap()], dec!(0.882047));
    }

    #[test]
    fn test_unsuccessful_response_is_api_error() {
        let body = r#"{
            "success": false,
            "error": {"code": 101, "type": "invalid_access_key", "info": "You have not supplied a valid API Access Key."}
        }"#;

        let err = FixerResponse::from_body(body)
            .unwrap()
            .into_snapshot(&CurrencyCode::eur())
            .unwrap_err();

        match err {
            SourceError::Api { code, kind, .. } => {
                assert_eq!(code, 101);
                assert_eq!(kind, "invalid_access_key");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_base_mismatch_is_rejected() {
        let body = r#"{"success": true, "timestamp": 1519296206, "base": "USD", "rates": {"EUR": 0.81}}"#;

        let err = FixerResponse::from_body(body)
            .unwrap()
            .into_snapshot(&CurrencyCode::eur())
            .unwrap_err();

        assert!(matches!(err, SourceError::BaseMismatch { ref actual, .. } if actual == "USD"));
    }

    #[test]
    fn test_invalid_rates_are_decode_errors() {
        for rates in [r#"{"USD": 0}"#, r#"{"USD": -1.2}"#, r#"{"US": 1.2}"#] {
            let body = format!(
                r#"{{"success": true, "timestamp": 1519296206, "base": "EUR", "rates": {}}}"#,
                rates
            );
            let err = FixerResponse::from_body(&body)
                .unwrap()
                .into_snapshot(&CurrencyCode::eur())
                .unwrap_err();
            assert!(err.is_decode_error(), "{} should not decode", rates);
        }
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        assert!(FixerResponse::from_body("<html>maintenance</html>")
            .unwrap_err()
            .is_decode_error());
        assert!(FixerResponse::from_body(r#"{"success": true, "rates": []}"#)
            .unwrap_err()
            .is_decode_error());
    }
}
