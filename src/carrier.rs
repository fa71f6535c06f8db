//! Carrier enrichment for the exported numbers.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::error::ExtractError;
use crate::options::normalize_number;
use crate::warning::{ExtractWarning, WarningCode};

pub const DEFAULT_CARRIER_URL: &str = "http://apilayer.net/api/validate";

/// Recorded when the service has no carrier for a number, or when every
/// attempt for it failed.
pub const UNKNOWN_CARRIER: &str = "Null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Successful response; the service may not know the carrier.
    Found(Option<String>),
    /// Non-success status, transport error or unreadable body. Retryable.
    Failed(String),
}

pub trait CarrierLookup {
    fn lookup(&self, number: &str) -> LookupOutcome;
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    carrier: Option<String>,
}

fn carrier_from_body(body: &str) -> Result<Option<String>, serde_json::Error> {
    serde_json::from_str::<ValidateResponse>(body).map(|response| response.carrier)
}

/// Number-validation API client.
pub struct HttpCarrierLookup {
    agent: ureq::Agent,
    base_url: Url,
    api_key: String,
}

impl HttpCarrierLookup {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ExtractError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| ExtractError::InvalidOption(format!("carrier url: {error}")))?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Ok(Self {
            agent,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn request_url(&self, number: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("access_key", &self.api_key)
            .append_pair("number", &format!("1{number}"));
        url
    }
}

impl CarrierLookup for HttpCarrierLookup {
    fn lookup(&self, number: &str) -> LookupOutcome {
        match self.agent.get(self.request_url(number).as_str()).call() {
            Ok(response) if response.status() == 200 => {
                let body = match response.into_string() {
                    Ok(body) => body,
                    Err(error) => return LookupOutcome::Failed(format!("unreadable body: {error}")),
                };
                match carrier_from_body(&body) {
                    Ok(carrier) => LookupOutcome::Found(carrier),
                    Err(error) => LookupOutcome::Failed(format!("invalid body: {error}")),
                }
            }
            Ok(response) => LookupOutcome::Failed(format!("status {}", response.status())),
            Err(ureq::Error::Status(code, _)) => LookupOutcome::Failed(format!("status {code}")),
            Err(error) => LookupOutcome::Failed(error.to_string()),
        }
    }
}

/// Retry, backoff and circuit-breaker limits for one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    /// Pause after each successful lookup.
    pub rate_limit_delay: Duration,
    /// Numbers allowed to exhaust their attempts before the pass is aborted.
    pub max_failures: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2,
            rate_limit_delay: Duration::from_secs(1),
            max_failures: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the `attempt`-th failure.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.backoff_factor.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierRecord {
    pub number: String,
    pub carrier: String,
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

pub struct CarrierResolver<L> {
    lookup: L,
    policy: RetryPolicy,
}

impl<L: CarrierLookup> CarrierResolver<L> {
    pub fn new(lookup: L, policy: RetryPolicy) -> Self {
        Self { lookup, policy }
    }

    /// Looks up every distinct number in order. Fails with
    /// [`ExtractError::CircuitOpen`] as soon as `max_failures` numbers have
    /// exhausted their attempts; numbers after that point are not queried.
    pub fn resolve<S: AsRef<str>>(
        &self,
        numbers: &[S],
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Vec<CarrierRecord>, ExtractError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failures = 0_usize;

        for raw in numbers {
            let number = normalize_number(raw.as_ref());
            if number.is_empty() || !seen.insert(number.clone()) {
                continue;
            }

            if let Some(carrier) = self.resolve_one(&number) {
                info!(number = %number, carrier = %carrier, "resolved carrier");
                records.push(CarrierRecord { number, carrier });
                pause(self.policy.rate_limit_delay);
                continue;
            }

            failures += 1;
            warn!(number = %number, failures, "carrier lookup exhausted its attempts");
            warnings.push(ExtractWarning::new(
                WarningCode::CarrierUnknown,
                format!("carrier for {number} recorded as unknown"),
            ));
            records.push(CarrierRecord {
                number,
                carrier: UNKNOWN_CARRIER.to_string(),
            });
            if failures >= self.policy.max_failures {
                return Err(ExtractError::CircuitOpen { failures });
            }
        }

        Ok(records)
    }

    fn resolve_one(&self, number: &str) -> Option<String> {
        for attempt in 1..=self.policy.max_attempts {
            match self.lookup.lookup(number) {
                LookupOutcome::Found(carrier) => {
                    return Some(
                        carrier
                            .filter(|carrier| !carrier.trim().is_empty())
                            .unwrap_or_else(|| UNKNOWN_CARRIER.to_string()),
                    );
                }
                LookupOutcome::Failed(reason) => {
                    warn!(number, attempt, %reason, "carrier lookup failed");
                    if attempt < self.policy.max_attempts {
                        pause(self.policy.backoff(attempt));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{
        CarrierLookup, CarrierRecord, CarrierResolver, HttpCarrierLookup, LookupOutcome,
        RetryPolicy, UNKNOWN_CARRIER, carrier_from_body,
    };
    use crate::error::ExtractError;
    use crate::warning::WarningCode;

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    /// Fails the first `failures[number]` calls for a number, then answers.
    struct FlakyLookup {
        failures: HashMap<&'static str, usize>,
        calls: RefCell<Vec<String>>,
    }

    impl FlakyLookup {
        fn new(failures: &[(&'static str, usize)]) -> Self {
            Self {
                failures: failures.iter().copied().collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls_for(&self, number: &str) -> usize {
            self.calls.borrow().iter().filter(|call| *call == number).count()
        }
    }

    impl CarrierLookup for FlakyLookup {
        fn lookup(&self, number: &str) -> LookupOutcome {
            let previous = self.calls_for(number);
            self.calls.borrow_mut().push(number.to_string());
            let budget = self.failures.get(number).copied().unwrap_or(0);
            if previous < budget {
                LookupOutcome::Failed("status 503".to_string())
            } else if number == "5550000000" {
                LookupOutcome::Found(None)
            } else {
                LookupOutcome::Found(Some("Verizon Wireless".to_string()))
            }
        }
    }

    #[test]
    fn retries_until_success_without_tripping() {
        let lookup = FlakyLookup::new(&[("5551234567", 2)]);
        let resolver = CarrierResolver::new(lookup, instant_policy());
        let mut warnings = Vec::new();

        let records = resolver
            .resolve(&["555-123-4567"], &mut warnings)
            .expect("resolution should succeed");

        assert_eq!(
            records,
            vec![CarrierRecord {
                number: "5551234567".to_string(),
                carrier: "Verizon Wireless".to_string(),
            }]
        );
        assert_eq!(resolver.lookup.calls_for("5551234567"), 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn empty_carrier_is_unknown_but_not_a_failure() {
        let resolver = CarrierResolver::new(FlakyLookup::new(&[]), instant_policy());
        let mut warnings = Vec::new();

        let records = resolver
            .resolve(&["555.000.0000", "555-000-0000"], &mut warnings)
            .expect("resolution should succeed");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].carrier, UNKNOWN_CARRIER);
        assert!(warnings.is_empty());
    }

    #[test]
    fn exhausted_number_is_recorded_as_unknown() {
        let lookup = FlakyLookup::new(&[("5551110000", 99)]);
        let resolver = CarrierResolver::new(lookup, instant_policy());
        let mut warnings = Vec::new();

        let records = resolver
            .resolve(&["555-111-0000", "555-222-0000"], &mut warnings)
            .expect("a single failure should not trip the breaker");

        assert_eq!(records[0].carrier, UNKNOWN_CARRIER);
        assert_eq!(records[1].carrier, "Verizon Wireless");
        assert_eq!(resolver.lookup.calls_for("5551110000"), 5);
        assert_eq!(warnings[0].code, WarningCode::CarrierUnknown);
    }

    #[test]
    fn circuit_opens_before_remaining_numbers() {
        let lookup = FlakyLookup::new(&[("1", 99), ("2", 99), ("3", 99)]);
        let resolver = CarrierResolver::new(lookup, instant_policy());

        let error = resolver
            .resolve(&["1", "2", "3", "4", "5"], &mut Vec::new())
            .expect_err("breaker should trip");

        assert!(matches!(error, ExtractError::CircuitOpen { failures: 3 }));
        assert_eq!(resolver.lookup.calls.borrow().len(), 15);
        assert_eq!(resolver.lookup.calls_for("4"), 0);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn request_url_carries_key_and_country_code() {
        let lookup = HttpCarrierLookup::new("http://apilayer.net/api/validate", "secret")
            .expect("url should parse");
        assert_eq!(
            lookup.request_url("5551234567").as_str(),
            "http://apilayer.net/api/validate?access_key=secret&number=15551234567"
        );
        assert!(HttpCarrierLookup::new("not a url", "secret").is_err());
    }

    #[test]
    fn reads_carrier_from_validate_body() {
        let body = r#"{"valid":true,"number":"15551234567","carrier":"AT&T Mobility LLC","line_type":"mobile"}"#;
        assert_eq!(
            carrier_from_body(body).expect("body should parse"),
            Some("AT&T Mobility LLC".to_string())
        );
        assert_eq!(
            carrier_from_body(r#"{"valid":false,"carrier":null}"#).expect("body should parse"),
            None
        );
        assert_eq!(carrier_from_body(r#"{"success":false}"#).expect("body should parse"), None);
        assert!(carrier_from_body("<html>").is_err());
    }
}
