use crate::services::customers::canonical_phone;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct OtpSmsPayload<'a> {
    route: &'a str,
    variables_values: &'a str,
    numbers: &'a str,
}

/// Fire-and-forget SMS gateway client.
///
/// OTP issuance must never fail because the provider is down; every error
/// path logs and reports non-delivery instead of propagating.
#[derive(Clone)]
pub struct SmsGateway {
    http: reqwest::Client,
    gateway_url: String,
    api_key: Option<String>,
    country_prefix: String,
}

impl SmsGateway {
    pub fn new(gateway_url: String, api_key: Option<String>, country_prefix: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url,
            api_key,
            country_prefix,
        }
    }

    /// Returns whether the provider accepted the message. Without an API
    /// key the OTP is only logged, which is the development path.
    pub async fn send_otp(&self, phone_number: &str, otp: &str) -> bool {
        let Some(api_key) = &self.api_key else {
            info!(phone_number = %phone_number, otp = %otp, "SMS gateway not configured; OTP available in logs");
            return false;
        };

        // The gateway wants the bare ten-digit local number.
        let local = canonical_phone(phone_number, &self.country_prefix)
            .map(|p| p[self.country_prefix.len()..].to_string())
            .unwrap_or_else(|| phone_number.to_string());

        let payload = OtpSmsPayload {
            route: "otp",
            variables_values: otp,
            numbers: &local,
        };

        match self
            .http
            .post(&self.gateway_url)
            .header("authorization", api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(phone_number = %local, "OTP SMS dispatched");
                true
            }
            Ok(response) => {
                warn!(
                    phone_number = %local,
                    status = %response.status(),
                    "SMS gateway rejected OTP message"
                );
                false
            }
            Err(e) => {
                warn!(phone_number = %local, error = %e, "SMS gateway unreachable");
                false
            }
        }
    }
}
