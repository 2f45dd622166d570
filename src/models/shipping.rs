use serde::{Deserialize, Serialize};

/// Delivery address captured before checkout.
///
/// Field names on the wire match the storefront API (`pinCode`,
/// `phoneNo`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: String,
    pub phone_no: String,
}

/// Outcome of validating a [`ShippingInfo`], with one reason per failing
/// field.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub reasons: Vec<String>,
}

impl ShippingInfo {
    /// Validates the profile: all six fields non-empty after trimming,
    /// phone number exactly 10 digits.
    pub fn validate(&self) -> ValidationReport {
        let mut reasons = Vec::new();

        for (field, value) in [
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("pinCode", &self.pin_code),
        ] {
            if value.trim().is_empty() {
                reasons.push(format!("{} must not be empty", field));
            }
        }

        if self.phone_no.trim().is_empty() {
            reasons.push("phoneNo must not be empty".to_string());
        } else if !is_valid_phone(self.phone_no.trim()) {
            reasons.push("phoneNo must be exactly 10 digits".to_string());
        }

        ValidationReport {
            valid: reasons.is_empty(),
            reasons,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().valid
    }
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}
