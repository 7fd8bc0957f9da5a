//! Value Objects for grocery ordering

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::OnceLock};

/// Israeli mobile number, stored digits-only (`05XXXXXXXX`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, PhoneError> {
        let digits = Self::normalize(value.as_ref());
        if digits.is_empty() { return Err(PhoneError::Empty); }
        if !mobile_pattern().is_match(&digits) { return Err(PhoneError::Invalid(digits)); }
        Ok(Self(digits))
    }

    /// Strips the hyphens customers type between digit groups.
    pub fn normalize(value: &str) -> String { value.trim().replace('-', "") }

    pub fn as_str(&self) -> &str { &self.0 }
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^05\d{8}$").expect("static phone pattern"))
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self { value.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is required")]
    Empty,
    #[error("{0} is not a valid Israeli mobile number (must start with 05 and contain 10 digits)")]
    Invalid(String),
}

/// Delivery region. The wire names are the Hebrew labels shown to customers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "ערבה")] Arava,
    #[serde(rename = "נגב")] Negev,
    #[serde(rename = "ים המלח")] DeadSea,
    #[serde(rename = "מרכז")] Center,
    #[serde(rename = "עמקים")] Valleys,
    #[serde(rename = "חיפה")] Haifa,
    #[serde(rename = "גליל וגולן")] GalileeGolan,
    #[serde(rename = "אחר")] Other,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Arava, Region::Negev, Region::DeadSea, Region::Center,
        Region::Valleys, Region::Haifa, Region::GalileeGolan, Region::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Region::Arava => "ערבה",
            Region::Negev => "נגב",
            Region::DeadSea => "ים המלח",
            Region::Center => "מרכז",
            Region::Valleys => "עמקים",
            Region::Haifa => "חיפה",
            Region::GalileeGolan => "גליל וגולן",
            Region::Other => "אחר",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Region {
    type Err = RegionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Region::ALL.into_iter().find(|r| r.label() == s).ok_or_else(|| RegionError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid region")]
pub struct RegionError(pub String);

/// Argon2id digest of an administrator credential, stored as a PHC string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub const MIN_LENGTH: usize = 6;

    pub fn hash(plain: &str) -> Result<Self, CredentialError> {
        if plain.chars().count() < Self::MIN_LENGTH { return Err(CredentialError::TooShort); }
        let salt = SaltString::generate(&mut OsRng);
        let phc = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(Self(phc.to_string()))
    }

    /// Wraps a digest that was already produced by [`CredentialHash::hash`].
    pub fn from_stored(value: String) -> Self { Self(value) }

    pub fn as_str(&self) -> &str { &self.0 }

    /// A stored value that is not a valid PHC string never verifies.
    pub fn verify(&self, plain: &str) -> bool {
        match PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("CredentialHash(..)") }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("administrator password must contain at least 6 characters")]
    TooShort,
    #[error("failed to hash credential: {0}")]
    Hashing(String),
}

/// Reads a requested packet count. Anything other than a positive integer
/// (as a JSON number or numeric string) means "not specified".
pub fn packet_count_from(value: Option<&serde_json::Value>) -> Option<u32> {
    let n = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.fract() != 0.0 || n < 1.0 || n > u32::MAX as f64 { return None; }
    Some(n as u32)
}

/// Serving options as sent by the admin UI: a comma-separated string or a list.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ServingOptionsInput {
    Csv(String),
    List(Vec<String>),
}

impl ServingOptionsInput {
    /// Trimmed, non-empty options in input order.
    pub fn into_options(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::Csv(s) => s.split(',').map(str::to_string).collect(),
            Self::List(v) => v,
        };
        raw.into_iter().map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phone_strips_hyphens() {
        let phone = PhoneNumber::parse("050-123-4567").unwrap();
        assert_eq!(phone.as_str(), "0501234567");
    }

    #[test]
    fn test_phone_rejects_landline() {
        assert!(matches!(PhoneNumber::parse("031234567"), Err(PhoneError::Invalid(_))));
        assert!(matches!(PhoneNumber::parse("05012345678"), Err(PhoneError::Invalid(_))));
        assert_eq!(PhoneNumber::parse("  "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_region_round_trip_label() {
        for region in Region::ALL {
            assert_eq!(region.label().parse::<Region>().unwrap(), region);
        }
        assert!("Tel Aviv".parse::<Region>().is_err());
        assert_eq!(serde_json::to_value(Region::DeadSea).unwrap(), json!("ים המלח"));
    }

    #[test]
    fn test_packet_count_nulls_invalid_values() {
        assert_eq!(packet_count_from(Some(&json!(3))), Some(3));
        assert_eq!(packet_count_from(Some(&json!("2"))), Some(2));
        assert_eq!(packet_count_from(Some(&json!(0))), None);
        assert_eq!(packet_count_from(Some(&json!(-1))), None);
        assert_eq!(packet_count_from(Some(&json!(1.5))), None);
        assert_eq!(packet_count_from(Some(&json!("abc"))), None);
        assert_eq!(packet_count_from(Some(&json!(null))), None);
        assert_eq!(packet_count_from(None), None);
    }

    #[test]
    fn test_serving_options_trimmed() {
        let csv = ServingOptionsInput::Csv(" whole , sliced,, ".into());
        assert_eq!(csv.into_options(), vec!["whole", "sliced"]);
        let list = ServingOptionsInput::List(vec!["diced ".into(), "".into()]);
        assert_eq!(list.into_options(), vec!["diced"]);
    }

    #[test]
    fn test_credential_hash_salted() {
        let a = CredentialHash::hash("secret1").unwrap();
        let b = CredentialHash::hash("secret1").unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert!(a.as_str().starts_with("$argon2id$"));
        assert_eq!(CredentialHash::hash("short").unwrap_err(), CredentialError::TooShort);
    }

    #[test]
    fn test_credential_verify() {
        let hash = CredentialHash::hash("secret1").unwrap();
        assert!(hash.verify("secret1"));
        assert!(!hash.verify("secret2"));

        let stored = CredentialHash::from_stored(hash.as_str().to_string());
        assert!(stored.verify("secret1"));
        assert!(!CredentialHash::from_stored("not-a-phc-string".into()).verify("secret1"));
    }
}
