use super::{ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use async_trait::async_trait;
use footprint_core::ScanCategory;
use phonenumber::Mode;
use serde::Serialize;
use tracing::info;

/// Offline metadata for a phone number in international form.
pub struct PhoneScanner {
    number: String,
}

/// Phone number details as stored in the aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneDetails {
    /// Always true; invalid numbers are errors
    pub is_valid: bool,
    /// ISO region code, when the number maps to one region
    pub country: Option<String>,
    /// Calling code, e.g. `+46`
    pub country_code: String,
    /// National format
    pub national_number: String,
    /// International format
    pub international_number: String,
    /// E.164 format
    pub e164: String,
}

impl PhoneScanner {
    /// Bind a number, e.g. `+46 8 123 456 78`.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into().trim().to_string(),
        }
    }

    /// Parse and validate the number.
    pub fn analyze(&self) -> Result<PhoneDetails> {
        let name = self.name();
        let parsed = phonenumber::parse(None, &self.number).map_err(|e| ScannerError::Parsing {
            scanner: name.to_string(),
            message: format!("Could not parse phone number: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !phonenumber::is_valid(&parsed) {
            return Err(ScannerError::parsing(name, "Invalid phone number provided."));
        }

        Ok(PhoneDetails {
            is_valid: true,
            country: parsed.country().id().map(|id| format!("{id:?}")),
            country_code: format!("+{}", parsed.country().code()),
            national_number: parsed.format().mode(Mode::National).to_string(),
            international_number: parsed.format().mode(Mode::International).to_string(),
            e164: parsed.format().mode(Mode::E164).to_string(),
        })
    }
}

#[async_trait]
impl Scanner for PhoneScanner {
    fn category(&self) -> ScanCategory {
        ScanCategory::PhoneNumber
    }

    async fn scan(&self) -> Result<ScanOutput> {
        let details = self.analyze()?;
        info!(country_code = %details.country_code, "phone number analyzed");

        let data = serde_json::to_value(&details)
            .map_err(|e| ScannerError::internal(self.name(), e.to_string()))?;
        Ok(ScanOutput::new(data).with_keyword("phone_region", details.country.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_international_number() {
        let details = PhoneScanner::new("+1 650-253-0000").analyze().expect("valid number");
        assert!(details.is_valid);
        assert_eq!(details.country_code, "+1");
        assert_eq!(details.country.as_deref(), Some("US"));
        assert_eq!(details.e164, "+16502530000");
    }

    #[test]
    fn test_garbage_is_parsing_error() {
        let err = PhoneScanner::new("not a number").analyze().expect_err("unparsable");
        assert!(matches!(err, ScannerError::Parsing { .. }));
    }

    #[test]
    fn test_number_without_country_is_rejected() {
        // No leading + and no default region to resolve it against
        let err = PhoneScanner::new("08 123 456 78").analyze().expect_err("no region");
        assert!(matches!(err, ScannerError::Parsing { .. }));
    }

    #[tokio::test]
    async fn test_scan_emits_region_keyword() {
        let output = PhoneScanner::new("+44 20 7031 3000").scan().await.expect("valid number");
        assert_eq!(output.data["country_code"], "+44");
        assert_eq!(output.osint_keywords["phone_region"], vec!["GB"]);
    }
}
