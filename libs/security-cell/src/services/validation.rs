// =====================================================================================
// VALIDATION SERVICE - FIELD NORMALIZATION FOR CLINIC RECORDS
// =====================================================================================

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ValidationIssue;

const MAX_NAME_LENGTH: usize = 200;
const MAX_NOTES_LENGTH: usize = 4000;

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^5\d{9}$").expect("static pattern"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes a Turkish mobile number to its ten national digits.
    ///
    /// Accepts `+90 532 123 45 67`, `0532 123 4567` and similar spellings.
    pub fn normalize_phone(&self, raw: &str) -> Result<String, ValidationIssue> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(ValidationIssue::Required {
                field: "phone".to_string(),
            });
        }

        let national = match digits.len() {
            12 if digits.starts_with("90") => &digits[2..],
            11 if digits.starts_with('0') => &digits[1..],
            _ => digits.as_str(),
        };

        if !mobile_pattern().is_match(national) {
            return Err(ValidationIssue::InvalidFormat {
                field: "phone".to_string(),
                expected: "a mobile number like 5XX XXX XX XX".to_string(),
            });
        }
        Ok(national.to_string())
    }

    /// FDI two-digit tooth notation: permanent quadrants 1-4 hold teeth 1-8,
    /// primary quadrants 5-8 hold teeth 1-5.
    pub fn validate_tooth_number(&self, tooth_no: i16) -> Result<i16, ValidationIssue> {
        let quadrant = tooth_no / 10;
        let tooth = tooth_no % 10;
        let valid = match quadrant {
            1..=4 => (1..=8).contains(&tooth),
            5..=8 => (1..=5).contains(&tooth),
            _ => false,
        };

        if valid {
            Ok(tooth_no)
        } else {
            Err(ValidationIssue::InvalidFormat {
                field: "tooth_no".to_string(),
                expected: "an FDI tooth number such as 11 or 48".to_string(),
            })
        }
    }

    /// Trims `value` and rejects it when blank or longer than a name may be.
    pub fn required_name(&self, field: &str, value: &str) -> Result<String, ValidationIssue> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationIssue::Required {
                field: field.to_string(),
            });
        }
        self.within_length(field, trimmed, MAX_NAME_LENGTH)
    }

    /// Trims free text, mapping blank input to `None`.
    pub fn optional_notes(&self, field: &str, value: Option<&str>) -> Result<Option<String>, ValidationIssue> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(text) => self.within_length(field, text, MAX_NOTES_LENGTH).map(Some),
            None => Ok(None),
        }
    }

    fn within_length(&self, field: &str, value: &str, max_length: usize) -> Result<String, ValidationIssue> {
        if value.chars().count() > max_length {
            return Err(ValidationIssue::ExceedsMaxLength {
                field: field.to_string(),
                max_length,
            });
        }
        Ok(value.to_string())
    }
}
