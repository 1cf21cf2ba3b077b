//! Form Validation
//!
//! Submitted forms arrive as raw text. Each form type implements [`Validatable`], which
//! checks every field, coerces it to its typed value and either returns the cleaned
//! input or the full list of field errors. Nothing is written to the store unless
//! validation succeeds.
//!
//! ```rust,ignore
//! use diecast_vault::validation::{Validatable, ValidationErrors, validators};
//!
//! impl Validatable for LoginForm {
//!     type Output = (String, String);
//!
//!     fn validate(&self) -> Result<Self::Output, ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         let username = errors.capture(validators::validate_required("username", &self.username));
//!         let password = errors.capture(validators::validate_required("password", &self.password));
//!         match (username, password) {
//!             (Some(u), Some(p)) if errors.is_empty() => Ok((u.to_string(), p.to_string())),
//!             _ => Err(errors),
//!         }
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// Latest model year accepted by the case and car forms
pub const LATEST_MODEL_YEAR: i32 = 2025;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create a new empty validation errors collection
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add a validation error
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Keep the value of a successful check, record the error of a failed one
    pub fn capture<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.add(error);
                None
            }
        }
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Get all errors
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Messages recorded against one field
    #[must_use]
    pub fn messages_for(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|error| error.field == field)
            .map(|error| error.message.as_str())
            .collect()
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Trait for submitted forms that can be checked and cleaned
pub trait Validatable {
    /// The typed, cleaned input produced by a successful validation
    type Output;

    /// Validate every field
    ///
    /// # Errors
    ///
    /// Returns all field errors found; the caller must not persist anything.
    fn validate(&self) -> Result<Self::Output, ValidationErrors>;
}

/// Helper validators for common patterns
///
/// Messages follow the wording users see next to the form field.
pub mod validators {
    use super::ValidationError;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sea_orm::ActiveEnum;
    use std::fmt;
    use std::str::FromStr;

    const REQUIRED: &str = "This field is required.";

    /// Validate value is not blank; returns the trimmed value
    pub fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(field, REQUIRED));
        }
        Ok(trimmed)
    }

    /// Validate string length (in characters) is within range
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Ensure this value has at least {min_len} characters (it has {len})."),
            ));
        }

        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Ensure this value has at most {max_len} characters (it has {len})."),
            ));
        }

        Ok(())
    }

    /// Validate number is within range
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<T, ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(
                field,
                format!("Ensure this value is greater than or equal to {min_val}."),
            ));
        }

        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(
                field,
                format!("Ensure this value is less than or equal to {max_val}."),
            ));
        }

        Ok(value)
    }

    /// Required whole number
    pub fn parse_integer(field: &str, raw: &str) -> Result<i32, ValidationError> {
        let value = validate_required(field, raw)?;
        value
            .parse::<i32>()
            .map_err(|_| ValidationError::new(field, "Enter a whole number."))
    }

    /// Optional `YYYY-MM-DD` date; blank means absent
    pub fn parse_optional_date(field: &str, raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::new(field, "Enter a valid date."))
    }

    /// Optional non-negative amount with bounded precision; blank means absent
    pub fn parse_optional_amount(
        field: &str,
        raw: &str,
        max_digits: u32,
        decimal_places: u32,
    ) -> Result<Option<Decimal>, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        parse_amount(field, value, max_digits, decimal_places).map(Some)
    }

    /// Non-negative amount with at most `decimal_places` decimals and `max_digits` digits
    pub fn parse_amount(
        field: &str,
        raw: &str,
        max_digits: u32,
        decimal_places: u32,
    ) -> Result<Decimal, ValidationError> {
        let value = validate_required(field, raw)?;
        let amount =
            Decimal::from_str(value).map_err(|_| ValidationError::new(field, "Enter a number."))?;

        if amount.scale() > decimal_places {
            return Err(ValidationError::new(
                field,
                format!("Ensure that there are no more than {decimal_places} decimal places."),
            ));
        }

        let whole_digits = max_digits - decimal_places;
        if amount.abs().trunc() >= Decimal::from(10_u64.pow(whole_digits)) {
            return Err(ValidationError::new(
                field,
                format!(
                    "Ensure that there are no more than {whole_digits} digits before the decimal point."
                ),
            ));
        }

        validate_range(field, amount, Some(Decimal::ZERO), None)
    }

    /// Required value from a closed set of choices stored as strings
    pub fn parse_choice<E>(field: &str, raw: &str) -> Result<E, ValidationError>
    where
        E: ActiveEnum<Value = String>,
    {
        let value = validate_required(field, raw)?;
        E::try_from_value(&value.to_owned()).map_err(|_| {
            ValidationError::new(
                field,
                format!("Select a valid choice. {value} is not one of the available choices."),
            )
        })
    }

    /// Optional record reference given as a numeric id; blank means absent
    pub fn parse_optional_id(field: &str, raw: &str) -> Result<Option<i32>, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value.parse::<i32>().map(Some).map_err(|_| invalid_reference(field))
    }

    /// Error reported when a reference does not resolve to an allowed record
    #[must_use]
    pub fn invalid_reference(field: &str) -> ValidationError {
        ValidationError::new(
            field,
            "Select a valid choice. That choice is not one of the available choices.",
        )
    }

    /// Basic email validation
    pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
        let valid = value
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(ValidationError::new(field, "Enter a valid email address."));
        }

        if value.len() > 254 {
            return Err(ValidationError::new(
                field,
                "Ensure this value has at most 254 characters.",
            ));
        }

        Ok(())
    }

    /// Checkbox semantics: checked when the field was submitted at all
    #[must_use]
    pub fn checkbox(raw: Option<&str>) -> bool {
        raw.is_some_and(|value| !matches!(value.trim(), "" | "false" | "off" | "0"))
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_validation_error_creation() {
        let err = ValidationError::new("year", "Enter a whole number.");
        assert_eq!(err.field, "year");
        assert_eq!(err.message, "Enter a whole number.");
    }

    #[test]
    fn test_validation_errors_collection() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        assert_eq!(errors.capture(parse_integer("year", "2025")), Some(2025));
        assert!(errors.is_empty());

        assert_eq!(errors.capture(parse_integer("year", "soon")), None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.messages_for("year"), vec!["Enter a whole number."]);

        assert!(errors.result().is_err());
    }

    #[test]
    fn test_validate_length() {
        assert!(validate_length("color_theme", "#ff3d3d", None, Some(7)).is_ok());
        let err = validate_length("color_theme", "#ff3d3d0", None, Some(7)).unwrap_err();
        assert_eq!(
            err.message,
            "Ensure this value has at most 7 characters (it has 8)."
        );
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("year", 1950, Some(1968), Some(2025)).is_err());
        assert!(validate_range("year", 2026, Some(1968), Some(2025)).is_err());
        assert_eq!(validate_range("year", 1968, Some(1968), Some(2025)).unwrap(), 1968);
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("name", "").is_err());
        assert!(validate_required("name", "   ").is_err());
        assert_eq!(validate_required("name", "  Civic ").unwrap(), "Civic");
    }

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date("release_date", "").unwrap(), None);
        assert!(parse_optional_date("release_date", "2025-02-30").is_err());
        assert!(parse_optional_date("release_date", "2025-01-15").unwrap().is_some());
    }

    #[test]
    fn test_parse_amount_precision_and_sign() {
        assert_eq!(
            parse_optional_amount("purchase_price", "4.99", 10, 2).unwrap(),
            Some(Decimal::from_str("4.99").unwrap())
        );
        assert_eq!(parse_optional_amount("purchase_price", " ", 10, 2).unwrap(), None);
        assert!(parse_optional_amount("purchase_price", "4.999", 10, 2).is_err());
        assert!(parse_optional_amount("purchase_price", "-1", 10, 2).is_err());
        assert!(parse_optional_amount("purchase_price", "abc", 10, 2).is_err());
        assert!(parse_optional_amount("purchase_price", "123456789", 10, 2).is_err());
        assert!(parse_optional_amount("purchase_price", "12345678.50", 10, 2).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", "invalid").is_err());
        assert!(validate_email("email", "@example.com").is_err());
        assert!(validate_email("email", "collector@hotwheels.com").is_ok());
    }

    #[test]
    fn test_checkbox() {
        assert!(!checkbox(None));
        assert!(checkbox(Some("on")));
        assert!(!checkbox(Some("off")));
        assert!(!checkbox(Some("")));
    }
}
