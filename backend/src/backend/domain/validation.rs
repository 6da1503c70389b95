//! # Input Validation
//!
//! Pure validators for form and API input. Nothing here performs I/O or
//! returns `Err`: every check produces a [`FieldValidation`] or
//! [`RecordValidation`] carrying human-readable messages.
//!
//! - [`validate_field`] checks one value against a [`FieldType`] and
//!   [`FieldOptions`]. Empty values pass unless the field is required.
//! - `validate_order`, `validate_customer`, `validate_invoice` and
//!   `validate_submission` run the field checks for a whole record and flatten
//!   the messages, each starting with the field label.
//! - [`validate_password`] reports each strength rule separately.

use once_cell::sync::Lazy;
use regex::Regex;
use shared::{
    CreateCustomerRequest, CreateOrderRequest, FieldValidation, Invoice, PasswordStrength, RecordValidation,
    SubmitOrderRequest,
};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Accepted jersey sizes (youth and adult)
pub const JERSEY_SIZES: &[&str] = &["YS", "YM", "YL", "XS", "S", "M", "L", "XL", "XXL", "XXXL"];

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("BUG: invalid email regex: {}", e))
});

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ().\-]{5,18}[0-9]$").unwrap_or_else(|e| panic!("BUG: invalid phone regex: {}", e))
});

static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\p{L}[\p{L} '.\-]*$").unwrap_or_else(|e| panic!("BUG: invalid name regex: {}", e))
});

static ORDER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ORD-[0-9]{6,}(-[0-9A-F]{4})?$").unwrap_or_else(|e| panic!("BUG: invalid order id regex: {}", e))
});

static INVOICE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^INV-[0-9]{6,}(-[0-9A-F]{4})?$")
        .unwrap_or_else(|e| panic!("BUG: invalid invoice id regex: {}", e))
});

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Email,
    Phone,
    Name,
    OrderId,
    InvoiceId,
    Number,
    String,
}

impl FieldType {
    fn default_label(self) -> &'static str {
        match self {
            FieldType::Email => "Email",
            FieldType::Phone => "Phone",
            FieldType::Name => "Name",
            FieldType::OrderId => "Order ID",
            FieldType::InvoiceId => "Invoice ID",
            FieldType::Number => "Value",
            FieldType::String => "Field",
        }
    }
}

/// Per-field constraints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub label: Option<String>,
}

impl FieldOptions {
    pub fn required() -> Self {
        Self { required: true, ..Self::default() }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Validate one value
pub fn validate_field(value: &str, field_type: FieldType, options: &FieldOptions) -> FieldValidation {
    let value = value.trim().to_string();
    let label = options.label.as_deref().unwrap_or(field_type.default_label());
    let mut errors = Vec::new();

    if value.is_empty() {
        if options.required {
            errors.push(format!("{} is required", label));
        }
        return FieldValidation { is_valid: errors.is_empty(), value, errors };
    }

    let length = value.chars().count();
    if let Some(min) = options.min_length {
        if length < min {
            errors.push(format!("{} must be at least {} characters", label, min));
        }
    }
    if let Some(max) = options.max_length {
        if length > max {
            errors.push(format!("{} must be at most {} characters", label, max));
        }
    }

    match field_type {
        FieldType::Email if !EMAIL.is_match(&value) => {
            errors.push(format!("{} must be a valid email address", label));
        }
        FieldType::Phone if !PHONE.is_match(&value) => {
            errors.push(format!("{} must be a valid phone number", label));
        }
        FieldType::Name if !NAME.is_match(&value) => {
            errors.push(format!("{} may only contain letters, spaces, apostrophes, dots and hyphens", label));
        }
        FieldType::OrderId if !ORDER_ID.is_match(&value) => {
            errors.push(format!("{} must look like ORD-<timestamp>-<code>", label));
        }
        FieldType::InvoiceId if !INVOICE_ID.is_match(&value) => {
            errors.push(format!("{} must look like INV-<timestamp>-<code>", label));
        }
        FieldType::Number => match value.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                if let Some(min) = options.min {
                    if number < min {
                        errors.push(format!("{} must be at least {}", label, min));
                    }
                }
                if let Some(max) = options.max {
                    if number > max {
                        errors.push(format!("{} must be at most {}", label, max));
                    }
                }
            }
            _ => errors.push(format!("{} must be a number", label)),
        },
        _ => {}
    }

    FieldValidation { is_valid: errors.is_empty(), value, errors }
}

/// Collects field results into one record result
#[derive(Default)]
struct RecordValidator {
    errors: Vec<String>,
}

impl RecordValidator {
    fn field(&mut self, value: &str, field_type: FieldType, options: FieldOptions) -> &mut Self {
        let result = validate_field(value, field_type, &options);
        self.errors.extend(result.errors);
        self
    }

    fn optional(&mut self, value: Option<&str>, field_type: FieldType, options: FieldOptions) -> &mut Self {
        self.field(value.unwrap_or_default(), field_type, options)
    }

    fn error(&mut self, message: String) -> &mut Self {
        self.errors.push(message);
        self
    }

    fn finish(&mut self) -> RecordValidation {
        let errors = std::mem::take(&mut self.errors);
        RecordValidation { is_valid: errors.is_empty(), errors }
    }
}

fn check_jersey_size(validator: &mut RecordValidator, size: &str) {
    let size = size.trim();
    if !size.is_empty() && !JERSEY_SIZES.iter().any(|s| s.eq_ignore_ascii_case(size)) {
        validator.error(format!("Jersey size must be one of {}", JERSEY_SIZES.join(", ")));
    }
}

/// Validate an order before it is written
pub fn validate_order(request: &CreateOrderRequest) -> RecordValidation {
    let mut validator = RecordValidator::default();
    validator
        .field(
            &request.customer_name,
            FieldType::Name,
            FieldOptions::required().label("Customer name").length(Some(2), Some(100)),
        )
        .field(&request.email, FieldType::Email, FieldOptions::required())
        .optional(request.phone.as_deref(), FieldType::Phone, FieldOptions::default())
        .optional(
            request.team_name.as_deref(),
            FieldType::String,
            FieldOptions::default().label("Team name").length(None, Some(100)),
        )
        .field(&request.jersey_size, FieldType::String, FieldOptions::required().label("Jersey size"))
        .optional(
            request.jersey_number.as_deref(),
            FieldType::Number,
            FieldOptions::default().label("Jersey number").range(Some(0.0), Some(999.0)),
        )
        .field(
            &request.quantity.to_string(),
            FieldType::Number,
            FieldOptions::required().label("Quantity").range(Some(1.0), Some(500.0)),
        )
        .field(
            &request.unit_price.to_string(),
            FieldType::Number,
            FieldOptions::required().label("Unit price").range(Some(0.0), Some(10_000.0)),
        )
        .optional(
            request.notes.as_deref(),
            FieldType::String,
            FieldOptions::default().label("Notes").length(None, Some(1000)),
        );
    check_jersey_size(&mut validator, &request.jersey_size);
    validator.finish()
}

/// Validate a customer record
pub fn validate_customer(request: &CreateCustomerRequest) -> RecordValidation {
    RecordValidator::default()
        .field(
            &request.name,
            FieldType::Name,
            FieldOptions::required().label("Customer name").length(Some(2), Some(100)),
        )
        .field(&request.email, FieldType::Email, FieldOptions::required())
        .optional(request.phone.as_deref(), FieldType::Phone, FieldOptions::default())
        .optional(
            request.team_name.as_deref(),
            FieldType::String,
            FieldOptions::default().label("Team name").length(None, Some(100)),
        )
        .finish()
}

/// Validate an invoice before it is written
pub fn validate_invoice(invoice: &Invoice) -> RecordValidation {
    let mut validator = RecordValidator::default();
    validator
        .field(&invoice.id, FieldType::InvoiceId, FieldOptions::required())
        .field(&invoice.order_id, FieldType::OrderId, FieldOptions::required())
        .field(
            &invoice.customer_name,
            FieldType::Name,
            FieldOptions::required().label("Customer name").length(Some(2), Some(100)),
        )
        .field(&invoice.email, FieldType::Email, FieldOptions::required())
        .field(
            &invoice.quantity.to_string(),
            FieldType::Number,
            FieldOptions::required().label("Quantity").range(Some(1.0), None),
        )
        .field(
            &invoice.total.to_string(),
            FieldType::Number,
            FieldOptions::required().label("Total").range(Some(0.0), None),
        );

    let expected = invoice.unit_price * invoice.quantity as f64;
    if (expected - invoice.total).abs() > 0.005 {
        validator.error(format!("Total must equal quantity x unit price ({:.2})", expected));
    }
    validator.finish()
}

/// Validate a public portal submission
pub fn validate_submission(request: &SubmitOrderRequest) -> RecordValidation {
    let mut validator = RecordValidator::default();
    validator
        .field(
            &request.customer_name,
            FieldType::Name,
            FieldOptions::required().label("Name").length(Some(2), Some(100)),
        )
        .field(&request.email, FieldType::Email, FieldOptions::required())
        .optional(request.phone.as_deref(), FieldType::Phone, FieldOptions::default())
        .optional(
            request.team_name.as_deref(),
            FieldType::String,
            FieldOptions::default().label("Team name").length(None, Some(100)),
        )
        .field(&request.jersey_size, FieldType::String, FieldOptions::required().label("Jersey size"))
        .field(
            &request.quantity.to_string(),
            FieldType::Number,
            FieldOptions::required().label("Quantity").range(Some(1.0), Some(500.0)),
        )
        .optional(
            request.notes.as_deref(),
            FieldType::String,
            FieldOptions::default().label("Notes").length(None, Some(1000)),
        );
    check_jersey_size(&mut validator, &request.jersey_size);
    validator.finish()
}

/// Check password strength; every rule must pass
pub fn validate_password(password: &str) -> PasswordStrength {
    let min_length = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    let mut errors = Vec::new();
    if !min_length {
        errors.push(format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH));
    }
    if !has_uppercase {
        errors.push("Password must contain an uppercase letter".to_string());
    }
    if !has_lowercase {
        errors.push("Password must contain a lowercase letter".to_string());
    }
    if !has_digit {
        errors.push("Password must contain a digit".to_string());
    }
    if !has_symbol {
        errors.push("Password must contain a symbol".to_string());
    }

    PasswordStrength {
        is_valid: errors.is_empty(),
        min_length,
        has_uppercase,
        has_lowercase,
        has_digit,
        has_symbol,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{InvoiceStatus, Order};

    fn order_request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: None,
            customer_name: "Alice Martin".to_string(),
            email: "alice@example.com".to_string(),
            phone: Some("+1 (555) 123-4567".to_string()),
            team_name: Some("Riverside Owls".to_string()),
            jersey_size: "L".to_string(),
            jersey_number: Some("23".to_string()),
            quantity: 3,
            unit_price: 45.0,
            notes: None,
        }
    }

    #[test]
    fn test_email_scenario() {
        let ok = validate_field("a@b.com", FieldType::Email, &FieldOptions::required());
        assert!(ok.is_valid);
        assert!(ok.errors.is_empty());

        let bad = validate_field("not-an-email", FieldType::Email, &FieldOptions::required());
        assert!(!bad.is_valid);
        assert!(!bad.errors.is_empty());
    }

    #[test]
    fn test_empty_optional_is_valid_and_required_is_not() {
        assert!(validate_field("   ", FieldType::Phone, &FieldOptions::default()).is_valid);

        let missing = validate_field("", FieldType::Email, &FieldOptions::required());
        assert!(!missing.is_valid);
        assert_eq!(missing.errors, vec!["Email is required".to_string()]);
    }

    #[test]
    fn test_value_is_trimmed() {
        let result = validate_field("  Alice  ", FieldType::Name, &FieldOptions::required());
        assert_eq!(result.value, "Alice");
        assert!(result.is_valid);
    }

    #[test]
    fn test_phone_and_name_patterns() {
        let opts = FieldOptions::default();
        assert!(validate_field("555-123-4567", FieldType::Phone, &opts).is_valid);
        assert!(validate_field("+44 20 7946 0958", FieldType::Phone, &opts).is_valid);
        assert!(!validate_field("call me", FieldType::Phone, &opts).is_valid);

        assert!(validate_field("Zoë O'Neil-Smith", FieldType::Name, &opts).is_valid);
        assert!(!validate_field("R2D2", FieldType::Name, &opts).is_valid);
    }

    #[test]
    fn test_record_id_patterns() {
        let opts = FieldOptions::required();
        let order_id = Order::generate_id(1_700_000_000_000);
        assert!(validate_field(&order_id, FieldType::OrderId, &opts).is_valid);
        assert!(validate_field("ORD-12345678", FieldType::OrderId, &opts).is_valid);
        assert!(validate_field(&shared::Order::generate_id(1702516122000), FieldType::OrderId, &opts).is_valid);
        assert!(!validate_field("ORD-abc", FieldType::OrderId, &opts).is_valid);
        assert!(validate_field("INV-1700000000000-0A1F", FieldType::InvoiceId, &opts).is_valid);
        assert!(!validate_field(&order_id, FieldType::InvoiceId, &opts).is_valid);
    }

    #[test]
    fn test_number_ranges() {
        let opts = FieldOptions::required().label("Quantity").range(Some(1.0), Some(10.0));
        assert!(validate_field("5", FieldType::Number, &opts).is_valid);

        let low = validate_field("0", FieldType::Number, &opts);
        assert_eq!(low.errors, vec!["Quantity must be at least 1".to_string()]);

        let high = validate_field("11", FieldType::Number, &opts);
        assert_eq!(high.errors, vec!["Quantity must be at most 10".to_string()]);

        let nan = validate_field("lots", FieldType::Number, &opts);
        assert_eq!(nan.errors, vec!["Quantity must be a number".to_string()]);
    }

    #[test]
    fn test_string_length_limits() {
        let opts = FieldOptions::default().label("Notes").length(Some(3), Some(5));
        assert!(!validate_field("ab", FieldType::String, &opts).is_valid);
        assert!(validate_field("abcd", FieldType::String, &opts).is_valid);
        assert!(!validate_field("abcdef", FieldType::String, &opts).is_valid);
    }

    #[test]
    fn test_validate_order_collects_labelled_errors() {
        assert!(validate_order(&order_request()).is_valid);

        let mut bad = order_request();
        bad.email = "nope".to_string();
        bad.quantity = 0;
        bad.jersey_size = "XXXXL".to_string();
        let result = validate_order(&bad);

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].starts_with("Email"));
        assert!(result.errors[1].starts_with("Quantity"));
        assert!(result.errors[2].starts_with("Jersey size"));
    }

    #[test]
    fn test_validate_customer_and_submission() {
        let customer = CreateCustomerRequest {
            name: "Bo".to_string(),
            email: "bo@club.org".to_string(),
            phone: None,
            team_name: None,
        };
        assert!(validate_customer(&customer).is_valid);

        let submission = SubmitOrderRequest {
            customer_name: "".to_string(),
            email: "fan@club.org".to_string(),
            phone: None,
            team_name: None,
            jersey_size: "m".to_string(),
            quantity: 2,
            notes: None,
        };
        let result = validate_submission(&submission);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Name is required".to_string()]);
    }

    #[test]
    fn test_validate_invoice_checks_total() {
        let mut invoice = Invoice {
            id: "INV-1700000000000-00AA".to_string(),
            order_id: "ORD-1700000000000-00BB".to_string(),
            customer_id: None,
            customer_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            description: "3 x L jersey".to_string(),
            quantity: 3,
            unit_price: 10.0,
            total: 30.0,
            status: InvoiceStatus::Draft,
            due_date: None,
            zoho_invoice_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(validate_invoice(&invoice).is_valid);

        invoice.total = 25.0;
        let result = validate_invoice(&invoice);
        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("Total"));
    }

    #[test]
    fn test_password_scenario() {
        let weak = validate_password("Password1");
        assert!(!weak.is_valid);
        assert!(!weak.has_symbol);
        assert!(weak.min_length && weak.has_uppercase && weak.has_lowercase && weak.has_digit);

        let strong = validate_password("Password1!");
        assert!(strong.is_valid);
        assert!(strong.errors.is_empty());
    }

    #[test]
    fn test_password_reports_each_rule() {
        let result = validate_password("abc");
        assert!(!result.min_length);
        assert!(!result.has_uppercase);
        assert!(result.has_lowercase);
        assert!(!result.has_digit);
        assert!(!result.has_symbol);
        assert_eq!(result.errors.len(), 4);
    }
}
