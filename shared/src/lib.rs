use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort direction used by list queries and the document store query surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse "asc"/"desc" (case-insensitive); anything else is None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Query parameters accepted by every list endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Field to sort by (e.g. "createdAt", "quantity")
    pub order_by: Option<String>,
    pub direction: Option<SortDirection>,
    pub limit: Option<u32>,
}

/// Structured failure/success result surfaced to callers of hosted collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Lifecycle of a jersey order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
}

/// Where an order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    #[default]
    Staff,
    Portal,
}

/// Order ID in format: "ORD-<epoch_millis>-<4 hex>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    /// Jersey size label (XS..XXXL)
    pub jersey_size: String,
    /// Number printed on the jersey, if any
    #[serde(default)]
    pub jersey_number: Option<String>,
    pub quantity: u32,
    /// Price per jersey
    pub unit_price: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub source: OrderSource,
    #[serde(default)]
    pub notes: Option<String>,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
}

impl Order {
    /// Generate an order ID based on timestamp plus a short random suffix
    pub fn generate_id(epoch_millis: u64) -> String {
        format!("ORD-{}-{}", epoch_millis, random_suffix())
    }

    /// Total price of the order
    pub fn total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    pub jersey_size: String,
    #[serde(default)]
    pub jersey_number: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub team_name: Option<String>,
    pub jersey_size: Option<String>,
    pub jersey_number: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<f64>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order: Order,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

/// Customer ID in format: "CUS-<epoch_millis>-<4 hex>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    /// Contact id on the invoicing service once synced
    #[serde(default)]
    pub zoho_contact_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Customer {
    pub fn generate_id(epoch_millis: u64) -> String {
        format!("CUS-{}-{}", epoch_millis, random_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub customer: Customer,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Void,
}

/// Invoice ID in format: "INV-<epoch_millis>-<4 hex>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub order_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub email: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
    #[serde(default)]
    pub status: InvoiceStatus,
    /// YYYY-MM-DD
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub zoho_invoice_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Invoice {
    pub fn generate_id(epoch_millis: u64) -> String {
        format!("INV-{}-{}", epoch_millis, random_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub order_id: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub invoice: Invoice,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<Invoice>,
}

// ---------------------------------------------------------------------------
// Public client submissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    New,
    Converted,
    Rejected,
}

/// An order request sent through the public portal, awaiting staff review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSubmission {
    pub id: String,
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    pub jersey_size: String,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: SubmissionStatus,
    /// Set once the submission has been turned into an order
    #[serde(default)]
    pub order_id: Option<String>,
    pub submitted_at: String,
}

impl ClientSubmission {
    pub fn generate_id(epoch_millis: u64) -> String {
        format!("SUB-{}-{}", epoch_millis, random_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    pub jersey_size: String,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSubmissionRequest {
    /// Price per jersey agreed with the client
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub submission: ClientSubmission,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionListResponse {
    pub submissions: Vec<ClientSubmission>,
}

// ---------------------------------------------------------------------------
// Auth & session
// ---------------------------------------------------------------------------

/// Identity mirrored into local session state after a successful sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub username: String,
    pub uid: String,
    pub role: String,
    /// RFC 3339
    pub login_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub session: Option<SessionInfo>,
}

// ---------------------------------------------------------------------------
// Validation results
// ---------------------------------------------------------------------------

/// Result of validating a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    pub is_valid: bool,
    /// Normalized (trimmed) value
    pub value: String,
    pub errors: Vec<String>,
}

/// Aggregated result of validating a whole record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub is_valid: bool,
    /// Flattened, each prefixed with the field label
    pub errors: Vec<String>,
}

/// Independent password strength checks; all must pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub min_length: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_digit: bool,
    pub has_symbol: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordCheckRequest {
    pub password: String,
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

/// Full export of every known collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub created_at: String,
    pub collections: BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupImportResponse {
    pub restored_collections: usize,
    pub restored_records: usize,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Record ids
// ---------------------------------------------------------------------------

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_order_id() {
        let id = Order::generate_id(1702516122000);
        assert!(id.starts_with("ORD-1702516122000-"));
        assert_eq!(id.len(), "ORD-1702516122000-".len() + 4);

        let suffix = &id["ORD-1702516122000-".len()..];
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_order_total() {
        let order = Order {
            id: "ORD-1-ABCD".to_string(),
            customer_id: None,
            customer_name: "Alice".to_string(),
            email: "a@b.com".to_string(),
            phone: None,
            team_name: None,
            jersey_size: "M".to_string(),
            jersey_number: None,
            quantity: 3,
            unit_price: 25.5,
            status: OrderStatus::Pending,
            source: OrderSource::Staff,
            notes: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(order.total(), 76.5);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("ASC"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::parse("desc"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("sideways"), None);
    }

    #[test]
    fn test_session_info_uses_login_time_key() {
        let session = SessionInfo {
            username: "alice@example.com".to_string(),
            uid: "u1".to_string(),
            role: "admin".to_string(),
            login_time: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("loginTime").is_some());
        assert!(json.get("login_time").is_none());
    }
}
