//! # Client Submission Service
//!
//! Public portal order requests. Input is validated as typed, then HTML-escaped
//! before it is stored in `submissions`. Staff review submissions and convert
//! them into real orders (or reject them). Review transitions run one at a
//! time, so a submission converts to at most one order.

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use shared::{
    ClientSubmission, ConvertSubmissionRequest, CreateOrderRequest, ListQuery, OrderResponse, OrderSource,
    SortDirection, SubmissionListResponse, SubmissionResponse, SubmissionStatus, SubmitOrderRequest,
};

use crate::backend::domain::data_service::DataService;
use crate::backend::domain::order_service::OrderService;
use crate::backend::domain::security::{sanitize_input, sanitize_optional};
use crate::backend::domain::validation::validate_submission;

pub const SUBMISSIONS_COLLECTION: &str = "submissions";

/// Undo the escaping applied on submit so order validation sees the raw text
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&")
}

#[derive(Clone)]
pub struct SubmissionService {
    data: DataService,
    orders: OrderService,
    review_lock: Arc<Mutex<()>>,
}

impl SubmissionService {
    pub fn new(data: DataService, orders: OrderService) -> Self {
        Self { data, orders, review_lock: Arc::new(Mutex::new(())) }
    }

    pub async fn submit(&self, request: SubmitOrderRequest) -> Result<SubmissionResponse> {
        info!("📨 Portal submission from {}", request.email.trim());

        let validation = validate_submission(&request);
        if !validation.is_valid {
            bail!("Invalid submission: {}", validation.errors.join("; "));
        }

        let now = Utc::now();
        let submission = ClientSubmission {
            id: ClientSubmission::generate_id(now.timestamp_millis() as u64),
            customer_name: sanitize_input(&request.customer_name),
            email: sanitize_input(&request.email).to_lowercase(),
            phone: sanitize_optional(request.phone.as_deref()),
            team_name: sanitize_optional(request.team_name.as_deref()),
            jersey_size: sanitize_input(&request.jersey_size).to_uppercase(),
            quantity: request.quantity,
            notes: sanitize_optional(request.notes.as_deref()),
            status: SubmissionStatus::New,
            order_id: None,
            submitted_at: now.to_rfc3339(),
        };

        self.data.save_typed(SUBMISSIONS_COLLECTION, &submission).await?;
        info!("✅ Stored submission {}", submission.id);

        Ok(SubmissionResponse {
            submission,
            success_message: "Thank you! Your order request has been received.".to_string(),
        })
    }

    pub async fn get_submission(&self, submission_id: &str) -> Result<Option<ClientSubmission>> {
        self.data.get_as::<ClientSubmission>(SUBMISSIONS_COLLECTION, submission_id).await
    }

    pub async fn list_submissions(&self, params: &ListQuery) -> Result<SubmissionListResponse> {
        let query = DataService::list_query(SUBMISSIONS_COLLECTION, params, ("submittedAt", SortDirection::Desc));
        let submissions: Vec<ClientSubmission> = self.data.load_as(&query).await?;
        Ok(SubmissionListResponse { submissions })
    }

    /// Turn a new submission into a pending order at the agreed price
    pub async fn convert_to_order(
        &self,
        submission_id: &str,
        request: ConvertSubmissionRequest,
    ) -> Result<OrderResponse> {
        info!("Converting submission {} to an order", submission_id);
        let _review = self.review_lock.lock().await;

        let mut submission = self
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| anyhow!("Submission not found: {}", submission_id))?;
        match submission.status {
            SubmissionStatus::New => {}
            SubmissionStatus::Converted => bail!(
                "Submission {} was already converted to order {}",
                submission_id,
                submission.order_id.as_deref().unwrap_or("?")
            ),
            SubmissionStatus::Rejected => bail!("Submission {} was rejected", submission_id),
        }

        let order_request = CreateOrderRequest {
            customer_id: None,
            customer_name: unescape(&submission.customer_name),
            email: unescape(&submission.email),
            phone: submission.phone.as_deref().map(unescape),
            team_name: submission.team_name.as_deref().map(unescape),
            jersey_size: submission.jersey_size.clone(),
            jersey_number: None,
            quantity: submission.quantity,
            unit_price: request.unit_price,
            notes: submission.notes.as_deref().map(unescape),
        };
        let response = self.orders.create_order_from(order_request, OrderSource::Portal).await?;

        submission.status = SubmissionStatus::Converted;
        submission.order_id = Some(response.order.id.clone());
        if let Err(e) = self.data.save_typed(SUBMISSIONS_COLLECTION, &submission).await {
            warn!("Order {} created but submission {} was not updated: {}", response.order.id, submission_id, e);
            return Err(e);
        }

        info!("✅ Submission {} converted to order {}", submission_id, response.order.id);
        Ok(response)
    }

    pub async fn reject(&self, submission_id: &str) -> Result<SubmissionResponse> {
        let _review = self.review_lock.lock().await;
        let mut submission = self
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| anyhow!("Submission not found: {}", submission_id))?;
        if submission.status == SubmissionStatus::Converted {
            bail!("Submission {} was already converted", submission_id);
        }

        submission.status = SubmissionStatus::Rejected;
        self.data.save_typed(SUBMISSIONS_COLLECTION, &submission).await?;
        Ok(SubmissionResponse { submission, success_message: "Submission rejected".to_string() })
    }
}
