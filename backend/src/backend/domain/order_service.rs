//! # Order Service
//!
//! CRUD for jersey orders stored in the `orders` collection, plus CSV export.
//!
//! ## Business Rules
//!
//! - New orders are validated before they are written and start as `pending`
//! - Updates are merged onto the stored order and re-validated as a whole
//! - Lists default to newest first

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use shared::{
    CreateOrderRequest, ListQuery, Order, OrderListResponse, OrderResponse, OrderSource, OrderStatus, SortDirection,
    UpdateOrderRequest,
};

use crate::backend::domain::data_service::DataService;
use crate::backend::domain::validation::validate_order;

pub const ORDERS_COLLECTION: &str = "orders";

/// One row of the CSV export
#[derive(Debug, Serialize)]
struct OrderCsvRow<'a> {
    id: &'a str,
    created_at: &'a str,
    customer_name: &'a str,
    email: &'a str,
    phone: &'a str,
    team_name: &'a str,
    jersey_size: &'a str,
    jersey_number: &'a str,
    quantity: u32,
    unit_price: String,
    total: String,
    status: OrderStatus,
    source: OrderSource,
    notes: &'a str,
}

impl<'a> From<&'a Order> for OrderCsvRow<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            id: &order.id,
            created_at: &order.created_at,
            customer_name: &order.customer_name,
            email: &order.email,
            phone: order.phone.as_deref().unwrap_or(""),
            team_name: order.team_name.as_deref().unwrap_or(""),
            jersey_size: &order.jersey_size,
            jersey_number: order.jersey_number.as_deref().unwrap_or(""),
            quantity: order.quantity,
            unit_price: format!("{:.2}", order.unit_price),
            total: format!("{:.2}", order.total()),
            status: order.status,
            source: order.source,
            notes: order.notes.as_deref().unwrap_or(""),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn request_from_order(order: &Order) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: order.customer_id.clone(),
        customer_name: order.customer_name.clone(),
        email: order.email.clone(),
        phone: order.phone.clone(),
        team_name: order.team_name.clone(),
        jersey_size: order.jersey_size.clone(),
        jersey_number: order.jersey_number.clone(),
        quantity: order.quantity,
        unit_price: order.unit_price,
        notes: order.notes.clone(),
    }
}

#[derive(Clone)]
pub struct OrderService {
    data: DataService,
}

impl OrderService {
    pub fn new(data: DataService) -> Self {
        Self { data }
    }

    /// Create a new order placed by staff
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResponse> {
        self.create_order_from(request, OrderSource::Staff).await
    }

    /// Create a new order, recording where it came from
    pub async fn create_order_from(&self, request: CreateOrderRequest, source: OrderSource) -> Result<OrderResponse> {
        info!("📝 Creating order for {} ({} x {})", request.customer_name, request.quantity, request.jersey_size);

        let validation = validate_order(&request);
        if !validation.is_valid {
            bail!("Invalid order: {}", validation.errors.join("; "));
        }

        let now = Utc::now();
        let timestamp = now.to_rfc3339();
        let order = Order {
            id: Order::generate_id(now.timestamp_millis() as u64),
            customer_id: non_empty(request.customer_id),
            customer_name: request.customer_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: non_empty(request.phone),
            team_name: non_empty(request.team_name),
            jersey_size: request.jersey_size.trim().to_uppercase(),
            jersey_number: non_empty(request.jersey_number),
            quantity: request.quantity,
            unit_price: request.unit_price,
            status: OrderStatus::Pending,
            source,
            notes: non_empty(request.notes),
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        self.data.save_typed(ORDERS_COLLECTION, &order).await?;
        info!("✅ Created order {}", order.id);

        Ok(OrderResponse { order, success_message: "Order created successfully".to_string() })
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let order = self.data.get_as::<Order>(ORDERS_COLLECTION, order_id).await?;
        if order.is_none() {
            warn!("Order not found: {}", order_id);
        }
        Ok(order)
    }

    pub async fn list_orders(&self, params: &ListQuery) -> Result<OrderListResponse> {
        let query = DataService::list_query(ORDERS_COLLECTION, params, ("createdAt", SortDirection::Desc));
        let orders: Vec<Order> = self.data.load_as(&query).await?;
        info!("Found {} orders", orders.len());
        Ok(OrderListResponse { orders })
    }

    /// Merge the provided fields onto an existing order
    pub async fn update_order(&self, order_id: &str, request: UpdateOrderRequest) -> Result<OrderResponse> {
        info!("Updating order: {}", order_id);

        let mut order = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| anyhow!("Order not found: {}", order_id))?;

        if let Some(name) = request.customer_name {
            order.customer_name = name.trim().to_string();
        }
        if let Some(email) = request.email {
            order.email = email.trim().to_lowercase();
        }
        if let Some(phone) = request.phone {
            order.phone = non_empty(Some(phone));
        }
        if let Some(team) = request.team_name {
            order.team_name = non_empty(Some(team));
        }
        if let Some(size) = request.jersey_size {
            order.jersey_size = size.trim().to_uppercase();
        }
        if let Some(number) = request.jersey_number {
            order.jersey_number = non_empty(Some(number));
        }
        if let Some(quantity) = request.quantity {
            order.quantity = quantity;
        }
        if let Some(price) = request.unit_price {
            order.unit_price = price;
        }
        if let Some(status) = request.status {
            order.status = status;
        }
        if let Some(notes) = request.notes {
            order.notes = non_empty(Some(notes));
        }

        let validation = validate_order(&request_from_order(&order));
        if !validation.is_valid {
            bail!("Invalid order: {}", validation.errors.join("; "));
        }

        order.updated_at = Utc::now().to_rfc3339();
        self.data.save_typed(ORDERS_COLLECTION, &order).await?;
        info!("✅ Updated order {}", order.id);

        Ok(OrderResponse { order, success_message: "Order updated successfully".to_string() })
    }

    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<OrderResponse> {
        info!("Setting order {} status to {:?}", order_id, status);
        let request = UpdateOrderRequest { status: Some(status), ..UpdateOrderRequest::default() };
        let mut response = self.update_order(order_id, request).await?;
        response.success_message = "Order status updated".to_string();
        Ok(response)
    }

    pub async fn delete_order(&self, order_id: &str) -> Result<()> {
        info!("Deleting order: {}", order_id);
        if !self.data.delete(ORDERS_COLLECTION, order_id).await? {
            bail!("Order not found: {}", order_id);
        }
        Ok(())
    }

    /// Render orders as CSV, newest first
    pub async fn export_csv(&self) -> Result<String> {
        let orders = self.list_orders(&ListQuery::default()).await?.orders;
        info!("📄 Exporting {} orders as CSV", orders.len());

        let mut writer = csv::Writer::from_writer(Vec::new());
        for order in &orders {
            writer.serialize(OrderCsvRow::from(order))?;
        }
        if orders.is_empty() {
            writer.write_record([
                "id",
                "created_at",
                "customer_name",
                "email",
                "phone",
                "team_name",
                "jersey_size",
                "jersey_number",
                "quantity",
                "unit_price",
                "total",
                "status",
                "source",
                "notes",
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| anyhow!("Failed to flush CSV: {}", e))?;
        Ok(String::from_utf8(bytes)?)
    }
}
