use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{info, warn};
use shared::{
    CreateCustomerRequest, Customer, CustomerListResponse, CustomerResponse, ListQuery, SortDirection,
    UpdateCustomerRequest,
};

use crate::backend::domain::data_service::DataService;
use crate::backend::domain::validation::validate_customer;

pub const CUSTOMERS_COLLECTION: &str = "customers";

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Service for managing customers; emails are unique and stored lowercase
#[derive(Clone)]
pub struct CustomerService {
    data: DataService,
}

impl CustomerService {
    pub fn new(data: DataService) -> Self {
        Self { data }
    }

    pub async fn create_customer(&self, request: CreateCustomerRequest) -> Result<CustomerResponse> {
        info!("Creating customer: {}", request.name);

        let validation = validate_customer(&request);
        if !validation.is_valid {
            bail!("Invalid customer: {}", validation.errors.join("; "));
        }
        if let Some(existing) = self.find_by_email(&request.email).await? {
            bail!("A customer with email {} already exists ({})", existing.email, existing.id);
        }

        let now = Utc::now();
        let timestamp = now.to_rfc3339();
        let customer = Customer {
            id: Customer::generate_id(now.timestamp_millis() as u64),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: non_empty(request.phone),
            team_name: non_empty(request.team_name),
            zoho_contact_id: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        self.data.save_typed(CUSTOMERS_COLLECTION, &customer).await?;
        info!("✅ Created customer {} with ID: {}", customer.name, customer.id);

        Ok(CustomerResponse { customer, success_message: "Customer created successfully".to_string() })
    }

    pub async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        let customer = self.data.get_as::<Customer>(CUSTOMERS_COLLECTION, customer_id).await?;
        if customer.is_none() {
            warn!("Customer not found: {}", customer_id);
        }
        Ok(customer)
    }

    pub async fn list_customers(&self, params: &ListQuery) -> Result<CustomerListResponse> {
        let query = DataService::list_query(CUSTOMERS_COLLECTION, params, ("name", SortDirection::Asc));
        let customers: Vec<Customer> = self.data.load_as(&query).await?;
        Ok(CustomerListResponse { customers })
    }

    /// Case-insensitive lookup by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let email = email.trim().to_lowercase();
        let customers = self.list_customers(&ListQuery::default()).await?.customers;
        Ok(customers.into_iter().find(|c| c.email == email))
    }

    pub async fn update_customer(&self, customer_id: &str, request: UpdateCustomerRequest) -> Result<CustomerResponse> {
        info!("Updating customer: {}", customer_id);

        let mut customer = self
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| anyhow!("Customer not found: {}", customer_id))?;

        if let Some(name) = request.name {
            customer.name = name.trim().to_string();
        }
        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            if email != customer.email {
                if let Some(other) = self.find_by_email(&email).await? {
                    bail!("A customer with email {} already exists ({})", email, other.id);
                }
            }
            customer.email = email;
        }
        if let Some(phone) = request.phone {
            customer.phone = non_empty(Some(phone));
        }
        if let Some(team) = request.team_name {
            customer.team_name = non_empty(Some(team));
        }

        let validation = validate_customer(&CreateCustomerRequest {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            team_name: customer.team_name.clone(),
        });
        if !validation.is_valid {
            bail!("Invalid customer: {}", validation.errors.join("; "));
        }

        customer.updated_at = Utc::now().to_rfc3339();
        self.data.save_typed(CUSTOMERS_COLLECTION, &customer).await?;

        Ok(CustomerResponse { customer, success_message: "Customer updated successfully".to_string() })
    }

    /// Remember the invoicing-service contact for a customer
    pub async fn link_zoho_contact(&self, customer_id: &str, contact_id: &str) -> Result<()> {
        let mut fields = serde_json::Map::new();
        fields.insert("zohoContactId".to_string(), serde_json::Value::String(contact_id.to_string()));
        self.data.merge(CUSTOMERS_COLLECTION, customer_id, fields).await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> Result<()> {
        info!("Deleting customer: {}", customer_id);
        if !self.data.delete(CUSTOMERS_COLLECTION, customer_id).await? {
            bail!("Customer not found: {}", customer_id);
        }
        Ok(())
    }
}
