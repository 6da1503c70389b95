//! # Invoice Service
//!
//! Invoices are created from existing orders and can be pushed to Zoho Books.
//! Syncing reuses the customer's Zoho contact when one is linked (or one with
//! the same email exists) and creates it otherwise.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use shared::{
    CreateInvoiceRequest, Invoice, InvoiceListResponse, InvoiceResponse, InvoiceStatus, ListQuery, SortDirection,
};
use std::sync::Arc;

use crate::backend::domain::customer_service::CustomerService;
use crate::backend::domain::data_service::DataService;
use crate::backend::domain::order_service::OrderService;
use crate::backend::domain::validation::validate_invoice;
use crate::backend::io::clients::zoho::{ContactPerson, LineItem, NewContact, NewInvoice, ZohoClient};

pub const INVOICES_COLLECTION: &str = "invoices";

#[derive(Clone)]
pub struct InvoiceService {
    data: DataService,
    orders: OrderService,
    customers: CustomerService,
    zoho: Option<Arc<ZohoClient>>,
}

impl InvoiceService {
    pub fn new(data: DataService, orders: OrderService, customers: CustomerService) -> Self {
        Self { data, orders, customers, zoho: None }
    }

    pub fn with_zoho(mut self, zoho: Arc<ZohoClient>) -> Self {
        self.zoho = Some(zoho);
        self
    }

    /// Create a draft invoice for an existing order
    pub async fn create_invoice(&self, request: CreateInvoiceRequest) -> Result<InvoiceResponse> {
        info!("🧾 Creating invoice for order {}", request.order_id);

        let order = self
            .orders
            .get_order(&request.order_id)
            .await?
            .ok_or_else(|| anyhow!("Order not found: {}", request.order_id))?;

        let now = Utc::now();
        let timestamp = now.to_rfc3339();
        let plural = if order.quantity == 1 { "jersey" } else { "jerseys" };
        let team = order.team_name.as_deref().unwrap_or("team");
        let invoice = Invoice {
            id: Invoice::generate_id(now.timestamp_millis() as u64),
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            customer_name: order.customer_name.clone(),
            email: order.email.clone(),
            description: format!("{} x {} {} (size {})", order.quantity, team, plural, order.jersey_size),
            quantity: order.quantity,
            unit_price: order.unit_price,
            total: order.total(),
            status: InvoiceStatus::Draft,
            due_date: request.due_date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            zoho_invoice_id: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };

        let validation = validate_invoice(&invoice);
        if !validation.is_valid {
            bail!("Invalid invoice: {}", validation.errors.join("; "));
        }

        self.data.save_typed(INVOICES_COLLECTION, &invoice).await?;
        info!("✅ Created invoice {} for order {}", invoice.id, invoice.order_id);

        Ok(InvoiceResponse { invoice, success_message: "Invoice created successfully".to_string() })
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        self.data.get_as::<Invoice>(INVOICES_COLLECTION, invoice_id).await
    }

    pub async fn list_invoices(&self, params: &ListQuery) -> Result<InvoiceListResponse> {
        let query = DataService::list_query(INVOICES_COLLECTION, params, ("createdAt", SortDirection::Desc));
        let invoices: Vec<Invoice> = self.data.load_as(&query).await?;
        Ok(InvoiceListResponse { invoices })
    }

    pub async fn update_status(&self, invoice_id: &str, status: InvoiceStatus) -> Result<InvoiceResponse> {
        info!("Setting invoice {} status to {:?}", invoice_id, status);

        let mut invoice = self
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| anyhow!("Invoice not found: {}", invoice_id))?;
        if invoice.status == InvoiceStatus::Void && status != InvoiceStatus::Void {
            bail!("Invoice {} is void and cannot change status", invoice_id);
        }

        invoice.status = status;
        invoice.updated_at = Utc::now().to_rfc3339();
        self.data.save_typed(INVOICES_COLLECTION, &invoice).await?;

        Ok(InvoiceResponse { invoice, success_message: "Invoice status updated".to_string() })
    }

    pub async fn delete_invoice(&self, invoice_id: &str) -> Result<()> {
        info!("Deleting invoice: {}", invoice_id);
        if !self.data.delete(INVOICES_COLLECTION, invoice_id).await? {
            bail!("Invoice not found: {}", invoice_id);
        }
        Ok(())
    }

    /// Push an invoice to Zoho Books and remember the remote id
    pub async fn sync_to_zoho(&self, invoice_id: &str) -> Result<InvoiceResponse> {
        let zoho = match &self.zoho {
            Some(zoho) if zoho.is_configured() => zoho.clone(),
            _ => bail!("Zoho Books is not configured"),
        };

        let mut invoice = self
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| anyhow!("Invoice not found: {}", invoice_id))?;
        if let Some(remote_id) = &invoice.zoho_invoice_id {
            info!("Invoice {} already synced as {}", invoice.id, remote_id);
            return Ok(InvoiceResponse { invoice, success_message: "Invoice already synced".to_string() });
        }

        info!("🔄 Syncing invoice {} to Zoho Books", invoice.id);
        let contact_id = self.resolve_contact(&zoho, &invoice).await?;

        let remote = zoho
            .create_invoice(&NewInvoice {
                customer_id: contact_id,
                reference_number: Some(invoice.order_id.clone()),
                due_date: invoice.due_date.clone(),
                line_items: vec![LineItem {
                    name: "Custom jersey".to_string(),
                    description: invoice.description.clone(),
                    rate: invoice.unit_price,
                    quantity: invoice.quantity,
                }],
            })
            .await
            .map_err(|e| {
                error!("❌ Zoho invoice creation failed for {}: {}", invoice.id, e);
                e
            })
            .context("Failed to create the invoice in Zoho Books")?;

        if invoice.status == InvoiceStatus::Sent {
            if let Err(e) = zoho.mark_invoice_sent(&remote.invoice_id).await {
                warn!("Could not mark Zoho invoice {} as sent: {}", remote.invoice_id, e);
            }
        }

        invoice.zoho_invoice_id = Some(remote.invoice_id);
        invoice.updated_at = Utc::now().to_rfc3339();
        self.data.save_typed(INVOICES_COLLECTION, &invoice).await?;
        info!("✅ Invoice {} synced to Zoho Books", invoice.id);

        Ok(InvoiceResponse { invoice, success_message: "Invoice synced to Zoho Books".to_string() })
    }

    async fn resolve_contact(&self, zoho: &ZohoClient, invoice: &Invoice) -> Result<String> {
        let customer = match &invoice.customer_id {
            Some(id) => self.customers.get_customer(id).await?,
            None => self.customers.find_by_email(&invoice.email).await?,
        };
        if let Some(contact_id) = customer.as_ref().and_then(|c| c.zoho_contact_id.clone()) {
            return Ok(contact_id);
        }

        let existing = zoho
            .list_contacts()
            .await
            .context("Failed to list Zoho Books contacts")?
            .into_iter()
            .find(|c| c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&invoice.email)));

        let contact_id = match existing {
            Some(contact) => contact.contact_id,
            None => {
                let company_name = customer.as_ref().and_then(|c| c.team_name.clone());
                zoho.create_contact(&NewContact {
                    contact_name: invoice.customer_name.clone(),
                    company_name,
                    contact_persons: vec![ContactPerson {
                        first_name: invoice.customer_name.clone(),
                        email: invoice.email.clone(),
                        is_primary_contact: true,
                    }],
                })
                .await
                .context("Failed to create the Zoho Books contact")?
                .contact_id
            }
        };

        if let Some(customer) = &customer {
            if let Err(e) = self.customers.link_zoho_contact(&customer.id, &contact_id).await {
                warn!("Could not store Zoho contact for customer {}: {}", customer.id, e);
            }
        }
        Ok(contact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::order_service::tests::{sample_request, setup_data_service};

    fn setup_service() -> (InvoiceService, OrderService) {
        let data = setup_data_service();
        let orders = OrderService::new(data.clone());
        let customers = CustomerService::new(data.clone());
        (InvoiceService::new(data, orders.clone(), customers), orders)
    }

    #[tokio::test]
    async fn test_create_invoice_from_order() {
        let (service, orders) = setup_service();
        let order = orders.create_order(sample_request()).await.unwrap().order;

        let request = CreateInvoiceRequest { order_id: order.id.clone(), due_date: Some("2026-11-30".to_string()) };
        let invoice = service.create_invoice(request).await.unwrap().invoice;

        assert!(invoice.id.starts_with("INV-"));
        assert_eq!(invoice.order_id, order.id);
        assert_eq!(invoice.total, 75.0);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.description, "3 x Harbor FC jerseys (size M)");
        assert_eq!(service.get_invoice(&invoice.id).await.unwrap().unwrap(), invoice);
    }

    #[tokio::test]
    async fn test_create_invoice_requires_order() {
        let (service, _) = setup_service();
        let request = CreateInvoiceRequest { order_id: "ORD-1700000000000-ABCD".to_string(), due_date: None };
        assert!(service.create_invoice(request).await.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_status_changes_and_void_is_final() {
        let (service, orders) = setup_service();
        let order = orders.create_order(sample_request()).await.unwrap().order;
        let invoice = service
            .create_invoice(CreateInvoiceRequest { order_id: order.id, due_date: None })
            .await
            .unwrap()
            .invoice;

        let paid = service.update_status(&invoice.id, InvoiceStatus::Paid).await.unwrap();
        assert_eq!(paid.invoice.status, InvoiceStatus::Paid);

        service.update_status(&invoice.id, InvoiceStatus::Void).await.unwrap();
        assert!(service.update_status(&invoice.id, InvoiceStatus::Sent).await.is_err());

        let listed = service.list_invoices(&ListQuery::default()).await.unwrap().invoices;
        assert_eq!(listed.len(), 1);

        service.delete_invoice(&invoice.id).await.unwrap();
        assert!(service.get_invoice(&invoice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_without_zoho_fails_fast() {
        let (service, orders) = setup_service();
        let order = orders.create_order(sample_request()).await.unwrap().order;
        let invoice = service
            .create_invoice(CreateInvoiceRequest { order_id: order.id, due_date: None })
            .await
            .unwrap()
            .invoice;

        let err = service.sync_to_zoho(&invoice.id).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
