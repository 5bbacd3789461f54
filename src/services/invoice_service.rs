// src/services/invoice_service.rs

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, INVOICE_PREFIX},
        money::{LineItem, DEFAULT_VAT_RATE},
        permissions::{apply_patch, patch_touches},
    },
    db::{DocumentStore, Filter, Repository},
    models::{
        invoice::{
            due_date_for, CreateInvoicePayload, Invoice, InvoiceFilters, Payment, PaymentPayload,
            PaymentStatus, DEFAULT_PAYMENT_TERMS,
        },
        service_call::ServiceCall,
    },
    services::today,
};

const PRICING_FIELDS: [&str; 2] = ["lineItems", "vatRate"];

#[derive(Clone)]
pub struct InvoiceService {
    invoices: Repository<Invoice>,
    calls: Repository<ServiceCall>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            invoices: Repository::new(store.clone()),
            calls: Repository::new(store),
        }
    }

    /// Payment state is derived at read time, so the status filter runs after refresh.
    pub async fn list(&self, owner: Uuid, filters: InvoiceFilters) -> Result<Vec<Invoice>, AppError> {
        let filter = Filter::new()
            .eq_opt("customer", filters.customer)
            .eq_opt("serviceCall", filters.service_call);
        let mut invoices = self.invoices.list(owner, &filter).await?;

        let (today, now) = (today(), Utc::now());
        for invoice in invoices.iter_mut() {
            invoice.refresh(today, now);
        }
        if let Some(status) = filters.payment_status {
            invoices.retain(|invoice| invoice.payment_status == status);
        }
        Ok(invoices)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Invoice, AppError> {
        let mut invoice = self.invoices.get(owner, id).await?;
        invoice.refresh(today(), Utc::now());
        Ok(invoice)
    }

    /// Invoices a completed call. The invoice insert and the call's move to
    /// `invoiced` commit together.
    pub async fn create(&self, owner: Uuid, payload: CreateInvoicePayload) -> Result<Invoice, AppError> {
        let mut call = self.calls.get(owner, payload.service_call).await?;

        let existing = self
            .invoices
            .list(owner, &Filter::new().eq("serviceCall", call.id))
            .await?;
        if let Some(mut invoice) = existing.into_iter().next() {
            invoice.refresh(today(), Utc::now());
            tracing::warn!(
                "Service call {} already invoiced as {}",
                call.call_number,
                invoice.invoice_number
            );
            let body = serde_json::to_value(&invoice)
                .map_err(|e| anyhow::anyhow!("failed to serialize invoice: {}", e))?;
            return Err(AppError::InvoiceAlreadyExists(Box::new(body)));
        }

        let now = Utc::now();
        if let Err(e) = call.mark_invoiced(now) {
            tracing::warn!("Invoice refused for {}: {}", call.call_number, e);
            return Err(e);
        }
        call.updated_at = now;

        let line_items = payload.line_items.unwrap_or_else(|| {
            call.parts_used
                .iter()
                .map(|part| LineItem::new(part.name.clone(), part.quantity, part.unit_price))
                .collect()
        });
        if line_items.is_empty() {
            return Err(AppError::invalid(
                "An invoice needs line items; the service call has no parts to bill",
            ));
        }

        let issue_date = payload.issue_date.unwrap_or_else(today);
        let payment_terms = payload.payment_terms.unwrap_or(DEFAULT_PAYMENT_TERMS);
        let default_due_date = due_date_for(issue_date, payment_terms)?;
        let due_date = payload.due_date.unwrap_or(default_due_date);
        if due_date < issue_date {
            return Err(AppError::invalid("dueDate must not be before issueDate"));
        }

        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: String::new(),
            service_call: call.id,
            customer: call.customer,
            line_items,
            vat_rate: payload.vat_rate.unwrap_or(DEFAULT_VAT_RATE),
            subtotal: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            issue_date,
            due_date,
            payment_terms,
            payments: Vec::new(),
            paid_amount: Decimal::ZERO,
            balance: Decimal::ZERO,
            payment_status: PaymentStatus::Unpaid,
            paid_date: None,
            notes: payload.notes,
            terms: payload.terms,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        invoice.recalculate()?;
        invoice.refresh(today(), now);

        invoice.invoice_number = match supplied(payload.invoice_number.as_deref()) {
            Some(number) => number,
            None => self.invoices.next_identifier(INVOICE_PREFIX).await?,
        };

        self.invoices
            .commit(vec![
                Repository::insert_write(&invoice)?,
                Repository::update_write(&call)?,
            ])
            .await?;

        tracing::info!(
            "💰 Invoice {} issued for service call {} (total {})",
            invoice.invoice_number,
            call.call_number,
            invoice.total_amount
        );
        Ok(invoice)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Invoice, AppError> {
        let current = self.get(owner, id).await?;

        let repricing = patch_touches(patch, &PRICING_FIELDS);
        if repricing && current.is_paid() {
            return Err(AppError::conflict("A paid invoice cannot be repriced"));
        }

        let mut invoice = apply_patch(&current, patch)?;

        if patch_touches(patch, &["paymentTerms"]) {
            let due_date = due_date_for(invoice.issue_date, invoice.payment_terms)?;
            if !patch_touches(patch, &["dueDate"]) {
                invoice.due_date = due_date;
            }
        }
        if invoice.due_date < invoice.issue_date {
            return Err(AppError::invalid("dueDate must not be before issueDate"));
        }

        let now = Utc::now();
        invoice.recalculate()?;
        invoice.refresh(today(), now);
        if invoice.total_amount < invoice.paid_amount {
            return Err(AppError::conflict(format!(
                "New total {} is below the {} already paid",
                invoice.total_amount, invoice.paid_amount
            )));
        }
        invoice.updated_at = now;

        self.invoices.save(&invoice).await?;
        tracing::info!("Invoice {} updated", invoice.invoice_number);
        Ok(invoice)
    }

    pub async fn record_payment(
        &self,
        owner: Uuid,
        id: Uuid,
        payload: PaymentPayload,
    ) -> Result<Invoice, AppError> {
        let mut invoice = self.get(owner, id).await?;
        let now = Utc::now();

        let payment = Payment {
            id: Uuid::new_v4(),
            amount: payload.amount,
            date: payload.date.unwrap_or(now),
            method: payload.method,
            reference: payload.reference,
            recorded_by: owner,
        };
        if let Err(e) = invoice.record_payment(payment, today()) {
            tracing::warn!("Payment refused on invoice {}: {}", invoice.invoice_number, e);
            return Err(e);
        }
        invoice.updated_at = now;

        self.invoices.save(&invoice).await?;
        tracing::info!(
            "💳 Payment of {} recorded on invoice {} (balance {})",
            payload.amount,
            invoice.invoice_number,
            invoice.balance
        );
        Ok(invoice)
    }

    /// Unpaid invoices only. The linked call goes back to `completed`.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let invoice = self.invoices.get(owner, id).await?;
        if !invoice.payments.is_empty() {
            tracing::warn!("Refused to delete invoice {}: has payments", invoice.invoice_number);
            return Err(AppError::conflict("An invoice with recorded payments cannot be deleted"));
        }

        let mut writes = vec![Repository::delete_write(&invoice)];
        if let Some(mut call) = self.calls.find(owner, invoice.service_call).await? {
            call.revert_invoiced();
            call.updated_at = Utc::now();
            writes.push(Repository::update_write(&call)?);
        }
        self.invoices.commit(writes).await?;

        tracing::info!("🗑️ Invoice {} deleted", invoice.invoice_number);
        Ok(())
    }
}
