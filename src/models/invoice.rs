// src/models/invoice.rs

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        money::{calculate_totals, LineItem},
        permissions::FieldPermissions,
    },
    db::Document,
};

pub const DEFAULT_PAYMENT_TERMS: u32 = 30;
pub const MAX_PAYMENT_TERMS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Eft,
    Cheque,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    #[schema(example = "400.00")]
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    #[schema(example = "INV-000001")]
    pub invoice_number: String,
    pub service_call: Uuid,
    pub customer: Uuid,

    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub vat_rate: Decimal,
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,

    #[schema(value_type = String, format = Date)]
    pub issue_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
    pub payment_terms: u32,

    // Payment state, derived on every save and load
    #[serde(default)]
    pub payments: Vec<Payment>,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub payment_status: PaymentStatus,
    pub paid_date: Option<DateTime<Utc>>,

    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Invoice {
    const COLLECTION: &'static str = "invoices";
    const LABEL: &'static str = "Invoice";
    const UNIQUE_KEYS: &'static [&'static str] = &["invoiceNumber", "serviceCall"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "Invoice",
        immutable: &["invoiceNumber", "serviceCall"],
        editable: &[
            "lineItems",
            "vatRate",
            "dueDate",
            "paymentTerms",
            "notes",
            "terms",
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.created_by
    }
}

impl Invoice {
    pub fn recalculate(&mut self) -> Result<(), AppError> {
        let totals = calculate_totals(&mut self.line_items, self.vat_rate)?;
        self.subtotal = totals.subtotal;
        self.vat_amount = totals.vat_amount;
        self.total_amount = totals.total_amount;
        Ok(())
    }

    /// Recomputes paid amount, balance and payment status.
    pub fn refresh(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        self.paid_amount = self.payments.iter().map(|p| p.amount).sum();
        self.balance = self.total_amount - self.paid_amount;

        // Nothing paid is never settled, even on a zero total
        let settled = !self.paid_amount.is_zero() && self.paid_amount >= self.total_amount;
        self.payment_status = if settled {
            self.paid_date.get_or_insert(now);
            PaymentStatus::Paid
        } else if self.due_date < today {
            PaymentStatus::Overdue
        } else if self.paid_amount.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        };
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn record_payment(&mut self, payment: Payment, today: NaiveDate) -> Result<(), AppError> {
        if self.is_paid() {
            return Err(AppError::conflict("This invoice is already paid in full"));
        }
        if payment.amount <= Decimal::ZERO {
            return Err(AppError::invalid("Payment amount must be greater than zero"));
        }
        if payment.amount > self.balance {
            return Err(AppError::invalid(format!(
                "Payment amount {} exceeds the outstanding balance {}",
                payment.amount, self.balance
            )));
        }

        let now = payment.date;
        self.payments.push(payment);
        self.refresh(today, now);
        Ok(())
    }
}

pub fn due_date_for(issue_date: NaiveDate, payment_terms: u32) -> Result<NaiveDate, AppError> {
    if payment_terms > MAX_PAYMENT_TERMS {
        return Err(AppError::invalid(format!(
            "paymentTerms must be between 0 and {MAX_PAYMENT_TERMS} days"
        )));
    }
    issue_date
        .checked_add_days(Days::new(u64::from(payment_terms)))
        .ok_or_else(|| AppError::invalid("paymentTerms puts the due date out of range"))
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    /// Generated (INV-NNNNNN) when omitted.
    pub invoice_number: Option<String>,
    pub service_call: Uuid,
    /// Defaults to the parts used on the service call.
    pub line_items: Option<Vec<LineItem>>,
    pub vat_rate: Option<Decimal>,
    #[validate(range(max = 365, message = "Payment terms cannot exceed 365 days."))]
    pub payment_terms: Option<u32>,
    #[schema(value_type = Option<String>, format = Date)]
    pub issue_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[schema(example = "400.00")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilters {
    pub payment_status: Option<PaymentStatus>,
    pub customer: Option<Uuid>,
    pub service_call: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(total: i64) -> Invoice {
        let now = Utc::now();
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-000001".into(),
            service_call: Uuid::new_v4(),
            customer: Uuid::new_v4(),
            line_items: vec![LineItem::new("Labour", Decimal::ONE, Decimal::from(total))],
            vat_rate: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            issue_date: date(2026, 1, 1),
            due_date: date(2026, 1, 31),
            payment_terms: DEFAULT_PAYMENT_TERMS,
            payments: Vec::new(),
            paid_amount: Decimal::ZERO,
            balance: Decimal::ZERO,
            payment_status: PaymentStatus::Unpaid,
            paid_date: None,
            notes: None,
            terms: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        invoice.recalculate().unwrap();
        invoice.refresh(date(2026, 1, 1), now);
        invoice
    }

    fn payment(amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            amount: Decimal::from(amount),
            date: Utc::now(),
            method: PaymentMethod::BankTransfer,
            reference: None,
            recorded_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn payments_walk_through_partial_to_paid() {
        let today = date(2026, 1, 10);
        let mut inv = invoice(1000);
        assert_eq!(inv.balance, Decimal::from(1000));
        assert_eq!(inv.payment_status, PaymentStatus::Unpaid);

        inv.record_payment(payment(400), today).unwrap();
        assert_eq!(inv.balance, Decimal::from(600));
        assert_eq!(inv.payment_status, PaymentStatus::Partial);

        assert!(matches!(
            inv.record_payment(payment(700), today),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(inv.payments.len(), 1);

        inv.record_payment(payment(600), today).unwrap();
        assert_eq!(inv.balance, Decimal::ZERO);
        assert_eq!(inv.payment_status, PaymentStatus::Paid);
        assert!(inv.paid_date.is_some());

        assert!(matches!(
            inv.record_payment(payment(1), today),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut inv = invoice(100);
        let today = date(2026, 1, 2);
        assert!(matches!(inv.record_payment(payment(0), today), Err(AppError::InvalidInput(_))));
        assert!(matches!(inv.record_payment(payment(-5), today), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn unpaid_and_partial_become_overdue_after_due_date() {
        let after_due = date(2026, 2, 1);
        let now = Utc::now();

        let mut unpaid = invoice(1000);
        unpaid.refresh(after_due, now);
        assert_eq!(unpaid.payment_status, PaymentStatus::Overdue);

        let mut partial = invoice(1000);
        partial.record_payment(payment(100), date(2026, 1, 5)).unwrap();
        partial.refresh(after_due, now);
        assert_eq!(partial.payment_status, PaymentStatus::Overdue);
        assert_eq!(partial.balance, Decimal::from(900));
    }

    #[test]
    fn paid_is_never_overdue_and_paid_date_sticks() {
        let mut inv = invoice(100);
        inv.record_payment(payment(100), date(2026, 1, 2)).unwrap();
        let stamped = inv.paid_date;

        inv.refresh(date(2026, 6, 1), Utc::now() + chrono::Duration::days(30));
        assert_eq!(inv.payment_status, PaymentStatus::Paid);
        assert_eq!(inv.paid_date, stamped);
    }

    #[test]
    fn due_date_from_terms() {
        assert_eq!(due_date_for(date(2026, 1, 1), 30).unwrap(), date(2026, 1, 31));
        assert_eq!(due_date_for(date(2026, 1, 1), 0).unwrap(), date(2026, 1, 1));
        assert_eq!(due_date_for(date(2026, 1, 1), 365).unwrap(), date(2027, 1, 1));
    }

    #[test]
    fn terms_beyond_a_year_are_rejected() {
        assert!(matches!(
            due_date_for(date(2026, 1, 1), 366),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            due_date_for(date(2026, 1, 1), u32::MAX),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_total_without_payments_is_unpaid() {
        let mut inv = invoice(0);
        assert_eq!(inv.total_amount, Decimal::ZERO);
        assert_eq!(inv.payment_status, PaymentStatus::Unpaid);
        assert!(inv.paid_date.is_none());

        inv.refresh(date(2026, 2, 1), Utc::now());
        assert_eq!(inv.payment_status, PaymentStatus::Overdue);
        assert!(inv.paid_date.is_none());
    }
}
