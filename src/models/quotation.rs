// src/models/quotation.rs

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

pub const DEFAULT_VALIDITY_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    /// Statuses the explicit status update may set. `converted` is reserved for conversion.
    pub fn is_settable(&self) -> bool {
        !matches!(self, QuotationStatus::Converted)
    }

    /// Line items and VAT rate are frozen once the customer has answered.
    pub fn locks_pricing(&self) -> bool {
        matches!(
            self,
            QuotationStatus::Approved | QuotationStatus::Rejected | QuotationStatus::Converted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub id: Uuid,
    #[schema(example = "QT-000001")]
    pub quotation_number: String,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    pub equipment: Option<Uuid>,

    #[schema(example = "Cold room compressor replacement")]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[schema(example = "15")]
    pub vat_rate: Decimal,
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,

    pub status: QuotationStatus,
    #[schema(value_type = String, format = Date)]
    pub issue_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub valid_until: NaiveDate,
    pub sent_date: Option<DateTime<Utc>>,
    pub approved_date: Option<DateTime<Utc>>,
    pub rejected_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub converted_to_service_call: Option<Uuid>,
    pub converted_date: Option<DateTime<Utc>>,

    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Quotation {
    const COLLECTION: &'static str = "quotations";
    const LABEL: &'static str = "Quotation";
    const UNIQUE_KEYS: &'static [&'static str] = &["quotationNumber"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "Quotation",
        immutable: &["quotationNumber"],
        editable: &[
            "title",
            "description",
            "lineItems",
            "vatRate",
            "validUntil",
            "notes",
            "terms",
            "site",
            "equipment",
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.created_by
    }
}

impl Quotation {
    pub fn recalculate(&mut self) -> Result<(), AppError> {
        let totals = calculate_totals(&mut self.line_items, self.vat_rate)?;
        self.subtotal = totals.subtotal;
        self.vat_amount = totals.vat_amount;
        self.total_amount = totals.total_amount;
        Ok(())
    }

    /// A sent quotation past its validity date becomes expired. Returns true if it changed.
    pub fn expire_if_due(&mut self, today: NaiveDate) -> bool {
        if self.status == QuotationStatus::Sent && self.valid_until < today {
            self.status = QuotationStatus::Expired;
            return true;
        }
        false
    }

    pub fn ensure_not_converted(&self) -> Result<(), AppError> {
        if self.status == QuotationStatus::Converted {
            return Err(AppError::conflict("A converted quotation can no longer be changed"));
        }
        Ok(())
    }

    /// Explicit status update. Dates are stamped the first time a state is entered.
    pub fn apply_status(
        &mut self,
        next: QuotationStatus,
        rejection_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !next.is_settable() {
            return Err(AppError::invalid(
                "Status must be one of: draft, sent, approved, rejected, expired",
            ));
        }
        self.ensure_not_converted()?;

        self.status = next;
        match next {
            QuotationStatus::Sent => {
                self.sent_date.get_or_insert(now);
            }
            QuotationStatus::Approved => {
                self.approved_date.get_or_insert(now);
            }
            QuotationStatus::Rejected => {
                self.rejected_date.get_or_insert(now);
                if rejection_reason.is_some() {
                    self.rejection_reason = rejection_reason;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn mark_converted(&mut self, service_call: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != QuotationStatus::Approved {
            return Err(AppError::conflict(format!(
                "Only approved quotations can be converted (status is '{}')",
                self.status.as_str()
            )));
        }
        self.status = QuotationStatus::Converted;
        self.converted_to_service_call = Some(service_call);
        self.converted_date = Some(now);
        Ok(())
    }
}

pub fn default_valid_until(issue_date: NaiveDate) -> NaiveDate {
    issue_date
        .checked_add_days(Days::new(DEFAULT_VALIDITY_DAYS))
        .unwrap_or(issue_date)
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationPayload {
    /// Generated (QT-NNNNNN) when omitted.
    pub quotation_number: Option<String>,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    pub equipment: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    /// Percentage, defaults to 15.
    pub vat_rate: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date)]
    pub issue_date: Option<NaiveDate>,
    /// Defaults to issue date + 30 days.
    #[schema(value_type = Option<String>, format = Date)]
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotationStatusPayload {
    pub status: QuotationStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct QuotationFilters {
    pub status: Option<QuotationStatus>,
    pub customer: Option<Uuid>,
}
