// src/common/identifiers.rs

// Human-readable business identifiers: PREFIX-000001, 1-based, 6 digits.

pub const SERVICE_CALL_PREFIX: &str = "SC";
pub const INVOICE_PREFIX: &str = "INV";
pub const QUOTATION_PREFIX: &str = "QT";
pub const EQUIPMENT_PREFIX: &str = "EQ";
pub const CUSTOMER_PREFIX: &str = "CUST";
pub const EMPLOYEE_PREFIX: &str = "EMP";

const IDENTIFIER_WIDTH: usize = 6;

pub fn format_identifier(prefix: &str, sequence: u64) -> String {
    format!("{}-{:0width$}", prefix, sequence, width = IDENTIFIER_WIDTH)
}

/// Caller-supplied identifier, if it is non-blank.
pub fn supplied(identifier: Option<&str>) -> Option<String> {
    identifier
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_six_digits() {
        assert_eq!(format_identifier(SERVICE_CALL_PREFIX, 1), "SC-000001");
        assert_eq!(format_identifier(INVOICE_PREFIX, 2), "INV-000002");
        assert_eq!(format_identifier(QUOTATION_PREFIX, 100), "QT-000100");
        assert_eq!(format_identifier(EQUIPMENT_PREFIX, 999_999), "EQ-999999");
    }

    #[test]
    fn widens_past_six_digits() {
        assert_eq!(format_identifier(SERVICE_CALL_PREFIX, 1_000_000), "SC-1000000");
    }

    #[test]
    fn blank_identifiers_are_not_supplied() {
        assert_eq!(supplied(None), None);
        assert_eq!(supplied(Some("   ")), None);
        assert_eq!(supplied(Some(" CUST-9 ")), Some("CUST-9".to_string()));
    }
}
