use rust_decimal::{Decimal, RoundingStrategy};

use super::error::{EngineError, ValidationError};
use super::types::*;

/// Round to two decimal places, half away from zero (commercial rounding).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate an invoice, folding every failure into one error.
pub fn ensure_valid(invoice: &Invoice) -> Result<(), EngineError> {
    let errors = validate_invoice(invoice);
    if errors.is_empty() {
        return Ok(());
    }
    let msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(EngineError::Validation(msg))
}

/// Validate an invoice before it is written.
/// Returns all validation errors found (not just the first).
pub fn validate_invoice(invoice: &Invoice) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if invoice.customer.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "customer",
            "customer reference must not be empty",
            "INV-01",
        ));
    }

    if invoice.vehicle.id.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "vehicle.id",
            "vehicle reference must not be empty",
            "INV-02",
        ));
    }

    if invoice.amount_charged.is_sign_negative() {
        errors.push(ValidationError::with_rule(
            "amount_charged",
            format!("charge {} must not be negative", invoice.amount_charged),
            "INV-03",
        ));
    }

    if invoice.amount_paid.is_sign_negative() {
        errors.push(ValidationError::with_rule(
            "amount_paid",
            format!("paid amount {} must not be negative", invoice.amount_paid),
            "INV-04",
        ));
    }

    if invoice.worker.as_deref().is_some_and(|w| w.trim().is_empty()) {
        errors.push(ValidationError::with_rule(
            "worker",
            "worker must be omitted rather than empty",
            "INV-05",
        ));
    }

    if invoice.invoice_mode == Some(InvoiceMode::PerWash) {
        validate_per_wash(invoice, &mut errors);
    }

    errors.extend(validate_invoice_arithmetic(invoice));

    errors
}

fn validate_per_wash(invoice: &Invoice, errors: &mut Vec<ValidationError>) {
    let (Some(completed), Some(rate)) = (invoice.completed_washes, invoice.per_wash_rate) else {
        errors.push(ValidationError::with_rule(
            "per_wash_rate",
            "per-wash invoices must record completed washes and the rate",
            "PW-01",
        ));
        return;
    };

    let expected = round2(Decimal::from(completed) * rate);
    if invoice.amount_charged != expected {
        errors.push(ValidationError::with_rule(
            "amount_charged",
            format!(
                "charge {} does not match {} washes at {}",
                invoice.amount_charged, completed, rate
            ),
            "PW-02",
        ));
    }
}

/// Validate balance arithmetic.
pub fn validate_invoice_arithmetic(invoice: &Invoice) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // total = charged + old balance
    let expected_total = invoice.amount_charged + invoice.old_balance;
    if invoice.total_amount != expected_total {
        errors.push(ValidationError::with_rule(
            "total_amount",
            format!(
                "total {} does not match charged {} + old balance {}",
                invoice.total_amount, invoice.amount_charged, invoice.old_balance
            ),
            "BAL-01",
        ));
    }

    // balance = total - paid; a closed invoice carries its balance forward
    // and reports zero instead.
    let carried = invoice
        .closures
        .iter()
        .any(|s| s.kind == ClosureKind::Closed);
    let expected_balance = invoice.total_amount - invoice.amount_paid;
    if !carried && invoice.balance != expected_balance {
        errors.push(ValidationError::with_rule(
            "balance",
            format!(
                "balance {} does not match total {} - paid {}",
                invoice.balance, invoice.total_amount, invoice.amount_paid
            ),
            "BAL-02",
        ));
    }

    for (value, field) in [
        (&invoice.amount_charged, "amount_charged"),
        (&invoice.old_balance, "old_balance"),
        (&invoice.total_amount, "total_amount"),
        (&invoice.amount_paid, "amount_paid"),
        (&invoice.balance, "balance"),
    ] {
        check_decimal_places(value, field, "BAL-03", &mut errors);
    }

    errors
}

fn check_decimal_places(
    value: &Decimal,
    field: &str,
    rule: &str,
    errors: &mut Vec<ValidationError>,
) {
    let rounded = value.round_dp(2);
    if *value != rounded {
        errors.push(ValidationError::with_rule(
            field,
            format!("amount {} has more than 2 decimal places", value),
            rule,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(115.384615)), dec!(115.38));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
    }
}
