//! Payment tracking.

use serde::{Deserialize, Serialize};

/// Payment state shown on the patient list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// An outstanding balance remains
    Pending,
    /// Fully paid against a non-zero bill
    Paid,
    /// Nothing billed yet
    New,
}

impl PaymentStatus {
    /// Classify from recorded amounts.
    pub fn from_amounts(paid: f64, total: f64, pending: f64) -> Self {
        if pending > 0.0 {
            PaymentStatus::Pending
        } else if paid >= total && total > 0.0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::New
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::New => "new",
        }
    }
}

/// Outstanding balance, never negative.
pub fn pending_amount(paid: f64, total: f64) -> f64 {
    (total - paid).max(0.0)
}

/// Format an amount the way the clinic prints it: whole rupees without decimals.
pub fn format_rupees(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("₹{}", amount as i64)
    } else {
        format!("₹{:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_amount() {
        assert_eq!(pending_amount(500.0, 1000.0), 500.0);
        assert_eq!(pending_amount(1200.0, 1000.0), 0.0);
        assert_eq!(pending_amount(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_status() {
        assert_eq!(PaymentStatus::from_amounts(500.0, 1000.0, 500.0), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_amounts(1000.0, 1000.0, 0.0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(0.0, 0.0, 0.0), PaymentStatus::New);
        // Stale pending field still wins, as on the patient list
        assert_eq!(PaymentStatus::from_amounts(1000.0, 1000.0, 20.0), PaymentStatus::Pending);
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(500.0), "₹500");
        assert_eq!(format_rupees(99.5), "₹99.50");
    }
}
