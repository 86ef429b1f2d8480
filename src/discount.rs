use serde::{Deserialize, Serialize};

use crate::{ledger::Totals, TAX_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscountMode {
    /// Subtract a fixed amount from the net.
    FixedAmount,
    /// Reduce the net so that the gross lands on the given value.
    TargetGross,
}

impl DiscountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountMode::FixedAmount => "fixed-amount",
            DiscountMode::TargetGross => "target-gross",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub mode: DiscountMode,
    pub value: f64,
}

impl Discount {
    pub fn fixed_amount(value: f64) -> Self {
        Self {
            mode: DiscountMode::FixedAmount,
            value,
        }
    }

    pub fn target_gross(value: f64) -> Self {
        Self {
            mode: DiscountMode::TargetGross,
            value,
        }
    }

    pub fn is_effective(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiscountOutcome {
    pub applied: f64,
    pub net: f64,
}

pub fn apply_discount(net: f64, discount: Option<&Discount>) -> DiscountOutcome {
    let Some(discount) = discount.filter(|d| d.is_effective()) else {
        return DiscountOutcome { applied: 0.0, net };
    };

    match discount.mode {
        DiscountMode::FixedAmount => DiscountOutcome {
            applied: discount.value,
            net: (net - discount.value).max(0.0),
        },
        DiscountMode::TargetGross => {
            let target_net = discount.value / (1.0 + TAX_RATE);
            let applied = (net - target_net).max(0.0);
            DiscountOutcome {
                applied,
                net: net - applied,
            }
        }
    }
}

/// Figures printed in the summary block of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvoiceTotals {
    /// Sum of the line items, before any discount.
    pub subtotal: f64,
    pub discount: f64,
    pub net: f64,
    pub tax: f64,
    pub gross: f64,
}

pub fn invoice_totals(subtotal: f64, discount: Option<&Discount>) -> InvoiceTotals {
    let outcome = apply_discount(subtotal, discount);
    let Totals { net, tax, gross } = Totals::from_net(outcome.net);
    InvoiceTotals {
        subtotal,
        discount: outcome.applied,
        net,
        tax,
        gross,
    }
}
