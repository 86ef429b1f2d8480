//! In-memory line items of the invoice being edited.
//!
//! Lines keep insertion order. A product name (compared case-insensitively)
//! appears at most once; adding it again bumps the quantity. Every mutation
//! recomputes the touched line and then the ledger totals, so
//! [`Ledger::totals`] always equals the sum of the current line sums.

use serde::Serialize;

use crate::TAX_RATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineId(u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerLine {
    id: LineId,
    product: String,
    quantity: u32,
    unit_price: f64,
    sum: f64,
}

impl LedgerLine {
    fn new(id: LineId, product: String, quantity: u32, unit_price: f64) -> Self {
        let mut line = Self {
            id,
            product,
            quantity: quantity.max(1),
            unit_price: clamp_price(unit_price),
            sum: 0.0,
        };
        line.recompute();
        line
    }

    fn recompute(&mut self) {
        self.sum = f64::from(self.quantity) * self.unit_price;
    }

    fn matches(&self, product: &str) -> bool {
        self.product.to_lowercase() == product.to_lowercase()
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub net: f64,
    pub tax: f64,
    pub gross: f64,
}

impl Totals {
    pub fn from_net(net: f64) -> Self {
        let tax = net * TAX_RATE;
        Self {
            net,
            tax,
            gross: net + tax,
        }
    }
}

/// A line as it is restored from a saved invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredLine {
    pub product: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    lines: Vec<LedgerLine>,
    totals: Totals,
    next_id: u64,
}

fn clamp_price(price: f64) -> f64 {
    if price.is_finite() {
        price.max(0.0)
    } else {
        0.0
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> LineId {
        let id = LineId(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: LineId) -> Option<usize> {
        self.lines.iter().position(|line| line.id == id)
    }

    /// Adds one unit of `product`. An existing line with the same name
    /// (ignoring case) gets its quantity bumped and keeps its unit price.
    pub fn add_product(&mut self, product: &str, price: f64) -> LineId {
        if let Some(line) = self.lines.iter_mut().find(|line| line.matches(product)) {
            line.quantity = line.quantity.saturating_add(1);
            line.recompute();
            let id = line.id;
            self.recompute_aggregate();
            return id;
        }

        let id = self.allocate_id();
        self.lines
            .push(LedgerLine::new(id, product.to_string(), 1, price));
        self.recompute_aggregate();
        id
    }

    /// Sets the quantity (at least 1) of a line. `None` if the line does not exist.
    pub fn set_quantity(&mut self, id: LineId, quantity: u32) -> Option<&LedgerLine> {
        let idx = self.position(id)?;
        let line = &mut self.lines[idx];
        line.quantity = quantity.max(1);
        line.recompute();
        self.recompute_aggregate();
        self.lines.get(idx)
    }

    /// Overrides the unit price of a line for this invoice only; the catalog is not touched.
    pub fn set_unit_price(&mut self, id: LineId, price: f64) -> Option<&LedgerLine> {
        let idx = self.position(id)?;
        let line = &mut self.lines[idx];
        line.unit_price = clamp_price(price);
        line.recompute();
        self.recompute_aggregate();
        self.lines.get(idx)
    }

    pub fn remove_line(&mut self, id: LineId) -> Option<LedgerLine> {
        let idx = self.position(id)?;
        let removed = self.lines.remove(idx);
        self.recompute_aggregate();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.recompute_aggregate();
    }

    /// Applies a changed catalog price to the line of the same product, if any.
    pub fn sync_catalog_price(&mut self, product: &str, price: f64) -> Option<LineId> {
        let id = self.lines.iter().find(|line| line.matches(product))?.id;
        self.set_unit_price(id, price);
        Some(id)
    }

    /// Replaces every line, e.g. when a saved invoice is reopened.
    pub fn replace_lines<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = RestoredLine>,
    {
        self.lines.clear();
        for restored in lines {
            let id = self.allocate_id();
            self.lines.push(LedgerLine::new(
                id,
                restored.product,
                restored.quantity,
                restored.unit_price,
            ));
        }
        self.recompute_aggregate();
    }

    pub fn recompute_aggregate(&mut self) {
        let net = self.lines.iter().map(|line| line.sum).sum();
        self.totals = Totals::from_net(net);
    }

    pub fn lines(&self) -> &[LedgerLine] {
        &self.lines
    }

    pub fn line(&self, id: LineId) -> Option<&LedgerLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_consistent(ledger: &Ledger) {
        let net: f64 = ledger.lines().iter().map(|line| line.sum()).sum();
        let totals = ledger.totals();
        assert_eq!(totals.net, net);
        assert_eq!(totals.gross, net + net * 0.19);
        for line in ledger.lines() {
            assert_eq!(line.sum(), f64::from(line.quantity()) * line.unit_price());
        }
    }

    #[test]
    fn adding_same_product_twice_merges_case_insensitively() {
        let mut ledger = Ledger::new();
        let first = ledger.add_product("Widget", 9.5);
        let second = ledger.add_product("wIdGeT", 100.0);

        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
        let line = ledger.line(first).expect("line");
        assert_eq!(line.quantity(), 2);
        assert_eq!(line.unit_price(), 9.5);
        assert_close(line.sum(), 19.0);
        assert_consistent(&ledger);
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut ledger = Ledger::new();
        ledger.add_product("Chain", 12.0);
        ledger.add_product("Anchor", 3.0);
        ledger.add_product("Bolt", 0.1);
        ledger.add_product("chain", 12.0);

        let names: Vec<&str> = ledger.lines().iter().map(|line| line.product()).collect();
        assert_eq!(names, vec!["Chain", "Anchor", "Bolt"]);
    }

    #[test]
    fn set_quantity_clamps_to_one_and_recomputes() {
        let mut ledger = Ledger::new();
        let id = ledger.add_product("Widget", 2.5);

        let line = ledger.set_quantity(id, 4).expect("line");
        assert_close(line.sum(), 10.0);
        assert_close(ledger.totals().net, 10.0);

        let line = ledger.set_quantity(id, 0).expect("line");
        assert_eq!(line.quantity(), 1);
        assert_close(ledger.totals().net, 2.5);
        assert_consistent(&ledger);
    }

    #[test]
    fn set_unit_price_clamps_to_zero() {
        let mut ledger = Ledger::new();
        let id = ledger.add_product("Widget", 2.5);
        ledger.set_quantity(id, 3);

        ledger.set_unit_price(id, -4.0);
        assert_eq!(ledger.line(id).expect("line").unit_price(), 0.0);
        assert_eq!(ledger.totals().net, 0.0);

        ledger.set_unit_price(id, f64::NAN);
        assert_eq!(ledger.line(id).expect("line").unit_price(), 0.0);

        ledger.set_unit_price(id, 7.0);
        assert_close(ledger.totals().net, 21.0);
        assert_consistent(&ledger);
    }

    #[test]
    fn unknown_line_is_ignored() {
        let mut ledger = Ledger::new();
        let id = ledger.add_product("Widget", 1.0);
        ledger.remove_line(id).expect("removed");

        assert!(ledger.set_quantity(id, 5).is_none());
        assert!(ledger.set_unit_price(id, 5.0).is_none());
        assert!(ledger.remove_line(id).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn remove_line_recomputes_over_remaining_lines() {
        let mut ledger = Ledger::new();
        let a = ledger.add_product("A", 10.0);
        ledger.add_product("B", 5.0);
        ledger.add_product("C", 2.0);

        ledger.remove_line(a).expect("removed");
        assert_close(ledger.totals().net, 7.0);
        assert_consistent(&ledger);
    }

    #[test]
    fn clear_empties_ledger_and_totals() {
        let mut ledger = Ledger::new();
        ledger.add_product("A", 10.0);
        ledger.add_product("B", 5.0);

        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.totals(), Totals::default());
    }

    #[test]
    fn totals_apply_nineteen_percent_tax() {
        let mut ledger = Ledger::new();
        let id = ledger.add_product("Consulting", 50.0);
        ledger.set_quantity(id, 2);

        let totals = ledger.totals();
        assert_close(totals.net, 100.0);
        assert_close(totals.tax, 19.0);
        assert_close(totals.gross, 119.0);
    }

    #[test]
    fn ids_stay_stable_after_removal() {
        let mut ledger = Ledger::new();
        let a = ledger.add_product("A", 1.0);
        let b = ledger.add_product("B", 2.0);
        ledger.remove_line(a);

        let c = ledger.add_product("C", 3.0);
        assert_ne!(c, a);
        ledger.set_quantity(b, 3);
        assert_close(ledger.line(b).expect("line").sum(), 6.0);
    }

    #[test]
    fn sync_catalog_price_updates_matching_line_only() {
        let mut ledger = Ledger::new();
        let a = ledger.add_product("Widget", 1.0);
        let b = ledger.add_product("Gadget", 2.0);
        ledger.set_quantity(a, 2);

        assert_eq!(ledger.sync_catalog_price("WIDGET", 4.0), Some(a));
        assert_eq!(ledger.line(a).expect("line").unit_price(), 4.0);
        assert_eq!(ledger.line(b).expect("line").unit_price(), 2.0);
        assert_close(ledger.totals().net, 10.0);
        assert!(ledger.sync_catalog_price("missing", 1.0).is_none());
    }

    #[test]
    fn replace_lines_recomputes_sums_and_totals() {
        let mut ledger = Ledger::new();
        ledger.add_product("Old", 99.0);

        ledger.replace_lines(vec![
            RestoredLine {
                product: "Widget".to_string(),
                quantity: 3,
                unit_price: 2.0,
            },
            RestoredLine {
                product: "Gadget".to_string(),
                quantity: 1,
                unit_price: 4.5,
            },
        ]);

        let names: Vec<&str> = ledger.lines().iter().map(|line| line.product()).collect();
        assert_eq!(names, vec!["Widget", "Gadget"]);
        assert_close(ledger.totals().net, 10.5);
        assert_consistent(&ledger);
    }
}
