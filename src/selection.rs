//! Selection set for batch actions.
//!
//! Holds order numbers in selection order. The set only ever contains orders
//! that are unfulfilled and visible under the active filter; callers prune it
//! with [`SelectionSet::retain_eligible`] whenever the list or the filter
//! changes.

use tracing::debug;

use crate::filter::OrderFilter;
use crate::model::Order;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<String>,
}

/// Order numbers that may currently be selected.
pub fn selectable_ids(orders: &[Order], filter: &OrderFilter) -> Vec<String> {
    filter
        .apply(orders)
        .filter(|o| o.is_actionable())
        .map(|o| o.order_number.clone())
        .collect()
}

fn is_eligible(orders: &[Order], filter: &OrderFilter, id: &str) -> bool {
    orders
        .iter()
        .any(|o| o.order_number == id && o.is_actionable() && filter.matches(o))
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    /// Flip `id`. Ineligible ids are never added. Returns whether `id` is
    /// selected afterwards.
    pub fn toggle(&mut self, id: &str, orders: &[Order], filter: &OrderFilter) -> bool {
        if let Some(pos) = self.ids.iter().position(|s| s == id) {
            self.ids.remove(pos);
            return false;
        }
        if !is_eligible(orders, filter, id) {
            debug!(order_number = id, "ignoring selection of ineligible order");
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    /// Replace the set with exactly `selectable` (deduplicated, in order).
    pub fn select_all(&mut self, selectable: &[String]) {
        self.ids.clear();
        for id in selectable {
            if !self.contains(id) {
                self.ids.push(id.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that are no longer unfulfilled and visible. Returns the
    /// removed ids.
    pub fn retain_eligible(&mut self, orders: &[Order], filter: &OrderFilter) -> Vec<String> {
        let mut removed = Vec::new();
        self.ids.retain(|id| {
            let keep = is_eligible(orders, filter, id);
            if !keep {
                removed.push(id.clone());
            }
            keep
        });
        if !removed.is_empty() {
            debug!(removed = removed.len(), "selection pruned");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FulfillmentStatus;

    fn order(n: &str, status: FulfillmentStatus, payment: &str) -> Order {
        Order {
            order_number: n.into(),
            customer: format!("Customer {n}"),
            total_price_display: "₹5".into(),
            payment_type: "cod".into(),
            payment_status: payment.into(),
            fulfillment_status: status,
            created_at_display: String::new(),
        }
    }

    fn orders() -> Vec<Order> {
        vec![
            order("1", FulfillmentStatus::Unfulfilled, "paid"),
            order("2", FulfillmentStatus::Unfulfilled, "pending"),
            order("3", FulfillmentStatus::Fulfilled, "paid"),
        ]
    }

    #[test]
    fn test_toggle_only_adds_eligible() {
        let list = orders();
        let filter = OrderFilter::default();
        let mut sel = SelectionSet::new();

        assert!(sel.toggle("1", &list, &filter));
        assert!(!sel.toggle("3", &list, &filter));
        assert!(!sel.toggle("missing", &list, &filter));
        assert_eq!(sel.ids(), &["1".to_string()]);

        assert!(!sel.toggle("1", &list, &filter));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_select_all_replaces_set() {
        let list = orders();
        let filter = OrderFilter::new("", Some("paid".into()));
        let mut sel = SelectionSet::new();
        sel.toggle("2", &list, &OrderFilter::default());

        sel.select_all(&selectable_ids(&list, &filter));
        assert_eq!(sel.ids(), &["1".to_string()]);
        assert!(!sel.contains("2"));

        sel.clear();
        assert!(sel.is_empty());
    }

    #[test]
    fn test_retain_eligible_after_remote_fulfillment() {
        let mut list = orders();
        let filter = OrderFilter::default();
        let mut sel = SelectionSet::new();
        sel.select_all(&selectable_ids(&list, &filter));
        assert_eq!(sel.len(), 2);

        list[0].fulfillment_status = FulfillmentStatus::Fulfilled;
        let removed = sel.retain_eligible(&list, &filter);
        assert_eq!(removed, vec!["1".to_string()]);
        assert_eq!(sel.ids(), &["2".to_string()]);
    }

    #[test]
    fn test_retain_eligible_after_filter_change() {
        let list = orders();
        let mut sel = SelectionSet::new();
        sel.select_all(&selectable_ids(&list, &OrderFilter::default()));

        let paid_only = OrderFilter::new("", Some("paid".into()));
        sel.retain_eligible(&list, &paid_only);
        assert_eq!(sel.ids(), &["1".to_string()]);
    }
}
