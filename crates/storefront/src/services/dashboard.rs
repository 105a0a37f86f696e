//! Back-office dashboard aggregates and customer listing.

use rust_decimal::Decimal;
use serde::Serialize;

use aurelia_core::{OrderStatus, UserRole};

use crate::db::{RepositoryError, Store};
use crate::models::{Order, OrderFilter, ProductFilter, User};
use crate::services::inventory::{InventoryItem, LOW_STOCK_THRESHOLD};

/// Number of orders shown in the dashboard's recent list.
const RECENT_ORDERS: usize = 5;

/// Order count for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

/// Dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub order_count: usize,
    /// Sum of totals of orders that are not cancelled.
    pub revenue: Decimal,
    /// One entry per status, in lifecycle order.
    pub orders_by_status: Vec<StatusCount>,
    pub low_stock: Vec<InventoryItem>,
    pub recent_orders: Vec<Order>,
}

/// Aggregate the dashboard from a newest-first order list.
fn summarize(orders: Vec<Order>, low_stock: Vec<InventoryItem>) -> DashboardSummary {
    let revenue = orders
        .iter()
        .filter(|o| o.status.counts_as_revenue())
        .map(|o| o.total)
        .sum();
    let orders_by_status = OrderStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: orders.iter().filter(|o| o.status == status).count(),
        })
        .collect();

    DashboardSummary {
        order_count: orders.len(),
        revenue,
        orders_by_status,
        low_stock,
        recent_orders: orders.into_iter().take(RECENT_ORDERS).collect(),
    }
}

/// Back-office read models.
pub struct DashboardService<'a> {
    store: &'a dyn Store,
}

impl<'a> DashboardService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn summary(&self) -> Result<DashboardSummary, RepositoryError> {
        let orders = self.store.list_orders(&OrderFilter::default()).await?;
        let low_stock = self
            .store
            .list_products(&ProductFilter::default())
            .await?
            .iter()
            .filter(|p| p.stock <= LOW_STOCK_THRESHOLD)
            .map(InventoryItem::from)
            .collect();
        Ok(summarize(orders, low_stock))
    }

    /// Customer accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn customers(&self) -> Result<Vec<User>, RepositoryError> {
        self.store.list_users(Some(UserRole::Customer)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use aurelia_core::{Email, OrderId, PaymentMethod};

    use super::*;
    use crate::models::{CustomerSnapshot, ShippingAddress};

    fn order(id: i32, total: i64, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(id),
            order_number: format!("ORD-{id}"),
            user_id: None,
            customer: CustomerSnapshot {
                name: "Jade".to_owned(),
                email: Email::parse("jade@example.com").unwrap(),
                phone: None,
                address: ShippingAddress {
                    line1: "3 Quartz Ln".to_owned(),
                    line2: None,
                    city: "Oslo".to_owned(),
                    state: None,
                    postal_code: "0150".to_owned(),
                    country: "NO".to_owned(),
                },
            },
            items: Vec::new(),
            subtotal: Decimal::new(total, 0),
            discount: Decimal::ZERO,
            total: Decimal::new(total, 0),
            coupon_code: None,
            payment_method: PaymentMethod::Card,
            payment_reference: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_revenue_excludes_cancelled_orders() {
        let orders = vec![
            order(3, 100, OrderStatus::Delivered),
            order(2, 50, OrderStatus::Cancelled),
            order(1, 25, OrderStatus::Pending),
        ];
        let summary = summarize(orders, Vec::new());
        assert_eq!(summary.order_count, 3);
        assert_eq!(summary.revenue, Decimal::new(125, 0));
    }

    #[test]
    fn test_status_counts_cover_every_status() {
        let orders = vec![
            order(2, 10, OrderStatus::Shipped),
            order(1, 10, OrderStatus::Shipped),
        ];
        let summary = summarize(orders, Vec::new());
        assert_eq!(summary.orders_by_status.len(), OrderStatus::ALL.len());
        let shipped = summary
            .orders_by_status
            .iter()
            .find(|c| c.status == OrderStatus::Shipped)
            .unwrap();
        assert_eq!(shipped.count, 2);
    }

    #[test]
    fn test_recent_orders_capped() {
        let orders = (1..=8)
            .rev()
            .map(|id| order(id, 1, OrderStatus::Pending))
            .collect();
        let summary = summarize(orders, Vec::new());
        assert_eq!(summary.recent_orders.len(), RECENT_ORDERS);
        assert_eq!(summary.recent_orders.first().unwrap().id, OrderId::new(8));
    }
}
