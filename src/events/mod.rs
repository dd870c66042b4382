//! 事件分发器
//!
//! 订单提交后的扇出通道。保证语义是 **提交后、至少一次、尽力而为**：
//! 投递失败只记日志，绝不回滚已提交的订单；厨房、服务员、顾客是
//! 三个独立的广播域，一侧堵塞不影响其余两侧。
//!
//! 分发器在进程启动时构造一次，由 [`crate::core::ServerState`] 持有并
//! 注入订单引擎——不存在模块级的全局注册表。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::models::{Order, OrderItem, OrderItemStatus};

/// Capacity of each broadcast scope
const CHANNEL_CAPACITY: usize = 1024;

/// One line on a station ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketItem {
    pub item_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i64,
    pub status: OrderItemStatus,
}

/// One logical event per (order, station) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationTicket {
    pub order_id: String,
    pub table_id: String,
    pub station: String,
    pub items: Vec<TicketItem>,
    /// Monotonically increasing per-order sequence
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

/// Waiter-facing notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaiterEvent {
    OrderPlaced {
        order_id: String,
        table_id: String,
        total_cents: i64,
    },
    ItemStatusChanged {
        order_id: String,
        table_id: String,
        item_id: String,
        status: OrderItemStatus,
    },
    SuspiciousFlagged {
        suspicious_id: String,
        table_id: String,
        reason: String,
    },
}

/// Customer-facing notifications, scoped to one session channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerEvent {
    OrderPlaced {
        order_id: String,
        total_cents: i64,
    },
    OrderPendingApproval {
        suspicious_id: String,
    },
    OrderRejected {
        suspicious_id: String,
    },
    ItemStatusChanged {
        order_id: String,
        item_id: String,
        status: OrderItemStatus,
    },
}

/// Post-commit fan-out hub
#[derive(Debug)]
pub struct EventDispatcher {
    kitchen_tx: broadcast::Sender<StationTicket>,
    waiter_tx: broadcast::Sender<WaiterEvent>,
    /// Per-session customer channels, created on first subscribe/publish
    customer_channels: DashMap<String, broadcast::Sender<CustomerEvent>>,
    /// Per-order event sequence counters, keyed by session so
    /// [`Self::forget_session`] can reclaim them
    order_seq: DashMap<(String, String), u64>,
}

impl EventDispatcher {
    pub fn new() -> Arc<Self> {
        let (kitchen_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (waiter_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            kitchen_tx,
            waiter_tx,
            customer_channels: DashMap::new(),
            order_seq: DashMap::new(),
        })
    }

    /// Kitchen displays subscribe here and filter by station name
    pub fn subscribe_kitchen(&self) -> broadcast::Receiver<StationTicket> {
        self.kitchen_tx.subscribe()
    }

    pub fn subscribe_waiter(&self) -> broadcast::Receiver<WaiterEvent> {
        self.waiter_tx.subscribe()
    }

    pub fn subscribe_customer(&self, session_id: &str) -> broadcast::Receiver<CustomerEvent> {
        self.customer_channel(session_id).subscribe()
    }

    fn customer_channel(&self, session_id: &str) -> broadcast::Sender<CustomerEvent> {
        self.customer_channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn next_seq(&self, session_id: &str, order_id: &str) -> u64 {
        let mut entry = self
            .order_seq
            .entry((session_id.to_string(), order_id.to_string()))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    /// Fan a committed order out to its stations, the waiters and the
    /// customer's session channel. Called strictly after commit.
    pub fn dispatch_order(&self, order: &Order, items: &[OrderItem]) {
        let mut by_station: std::collections::BTreeMap<&str, Vec<TicketItem>> =
            std::collections::BTreeMap::new();
        for item in items {
            by_station
                .entry(item.station.as_str())
                .or_default()
                .push(TicketItem {
                    item_id: item.id.clone(),
                    menu_item_id: item.menu_item_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    status: item.status,
                });
        }

        for (station, ticket_items) in by_station {
            let ticket = StationTicket {
                order_id: order.id.clone(),
                table_id: order.table_id.clone(),
                station: station.to_string(),
                items: ticket_items,
                seq: self.next_seq(&order.session_id, &order.id),
                timestamp: Utc::now(),
            };
            if let Err(e) = self.kitchen_tx.send(ticket) {
                // No station listening; the ticket is still in the store
                tracing::warn!(order_id = %order.id, station = %station, error = %e,
                    "Station ticket had no receivers");
            }
        }

        self.publish_waiter(WaiterEvent::OrderPlaced {
            order_id: order.id.clone(),
            table_id: order.table_id.clone(),
            total_cents: order.total_cents,
        });
        self.publish_customer(
            &order.session_id,
            CustomerEvent::OrderPlaced {
                order_id: order.id.clone(),
                total_cents: order.total_cents,
            },
        );
    }

    pub fn dispatch_item_status(&self, order: &Order, item: &OrderItem) {
        self.publish_waiter(WaiterEvent::ItemStatusChanged {
            order_id: order.id.clone(),
            table_id: order.table_id.clone(),
            item_id: item.id.clone(),
            status: item.status,
        });
        self.publish_customer(
            &order.session_id,
            CustomerEvent::ItemStatusChanged {
                order_id: order.id.clone(),
                item_id: item.id.clone(),
                status: item.status,
            },
        );
    }

    pub fn publish_waiter(&self, event: WaiterEvent) {
        if self.waiter_tx.send(event).is_err() {
            tracing::debug!("Waiter event had no receivers");
        }
    }

    pub fn publish_customer(&self, session_id: &str, event: CustomerEvent) {
        if self.customer_channel(session_id).send(event).is_err() {
            tracing::debug!(session_id = %session_id, "Customer event had no receivers");
        }
    }

    /// Drop a closed session's channel and its order counters
    pub fn forget_session(&self, session_id: &str) {
        self.customer_channels.remove(session_id);
        self.order_seq.retain(|(sid, _), _| sid != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::OrderStatus;

    fn sample_order() -> Order {
        Order {
            id: "order-1".into(),
            session_id: "sess-1".into(),
            restaurant_id: "rest-1".into(),
            table_id: "table-1".into(),
            status: OrderStatus::Open,
            total_cents: 1800,
            client_request_id: None,
            placed_by: "customer".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_item(id: &str, station: &str) -> OrderItem {
        OrderItem {
            id: id.into(),
            order_id: "order-1".into(),
            menu_item_id: format!("menu-{id}"),
            name: "Dish".into(),
            station: station.into(),
            quantity: 1,
            price_cents: 900,
            modifiers_cents: 0,
            modifiers: None,
            note: None,
            status: OrderItemStatus::New,
        }
    }

    #[tokio::test]
    async fn one_ticket_per_station_with_increasing_seq() {
        let dispatcher = EventDispatcher::new();
        let mut kitchen = dispatcher.subscribe_kitchen();

        let order = sample_order();
        let items = vec![
            sample_item("a", "GRILL"),
            sample_item("b", "BAR"),
            sample_item("c", "GRILL"),
        ];
        dispatcher.dispatch_order(&order, &items);

        let first = kitchen.recv().await.unwrap();
        let second = kitchen.recv().await.unwrap();
        let stations: Vec<_> = vec![first.station.clone(), second.station.clone()];
        assert!(stations.contains(&"GRILL".to_string()));
        assert!(stations.contains(&"BAR".to_string()));
        assert!(second.seq > first.seq);

        let grill = [&first, &second]
            .into_iter()
            .find(|t| t.station == "GRILL")
            .unwrap();
        assert_eq!(grill.items.len(), 2);
    }

    #[tokio::test]
    async fn customer_channels_are_isolated_per_session() {
        let dispatcher = EventDispatcher::new();
        let mut mine = dispatcher.subscribe_customer("sess-1");
        let mut other = dispatcher.subscribe_customer("sess-2");

        dispatcher.publish_customer(
            "sess-1",
            CustomerEvent::OrderPlaced {
                order_id: "order-1".into(),
                total_cents: 100,
            },
        );

        assert!(mine.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn forget_session_reclaims_channel_and_counters() {
        let dispatcher = EventDispatcher::new();
        let _rx = dispatcher.subscribe_customer("sess-1");

        dispatcher.dispatch_order(&sample_order(), &[sample_item("a", "GRILL")]);
        assert_eq!(dispatcher.order_seq.len(), 1);

        dispatcher.forget_session("sess-1");
        assert!(dispatcher.customer_channels.is_empty());
        assert!(dispatcher.order_seq.is_empty());
    }

    #[test]
    fn delivery_failure_does_not_error() {
        let dispatcher = EventDispatcher::new();
        // No subscribers anywhere: dispatch must still be infallible
        dispatcher.dispatch_order(&sample_order(), &[sample_item("a", "GRILL")]);
    }
}
