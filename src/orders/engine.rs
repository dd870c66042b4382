//! Order Transaction Engine
//!
//! 下单只有一条事务核心，三个薄入口共用它：
//! - 购物车结账 ([`OrderEngine::place_from_cart`])
//! - 直接按条目下单 ([`OrderEngine::place_direct`])
//! - 可疑订单审批 ([`OrderEngine::approve_suspicious`])
//!
//! # Placement Flow
//!
//! ```text
//! place(request)
//!     ├─ 1. Claim idempotency key (PENDING, outside the transaction)
//!     ├─ 2. Begin transaction
//!     ├─ 3. Session must be OPEN
//!     ├─ 4. Re-validate catalog entries, price from the live catalog
//!     ├─ 5. Suspicion evaluation (pure) → park + commit + return Flagged
//!     ├─ 6. Conditional stock decrements (auto-hide at zero)
//!     ├─ 7. Insert order + items, clear cart, resolve key, audit row
//!     ├─ 8. Commit (all of 6-7 or nothing)
//!     └─ 9. Post-commit fan-out per station (best-effort)
//! ```
//!
//! Any error between steps 2 and 8 rolls the transaction back and
//! releases the PENDING claim, so a retry with the same key is safe.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};
use crate::core::Config;
use crate::db::models::{
    IdempotencyRecord, IdempotencyState, ItemModifier, Order, OrderItem, OrderItemStatus,
    OrderLine, OrderStatus, SessionMode, SessionStatus, SuspiciousOrder, SuspiciousStatus,
};
use crate::db::repository::menu_item::DecrementOutcome;
use crate::db::repository::{
    audit, cart as cart_repo, idempotency, menu_item as menu_repo, order as order_repo,
    session as session_repo, suspicious_order as suspicious_repo,
};
use crate::events::{CustomerEvent, EventDispatcher, WaiterEvent};
use crate::orders::suspicion::{self, SuspicionConfig};

/// One requested line before validation and pricing
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub menu_item_id: String,
    pub quantity: i64,
    pub note: Option<String>,
    pub modifiers: Vec<ItemModifier>,
}

/// Source of the lines being placed
enum LineSource {
    /// Checkout of the session cart for one device scope
    Cart { device_scope: String },
    /// Direct item list (staff placement, kiosk)
    Direct(Vec<ItemRequest>),
    /// Replay of an approved suspicious order's parked payload
    Approved(Vec<OrderLine>),
}

/// A committed order with its items
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Outcome of a placement request
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Placement {
    Placed(OrderView),
    /// Parked in the suspicious-order gate; nothing touched stock or
    /// the kitchen yet
    Flagged {
        pending: bool,
        suspicious_id: String,
    },
}

/// Ledger state reported to a client recovering from an unknown outcome
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResumeStatus {
    pub resumed: bool,
    pub state: Option<IdempotencyState>,
    pub order_id: Option<String>,
    pub suspicious_id: Option<String>,
    /// No live record: the client may retry with the same key
    pub ready_to_retry: bool,
}

/// The single transactional core shared by all placement entry points
pub struct OrderEngine {
    pool: SqlitePool,
    dispatcher: Arc<EventDispatcher>,
    suspicion: SuspicionConfig,
    idempotency_ttl_hours: i64,
}

impl OrderEngine {
    pub fn new(pool: SqlitePool, dispatcher: Arc<EventDispatcher>, config: &Config) -> Self {
        Self {
            pool,
            dispatcher,
            suspicion: SuspicionConfig {
                qty_threshold: config.suspicious_qty_threshold,
                total_cents_ceiling: config.suspicious_total_cents,
            },
            idempotency_ttl_hours: config.idempotency_ttl_hours,
        }
    }

    // ========== Entry adapters ==========

    /// Check out the session cart (scope = '' for the shared FAMILY cart)
    pub async fn place_from_cart(
        &self,
        session_id: &str,
        device_scope: &str,
        placed_by: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<Placement> {
        self.place(
            session_id,
            LineSource::Cart {
                device_scope: device_scope.to_string(),
            },
            placed_by,
            idempotency_key,
        )
        .await
    }

    /// Place a direct item list, bypassing the cart
    pub async fn place_direct(
        &self,
        session_id: &str,
        items: Vec<ItemRequest>,
        placed_by: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<Placement> {
        self.place(session_id, LineSource::Direct(items), placed_by, idempotency_key)
            .await
    }

    // ========== Core ==========

    async fn place(
        &self,
        session_id: &str,
        source: LineSource,
        placed_by: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<Placement> {
        // Step 1: claim the idempotency key before any side effect.
        // The claim is autocommitted so it survives a rolled-back
        // placement attempt and a process crash alike.
        if let Some(key) = idempotency_key {
            let mut conn = self.pool.acquire().await?;
            match idempotency::claim(&mut conn, session_id, key, self.idempotency_ttl_hours)
                .await?
            {
                idempotency::Claim::Acquired => {}
                idempotency::Claim::Existing(record) => {
                    return self.replay_existing(record).await;
                }
            }
        }

        let outcome = self
            .place_inner(session_id, source, placed_by, idempotency_key)
            .await;

        if outcome.is_err() {
            if let Some(key) = idempotency_key {
                // Failed before commit: free the key so the same-key
                // retry contract holds
                match self.pool.acquire().await {
                    Ok(mut conn) => {
                        if let Err(e) =
                            idempotency::release_pending(&mut conn, session_id, key).await
                        {
                            tracing::error!(key = %key, error = %e,
                                "Failed to release pending idempotency claim");
                        }
                    }
                    // The key stays PENDING until its expiry and blocks
                    // same-key retries, so this must be loud
                    Err(e) => {
                        tracing::error!(key = %key, error = %e,
                            "No connection to release pending idempotency claim");
                    }
                }
            }
        }

        outcome
    }

    /// Safe-retry semantics for a key someone already holds
    async fn replay_existing(&self, record: IdempotencyRecord) -> AppResult<Placement> {
        match record.state {
            IdempotencyState::Pending => Err(AppError::RequestInFlight),
            IdempotencyState::Completed => {
                let order_id = record
                    .order_id
                    .ok_or_else(|| AppError::Internal("Completed key without order id".into()))?;
                let mut conn = self.pool.acquire().await?;
                let order = order_repo::find_by_id(&mut conn, &order_id)
                    .await?
                    .ok_or_else(|| AppError::Internal(format!("Order {order_id} missing")))?;
                let items = order_repo::find_items(&mut conn, &order_id).await?;
                Ok(Placement::Placed(OrderView { order, items }))
            }
            IdempotencyState::Suspicious => {
                let suspicious_id = record.suspicious_id.ok_or_else(|| {
                    AppError::Internal("Suspicious key without suspicious id".into())
                })?;
                Ok(Placement::Flagged {
                    pending: true,
                    suspicious_id,
                })
            }
            IdempotencyState::Consumed => Err(AppError::Conflict(
                "Idempotency key was consumed by a rejected order".into(),
            )),
        }
    }

    async fn place_inner(
        &self,
        session_id: &str,
        source: LineSource,
        placed_by: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<Placement> {
        let mut tx = self.pool.begin().await?;

        // Step 3: session validity
        let session = session_repo::find_by_id(&mut tx, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        if session.status != SessionStatus::Open {
            return Err(AppError::SessionClosed);
        }

        // Advisory checkout marker: avoid two devices of a FAMILY
        // session checking out at once. Stock stays authoritative.
        let mut held_checkout = false;
        if session.mode == SessionMode::Family {
            if let LineSource::Cart { .. } = source {
                if !session_repo::try_hold_checkout(&mut tx, session_id, placed_by).await? {
                    return Err(AppError::Conflict(
                        "Another device is already checking out".into(),
                    ));
                }
                held_checkout = true;
            }
        }

        // Step 4: catalog re-validation and pricing from the live catalog
        let (lines, from_cart_scope, skip_suspicion) = match source {
            LineSource::Cart { device_scope } => {
                let cart = cart_repo::find_by_scope(&mut tx, session_id, &device_scope).await?;
                let requests: Vec<ItemRequest> = cart
                    .iter()
                    .map(|line| ItemRequest {
                        menu_item_id: line.menu_item_id.clone(),
                        quantity: line.quantity,
                        note: line.note.clone(),
                        modifiers: vec![],
                    })
                    .collect();
                let lines = self.validate_and_price(&mut tx, &requests).await?;
                (lines, Some(device_scope), false)
            }
            LineSource::Direct(requests) => {
                let lines = self.validate_and_price(&mut tx, &requests).await?;
                (lines, None, false)
            }
            // Approval re-validates stock but not suspicion: the
            // manager's decision is the override.
            LineSource::Approved(lines) => (lines, None, true),
        };

        if lines.is_empty() {
            return Err(AppError::EmptyCart);
        }
        let total_cents: i64 = lines.iter().map(OrderLine::line_total_cents).sum();

        // Step 5: suspicion gate — a successful, non-committing outcome
        if !skip_suspicion {
            if let Some(reason) = suspicion::evaluate(&lines, total_cents, &self.suspicion) {
                let suspicious = SuspiciousOrder {
                    id: Uuid::new_v4().to_string(),
                    session_id: session.id.clone(),
                    restaurant_id: session.restaurant_id.clone(),
                    table_id: session.table_id.clone(),
                    payload: serde_json::to_string(&lines)
                        .map_err(|e| AppError::Internal(e.to_string()))?,
                    total_cents,
                    reason: reason.clone(),
                    status: SuspiciousStatus::PendingApproval,
                    idempotency_key: idempotency_key.map(str::to_string),
                    resolved_by: None,
                    resolved_reason: None,
                    created_at: Utc::now(),
                    resolved_at: None,
                };
                suspicious_repo::insert(&mut tx, &suspicious).await?;
                if let Some(key) = idempotency_key {
                    idempotency::resolve(
                        &mut tx,
                        session_id,
                        key,
                        IdempotencyState::Suspicious,
                        None,
                        Some(&suspicious.id),
                    )
                    .await?;
                }
                audit::record(
                    &mut tx,
                    placed_by,
                    "order.flagged",
                    "suspicious_order",
                    &suspicious.id,
                    Some(&reason),
                )
                .await?;
                if held_checkout {
                    session_repo::release_checkout(&mut tx, session_id).await?;
                }
                tx.commit().await?;

                self.dispatcher.publish_waiter(WaiterEvent::SuspiciousFlagged {
                    suspicious_id: suspicious.id.clone(),
                    table_id: session.table_id.clone(),
                    reason,
                });
                self.dispatcher.publish_customer(
                    &session.id,
                    CustomerEvent::OrderPendingApproval {
                        suspicious_id: suspicious.id.clone(),
                    },
                );
                return Ok(Placement::Flagged {
                    pending: true,
                    suspicious_id: suspicious.id,
                });
            }
        }

        // Steps 6-7: stock reservation and order creation, all-or-nothing
        let (order, items) = self
            .commit_lines(
                &mut tx,
                &session.id,
                &session.restaurant_id,
                &session.table_id,
                &lines,
                placed_by,
                idempotency_key,
            )
            .await?;

        if let Some(scope) = from_cart_scope {
            cart_repo::clear_scope(&mut tx, session_id, &scope).await?;
        }
        if held_checkout {
            session_repo::release_checkout(&mut tx, session_id).await?;
        }
        session_repo::touch_activity(&mut tx, session_id).await?;

        // Step 8: commit, then step 9: fan-out
        tx.commit().await?;
        self.dispatcher.dispatch_order(&order, &items);

        Ok(Placement::Placed(OrderView { order, items }))
    }

    /// Re-fetch every requested catalog entry and price the lines from
    /// the live catalog (never from the cart's stale snapshot)
    async fn validate_and_price(
        &self,
        conn: &mut SqliteConnection,
        requests: &[ItemRequest],
    ) -> AppResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            if request.quantity < 1 {
                return Err(AppError::Validation(format!(
                    "Quantity must be positive for item {}",
                    request.menu_item_id
                )));
            }
            let item = menu_repo::find_by_id(&mut *conn, &request.menu_item_id)
                .await?
                .ok_or_else(|| {
                    AppError::ItemUnavailable(format!("Item {} not found", request.menu_item_id))
                })?;
            if !item.is_orderable() {
                return Err(AppError::ItemUnavailable(format!(
                    "'{}' is not available",
                    item.name
                )));
            }
            if request.quantity > item.max_per_order {
                return Err(AppError::Validation(format!(
                    "At most {} of '{}' per order",
                    item.max_per_order, item.name
                )));
            }
            let modifiers_cents: i64 = request.modifiers.iter().map(|m| m.price_cents).sum();
            lines.push(OrderLine {
                menu_item_id: item.id,
                name: item.name,
                station: item.station,
                quantity: request.quantity,
                price_cents: item.price_cents,
                modifiers_cents,
                modifiers: request.modifiers.clone(),
                note: request.note.clone(),
                track_stock: item.track_stock,
            });
        }
        Ok(lines)
    }

    /// Steps 6-7: the shared transactional tail. Decrements stock for
    /// every tracked line (aborting the whole transaction on shortfall),
    /// inserts the order and resolves the idempotency key.
    #[allow(clippy::too_many_arguments)]
    async fn commit_lines(
        &self,
        tx: &mut SqliteConnection,
        session_id: &str,
        restaurant_id: &str,
        table_id: &str,
        lines: &[OrderLine],
        placed_by: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<(Order, Vec<OrderItem>)> {
        for line in lines {
            if !line.track_stock {
                continue;
            }
            match menu_repo::decrement_if_available(&mut *tx, &line.menu_item_id, line.quantity)
                .await?
            {
                DecrementOutcome::Insufficient => {
                    return Err(AppError::InsufficientStock(format!(
                        "Not enough '{}' in stock",
                        line.name
                    )));
                }
                DecrementOutcome::Remaining(0) => {
                    let item = menu_repo::find_by_id(&mut *tx, &line.menu_item_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::ItemUnavailable(format!(
                                "Item {} vanished mid-transaction",
                                line.menu_item_id
                            ))
                        })?;
                    if item.auto_hide_when_zero {
                        menu_repo::disable(&mut *tx, &line.menu_item_id).await?;
                    }
                }
                DecrementOutcome::Remaining(_) | DecrementOutcome::Unlimited => {}
            }
        }

        let now = Utc::now();
        let total_cents: i64 = lines.iter().map(OrderLine::line_total_cents).sum();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            table_id: table_id.to_string(),
            status: OrderStatus::Open,
            total_cents,
            client_request_id: idempotency_key.map(str::to_string),
            placed_by: placed_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        order_repo::insert(&mut *tx, &order).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                menu_item_id: line.menu_item_id.clone(),
                name: line.name.clone(),
                station: line.station.clone(),
                quantity: line.quantity,
                price_cents: line.price_cents,
                modifiers_cents: line.modifiers_cents,
                modifiers: if line.modifiers.is_empty() {
                    None
                } else {
                    Some(
                        serde_json::to_string(&line.modifiers)
                            .map_err(|e| AppError::Internal(e.to_string()))?,
                    )
                },
                note: line.note.clone(),
                status: OrderItemStatus::New,
            };
            order_repo::insert_item(&mut *tx, &item).await?;
            items.push(item);
        }

        if let Some(key) = idempotency_key {
            idempotency::resolve(
                &mut *tx,
                session_id,
                key,
                IdempotencyState::Completed,
                Some(&order.id),
                None,
            )
            .await?;
        }

        audit::record(
            &mut *tx,
            placed_by,
            "order.placed",
            "order",
            &order.id,
            Some(&format!("total_cents={total_cents}")),
        )
        .await?;

        Ok((order, items))
    }

    // ========== Suspicious-order gate ==========

    /// Approve a parked order: re-validate stock now, run the same
    /// transactional commit, and only then dispatch to stations.
    pub async fn approve_suspicious(&self, id: &str, manager_id: &str) -> AppResult<OrderView> {
        let mut tx = self.pool.begin().await?;

        let suspicious = suspicious_repo::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Suspicious order {id} not found")))?;
        if suspicious.status != SuspiciousStatus::PendingApproval {
            return Err(AppError::Conflict(format!(
                "Suspicious order {id} is already resolved"
            )));
        }

        let session = session_repo::find_by_id(&mut tx, &suspicious.session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session for suspicious order not found".into()))?;
        if session.status != SessionStatus::Open {
            return Err(AppError::SessionClosed);
        }

        let lines = suspicious
            .lines()
            .map_err(|e| AppError::Internal(format!("Corrupt suspicious payload: {e}")))?;

        suspicious_repo::resolve(&mut tx, id, SuspiciousStatus::Approved, manager_id, None).await?;

        let (order, items) = self
            .commit_lines(
                &mut tx,
                &suspicious.session_id,
                &suspicious.restaurant_id,
                &suspicious.table_id,
                &lines,
                manager_id,
                suspicious.idempotency_key.as_deref(),
            )
            .await?;

        audit::record(
            &mut tx,
            manager_id,
            "suspicious.approved",
            "suspicious_order",
            id,
            Some(&order.id),
        )
        .await?;

        tx.commit().await?;
        self.dispatcher.dispatch_order(&order, &items);

        Ok(OrderView { order, items })
    }

    /// Reject a parked order: terminal, and the idempotency key is
    /// consumed so the same client key can never silently become a
    /// different real order.
    pub async fn reject_suspicious(
        &self,
        id: &str,
        manager_id: &str,
        reason: &str,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let suspicious = suspicious_repo::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Suspicious order {id} not found")))?;
        if suspicious.status != SuspiciousStatus::PendingApproval {
            return Err(AppError::Conflict(format!(
                "Suspicious order {id} is already resolved"
            )));
        }

        suspicious_repo::resolve(&mut tx, id, SuspiciousStatus::Rejected, manager_id, Some(reason))
            .await?;
        if let Some(key) = &suspicious.idempotency_key {
            idempotency::resolve(
                &mut tx,
                &suspicious.session_id,
                key,
                IdempotencyState::Consumed,
                None,
                None,
            )
            .await?;
        }
        audit::record(
            &mut tx,
            manager_id,
            "suspicious.rejected",
            "suspicious_order",
            id,
            Some(reason),
        )
        .await?;

        tx.commit().await?;

        self.dispatcher.publish_customer(
            &suspicious.session_id,
            CustomerEvent::OrderRejected {
                suspicious_id: id.to_string(),
            },
        );
        Ok(())
    }

    // ========== Post-commit order progression ==========

    /// Advance one item's kitchen status and notify waiter/customer
    pub async fn advance_item(
        &self,
        order_id: &str,
        item_id: &str,
        next: OrderItemStatus,
    ) -> AppResult<OrderItem> {
        let mut tx = self.pool.begin().await?;
        let order = order_repo::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
        // Settled and cancelled orders are immutable for the kitchen
        match order.status {
            OrderStatus::Open | OrderStatus::Approved => {}
            status => {
                return Err(AppError::Conflict(format!(
                    "Order {order_id} items cannot change in {status:?}"
                )));
            }
        }
        let item = order_repo::advance_item_status(&mut tx, order_id, item_id, next).await?;
        tx.commit().await?;

        self.dispatcher.dispatch_item_status(&order, &item);
        Ok(item)
    }

    /// Settle an order (mark PAID); required before its session can close
    pub async fn settle(&self, order_id: &str, actor: &str) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let order = order_repo::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
        match order.status {
            OrderStatus::Open | OrderStatus::Approved => {}
            status => {
                return Err(AppError::Conflict(format!(
                    "Order {order_id} cannot be settled from {status:?}"
                )));
            }
        }
        order_repo::set_status(&mut tx, order_id, OrderStatus::Paid).await?;
        audit::record(&mut tx, actor, "order.settled", "order", order_id, None).await?;
        tx.commit().await?;

        let mut conn = self.pool.acquire().await?;
        let order = order_repo::find_by_id(&mut conn, order_id)
            .await?
            .ok_or_else(|| AppError::Internal("Order vanished after settle".into()))?;
        Ok(order)
    }

    /// Ledger lookup for clients recovering from an unknown outcome.
    /// Scoped to the caller's session: keys are not probeable across
    /// tables.
    pub async fn resume(&self, session_id: &str, key: &str) -> AppResult<ResumeStatus> {
        let record = idempotency::find(&self.pool, session_id, key).await?;
        Ok(match record {
            None => ResumeStatus {
                resumed: false,
                state: None,
                order_id: None,
                suspicious_id: None,
                ready_to_retry: true,
            },
            Some(record) => ResumeStatus {
                resumed: true,
                state: Some(record.state),
                order_id: record.order_id,
                suspicious_id: record.suspicious_id,
                ready_to_retry: false,
            },
        })
    }
}
