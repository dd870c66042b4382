//! 下单事务引擎集成测试
//!
//! 计价、库存、原子性和幂等重试。

mod common;

use common::Harness;
use tableside::db::models::{IdempotencyState, OrderItemStatus, SessionMode, SHARED_DEVICE};
use tableside::db::repository::{cart as cart_repo, idempotency, menu_item as menu_repo};
use tableside::orders::{ItemRequest, Placement};
use tableside::AppError;

fn line(menu_item_id: &str, quantity: i64) -> ItemRequest {
    ItemRequest {
        menu_item_id: menu_item_id.into(),
        quantity,
        note: None,
        modifiers: vec![],
    }
}

#[tokio::test]
async fn cart_checkout_prices_from_live_catalog_and_clears_cart() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, Some(10)).await;

    // 加入购物车时的快照价
    let mut conn = h.db.pool.acquire().await.unwrap();
    cart_repo::upsert(
        &mut conn,
        &opened.session_id,
        SHARED_DEVICE,
        "noodles",
        2,
        1200,
        None,
    )
    .await
    .unwrap();

    // 结账前涨价：订单必须按实时菜单价计价
    sqlx::query("UPDATE menu_item SET price_cents = 1500 WHERE id = 'noodles'")
        .execute(&h.db.pool)
        .await
        .unwrap();

    let placement = h
        .orders
        .place_from_cart(&opened.session_id, SHARED_DEVICE, "device:a", None)
        .await
        .expect("checkout");
    let view = match placement {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };
    assert_eq!(view.order.total_cents, 3000);
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].status, OrderItemStatus::New);

    // 库存扣减、购物车清空
    assert_eq!(h.stock_of("noodles").await, Some(8));
    let remaining = cart_repo::find_by_scope(&mut conn, &opened.session_id, SHARED_DEVICE)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn individual_mode_checkout_only_takes_that_devices_cart() {
    let h = Harness::new().await;
    h.seed_table("T1").await;
    let opened = h
        .sessions
        .open("T1", SessionMode::Individual, "staff-1")
        .await
        .expect("open individual session");
    h.seed_item("tea", 300, None).await;
    h.seed_item("pie", 900, None).await;

    let mut conn = h.db.pool.acquire().await.unwrap();
    cart_repo::upsert(&mut conn, &opened.session_id, "dev-a", "tea", 2, 300, None)
        .await
        .unwrap();
    cart_repo::upsert(&mut conn, &opened.session_id, "dev-b", "pie", 1, 900, None)
        .await
        .unwrap();

    let placement = h
        .orders
        .place_from_cart(&opened.session_id, "dev-a", "device:dev-a", None)
        .await
        .expect("checkout dev-a");
    let view = match placement {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].menu_item_id, "tea");
    assert_eq!(view.order.total_cents, 600);

    // 另一台设备的购物车不受影响
    let untouched = cart_repo::find_by_scope(&mut conn, &opened.session_id, "dev-b")
        .await
        .unwrap();
    assert_eq!(untouched.len(), 1);
    assert_eq!(untouched[0].menu_item_id, "pie");
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;

    let err = h
        .orders
        .place_from_cart(&opened.session_id, SHARED_DEVICE, "device:a", None)
        .await
        .expect_err("empty cart");
    assert!(matches!(err, AppError::EmptyCart));
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_order() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("beer", 500, Some(10)).await;
    h.seed_item("cake", 2000, Some(1)).await;

    let err = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 2), line("cake", 3)],
            "staff-1",
            Some("key-rollback"),
        )
        .await
        .expect_err("cake shortfall");
    assert!(matches!(err, AppError::InsufficientStock(_)));

    // 第一行的扣减也必须回滚
    assert_eq!(h.stock_of("beer").await, Some(10));
    assert_eq!(h.stock_of("cake").await, Some(1));

    // 失败释放了幂等键：同键重试可成功
    let placement = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 2), line("cake", 1)],
            "staff-1",
            Some("key-rollback"),
        )
        .await
        .expect("retry with same key");
    assert!(matches!(placement, Placement::Placed(_)));
    assert_eq!(h.stock_of("beer").await, Some(8));
    assert_eq!(h.stock_of("cake").await, Some(0));
}

#[tokio::test]
async fn replay_with_same_key_returns_the_original_order() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, Some(10)).await;

    let first = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("noodles", 2)],
            "staff-1",
            Some("key-replay"),
        )
        .await
        .expect("first placement");
    let first_id = match first {
        Placement::Placed(view) => view.order.id,
        other => panic!("Expected Placed, got {other:?}"),
    };

    // 同键重放：返回同一订单，不再扣库存
    let replay = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("noodles", 2)],
            "staff-1",
            Some("key-replay"),
        )
        .await
        .expect("replay");
    match replay {
        Placement::Placed(view) => assert_eq!(view.order.id, first_id),
        other => panic!("Expected Placed, got {other:?}"),
    }
    assert_eq!(h.stock_of("noodles").await, Some(8));

    let record = idempotency::find(&h.db.pool, &opened.session_id, "key-replay")
        .await
        .unwrap()
        .expect("ledger record");
    assert_eq!(record.state, IdempotencyState::Completed);
    assert_eq!(record.order_id.as_deref(), Some(first_id.as_str()));
}

#[tokio::test]
async fn same_key_from_another_session_is_an_independent_claim() {
    let h = Harness::new().await;
    let session_a = h.open_session("T1").await;
    let session_b = h.open_session("T2").await;
    h.seed_item("noodles", 600, Some(10)).await;
    h.seed_item("tea", 300, Some(10)).await;

    let placed_a = match h
        .orders
        .place_direct(
            &session_a.session_id,
            vec![line("noodles", 2)],
            "staff-1",
            Some("order-1"),
        )
        .await
        .expect("session A placement")
    {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };

    // 另一桌碰巧选了同一个键：必须各下各的单，绝不能拿到 A 桌的订单
    let placed_b = match h
        .orders
        .place_direct(
            &session_b.session_id,
            vec![line("tea", 1)],
            "staff-1",
            Some("order-1"),
        )
        .await
        .expect("session B placement")
    {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };

    assert_ne!(placed_a.order.id, placed_b.order.id);
    assert_eq!(placed_b.order.session_id, session_b.session_id);
    assert_eq!(placed_b.order.total_cents, 300);
    assert_eq!(h.stock_of("noodles").await, Some(8));
    assert_eq!(h.stock_of("tea").await, Some(9));

    // 两桌各自的账本互不可见
    let record_a = idempotency::find(&h.db.pool, &session_a.session_id, "order-1")
        .await
        .unwrap()
        .expect("session A record");
    assert_eq!(record_a.order_id.as_deref(), Some(placed_a.order.id.as_str()));
    let record_b = idempotency::find(&h.db.pool, &session_b.session_id, "order-1")
        .await
        .unwrap()
        .expect("session B record");
    assert_eq!(record_b.order_id.as_deref(), Some(placed_b.order.id.as_str()));
}

#[tokio::test]
async fn resume_reports_ledger_state() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;

    // 未知键：可以直接重试
    let status = h
        .orders
        .resume(&opened.session_id, "key-nowhere")
        .await
        .unwrap();
    assert!(status.ready_to_retry);
    assert!(status.state.is_none());

    h.orders
        .place_direct(
            &opened.session_id,
            vec![line("noodles", 1)],
            "staff-1",
            Some("key-resume"),
        )
        .await
        .expect("place");

    let status = h
        .orders
        .resume(&opened.session_id, "key-resume")
        .await
        .unwrap();
    assert!(!status.ready_to_retry);
    assert_eq!(status.state, Some(IdempotencyState::Completed));
    assert!(status.order_id.is_some());

    // 别的会话查同一个键什么都看不到
    let other = h.open_session("T2").await;
    let status = h
        .orders
        .resume(&other.session_id, "key-resume")
        .await
        .unwrap();
    assert!(status.ready_to_retry);
    assert!(status.order_id.is_none());
}

#[tokio::test]
async fn disabled_item_cannot_be_ordered() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;
    {
        let mut conn = h.db.pool.acquire().await.unwrap();
        menu_repo::disable(&mut conn, "noodles").await.unwrap();
    }

    let err = h
        .orders
        .place_direct(&opened.session_id, vec![line("noodles", 1)], "staff-1", None)
        .await
        .expect_err("disabled item");
    assert!(matches!(err, AppError::ItemUnavailable(_)));
}

#[tokio::test]
async fn auto_hide_disables_item_when_stock_hits_zero() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item_full("cake", 2000, Some(2), true).await;

    h.orders
        .place_direct(&opened.session_id, vec![line("cake", 2)], "staff-1", None)
        .await
        .expect("buy the last two");

    assert_eq!(h.stock_of("cake").await, Some(0));
    let err = h
        .orders
        .place_direct(&opened.session_id, vec![line("cake", 1)], "staff-1", None)
        .await
        .expect_err("item auto-hidden");
    assert!(matches!(err, AppError::ItemUnavailable(_)));
}

#[tokio::test]
async fn item_status_progression_is_monotone() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;

    let view = match h
        .orders
        .place_direct(&opened.session_id, vec![line("noodles", 1)], "staff-1", None)
        .await
        .expect("place")
    {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };
    let order_id = view.order.id.clone();
    let item_id = view.items[0].id.clone();

    let item = h
        .orders
        .advance_item(&order_id, &item_id, OrderItemStatus::InProgress)
        .await
        .expect("advance");
    assert_eq!(item.status, OrderItemStatus::InProgress);

    // 跳级被拒
    let err = h
        .orders
        .advance_item(&order_id, &item_id, OrderItemStatus::Served)
        .await
        .expect_err("skip ready");
    assert!(matches!(err, AppError::Validation(_)));

    // CANCELLED 只能从 NEW 进入
    let err = h
        .orders
        .advance_item(&order_id, &item_id, OrderItemStatus::Cancelled)
        .await
        .expect_err("cancel after start");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn settled_order_items_are_frozen() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;

    let view = match h
        .orders
        .place_direct(&opened.session_id, vec![line("noodles", 1)], "staff-1", None)
        .await
        .expect("place")
    {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };

    h.orders
        .settle(&view.order.id, "staff-1")
        .await
        .expect("settle");

    // 结清后的订单对厨房和取消都是只读的
    let err = h
        .orders
        .advance_item(&view.order.id, &view.items[0].id, OrderItemStatus::InProgress)
        .await
        .expect_err("advance after settle");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = h
        .orders
        .advance_item(&view.order.id, &view.items[0].id, OrderItemStatus::Cancelled)
        .await
        .expect_err("cancel after settle");
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn cancelling_a_new_item_recomputes_the_total() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;
    h.seed_item("tea", 300, None).await;

    let view = match h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("noodles", 1), line("tea", 2)],
            "staff-1",
            None,
        )
        .await
        .expect("place")
    {
        Placement::Placed(view) => view,
        other => panic!("Expected Placed, got {other:?}"),
    };
    assert_eq!(view.order.total_cents, 1800);

    let tea = view
        .items
        .iter()
        .find(|i| i.menu_item_id == "tea")
        .expect("tea line");
    h.orders
        .advance_item(&view.order.id, &tea.id, OrderItemStatus::Cancelled)
        .await
        .expect("cancel tea");

    let mut conn = h.db.pool.acquire().await.unwrap();
    let order = tableside::db::repository::order::find_by_id(&mut conn, &view.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.total_cents, 1200);
}
