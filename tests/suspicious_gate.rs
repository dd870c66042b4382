//! 可疑订单门禁集成测试
//!
//! 触发标记的订单在批准前不得有任何副作用；批准走同一事务核心，
//! 驳回终结幂等键。

mod common;

use common::Harness;
use tableside::db::models::{IdempotencyState, SuspiciousStatus};
use tableside::db::repository::{idempotency, suspicious_order as suspicious_repo};
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
async fn excessive_quantity_parks_the_order_without_side_effects() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("beer", 500, Some(50)).await;

    let placement = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-flagged"),
        )
        .await
        .expect("flagged placement");
    let suspicious_id = match placement {
        Placement::Flagged { suspicious_id, .. } => suspicious_id,
        other => panic!("Expected Flagged, got {other:?}"),
    };

    // 库存未动，厨房不知情
    assert_eq!(h.stock_of("beer").await, Some(50));

    // 记录待审批，幂等键指向它
    let mut conn = h.db.pool.acquire().await.unwrap();
    let record = suspicious_repo::find_by_id(&mut conn, &suspicious_id)
        .await
        .unwrap()
        .expect("suspicious record");
    assert_eq!(record.status, SuspiciousStatus::PendingApproval);

    let key = idempotency::find(&h.db.pool, &opened.session_id, "key-flagged")
        .await
        .unwrap()
        .expect("key record");
    assert_eq!(key.state, IdempotencyState::Suspicious);
    assert_eq!(key.suspicious_id.as_deref(), Some(suspicious_id.as_str()));

    // 同键重放回到同一个待审批落点
    let replay = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-flagged"),
        )
        .await
        .expect("replay");
    assert!(
        matches!(replay, Placement::Flagged { suspicious_id: ref id, .. } if *id == suspicious_id)
    );
}

#[tokio::test]
async fn excessive_total_is_parked_too() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("wagyu", 20_000, None).await;

    let placement = h
        .orders
        .place_direct(&opened.session_id, vec![line("wagyu", 3)], "staff-1", None)
        .await
        .expect("placement");
    assert!(matches!(placement, Placement::Flagged { .. }));
}

#[tokio::test]
async fn approval_replays_through_the_same_transactional_core() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("beer", 500, Some(50)).await;

    let suspicious_id = match h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-approve"),
        )
        .await
        .expect("flagged")
    {
        Placement::Flagged { suspicious_id, .. } => suspicious_id,
        other => panic!("Expected Flagged, got {other:?}"),
    };

    let view = h
        .orders
        .approve_suspicious(&suspicious_id, "manager-1")
        .await
        .expect("approve");
    assert_eq!(view.order.total_cents, 5500);

    // 库存只扣一次
    assert_eq!(h.stock_of("beer").await, Some(39));

    // 幂等键推进到 COMPLETED，顾客端重放拿到真订单
    let replay = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-approve"),
        )
        .await
        .expect("replay after approval");
    match replay {
        Placement::Placed(replayed) => assert_eq!(replayed.order.id, view.order.id),
        other => panic!("Expected Placed, got {other:?}"),
    }
    assert_eq!(h.stock_of("beer").await, Some(39));

    // 二次审批被拒
    let err = h
        .orders
        .approve_suspicious(&suspicious_id, "manager-1")
        .await
        .expect_err("already resolved");
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn approval_fails_when_stock_ran_out_meanwhile() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("beer", 500, Some(12)).await;

    let suspicious_id = match h
        .orders
        .place_direct(&opened.session_id, vec![line("beer", 11)], "staff-1", None)
        .await
        .expect("flagged")
    {
        Placement::Flagged { suspicious_id, .. } => suspicious_id,
        other => panic!("Expected Flagged, got {other:?}"),
    };

    // 审批等待期间库存被别的订单吃掉
    h.orders
        .place_direct(&opened.session_id, vec![line("beer", 5)], "staff-1", None)
        .await
        .expect("competing order");
    assert_eq!(h.stock_of("beer").await, Some(7));

    let err = h
        .orders
        .approve_suspicious(&suspicious_id, "manager-1")
        .await
        .expect_err("stock gone");
    assert!(matches!(err, AppError::InsufficientStock(_)));

    // 批准失败回滚：记录仍然待审批，可再试
    let mut conn = h.db.pool.acquire().await.unwrap();
    let record = suspicious_repo::find_by_id(&mut conn, &suspicious_id)
        .await
        .unwrap()
        .expect("record");
    assert_eq!(record.status, SuspiciousStatus::PendingApproval);
}

#[tokio::test]
async fn rejection_consumes_the_idempotency_key() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("beer", 500, Some(50)).await;

    let suspicious_id = match h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-reject"),
        )
        .await
        .expect("flagged")
    {
        Placement::Flagged { suspicious_id, .. } => suspicious_id,
        other => panic!("Expected Flagged, got {other:?}"),
    };

    h.orders
        .reject_suspicious(&suspicious_id, "manager-1", "Looks like a mistake")
        .await
        .expect("reject");

    assert_eq!(h.stock_of("beer").await, Some(50));

    // 被驳回的键永远不能变成真订单
    let err = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![line("beer", 11)],
            "staff-1",
            Some("key-reject"),
        )
        .await
        .expect_err("consumed key");
    assert!(matches!(err, AppError::Conflict(_)));

    let key = idempotency::find(&h.db.pool, &opened.session_id, "key-reject")
        .await
        .unwrap()
        .expect("key record");
    assert_eq!(key.state, IdempotencyState::Consumed);
}
