//! 会话生命周期集成测试
//!
//! 开台/入席/换桌/关台，以及 PIN 锁定和空闲清扫。

mod common;

use common::{wrong_pin, Harness};
use tableside::db::models::{SessionMode, TableStatus};
use tableside::orders::{ItemRequest, Placement};
use tableside::AppError;

#[tokio::test]
async fn open_occupies_table_and_blocks_second_session() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    assert_eq!(opened.pin.len(), 4);
    assert_eq!(h.table_status("T1").await, TableStatus::Occupied);

    // 同一张桌第二次开台被拒
    let second = h
        .sessions
        .open("T1", SessionMode::Individual, "staff-2")
        .await;
    assert!(matches!(second, Err(AppError::TableUnavailable(_))));
}

#[tokio::test]
async fn join_with_correct_pin_mints_token() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;

    let joined = h
        .sessions
        .join("T1", &opened.pin, Some("phone-1"), "10.0.0.1")
        .await
        .expect("join");
    assert_eq!(joined.session_id, opened.session_id);
    // 明文令牌只在这里出现一次
    assert_eq!(joined.token.len(), 64);
}

#[tokio::test]
async fn pin_lockout_rejects_even_the_correct_pin() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    let bad = wrong_pin(&opened.pin);

    // 前四次失败返回剩余次数
    for expected_left in [4, 3, 2, 1] {
        let err = h
            .sessions
            .join("T1", &bad, None, "10.0.0.1")
            .await
            .expect_err("wrong pin");
        match err {
            AppError::Forbidden(msg) => {
                assert!(msg.contains(&format!("{expected_left} attempt")), "{msg}");
            }
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    // 第五次触发锁定
    let err = h
        .sessions
        .join("T1", &bad, None, "10.0.0.1")
        .await
        .expect_err("lockout");
    assert!(matches!(err, AppError::PinBlocked { minutes_left } if minutes_left > 0));

    // 锁定期内正确 PIN 也被拒
    let err = h
        .sessions
        .join("T1", &opened.pin, None, "10.0.0.1")
        .await
        .expect_err("still blocked");
    assert!(matches!(err, AppError::PinBlocked { .. }));
}

#[tokio::test]
async fn successful_pin_resets_failure_counter() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    let bad = wrong_pin(&opened.pin);

    for _ in 0..3 {
        let _ = h.sessions.join("T1", &bad, None, "10.0.0.1").await;
    }
    h.sessions
        .join("T1", &opened.pin, None, "10.0.0.1")
        .await
        .expect("correct pin resets counter");

    // 计数归零：又可以错四次而不触发锁定
    for _ in 0..4 {
        let err = h
            .sessions
            .join("T1", &bad, None, "10.0.0.1")
            .await
            .expect_err("wrong pin");
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}

#[tokio::test]
async fn ip_rate_limit_fires_before_the_session_counter() {
    use std::sync::Arc;
    use tableside::auth::IpRateLimiter;
    use tableside::SessionManager;

    let h = Harness::new().await;
    let opened = h.open_session("T1").await;

    // 单独构造一个只允许 2 次/窗口的管理器
    let tight = SessionManager::new(
        h.db.pool.clone(),
        h.config.clone(),
        h.dispatcher.clone(),
        Arc::new(IpRateLimiter::new(2)),
    );

    let bad = wrong_pin(&opened.pin);
    for _ in 0..2 {
        let _ = tight.join("T1", &bad, None, "203.0.113.9").await;
    }
    let err = tight
        .join("T1", &opened.pin, None, "203.0.113.9")
        .await
        .expect_err("rate limited");
    assert!(matches!(err, AppError::RateLimited { retry_after_secs } if retry_after_secs > 0));

    // 其它 IP 不受影响
    tight
        .join("T1", &opened.pin, None, "203.0.113.10")
        .await
        .expect("other ip joins");
}

#[tokio::test]
async fn shift_table_moves_session_and_frees_old_table() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_table("T2").await;

    h.sessions
        .shift_table(&opened.session_id, "T2", "staff-1")
        .await
        .expect("shift");

    assert_eq!(h.table_status("T1").await, TableStatus::Free);
    assert_eq!(h.table_status("T2").await, TableStatus::Occupied);

    // 目标桌被占时换桌失败
    h.seed_table("T3").await;
    let other = h
        .sessions
        .open("T3", SessionMode::Family, "staff-1")
        .await
        .expect("open T3");
    let err = h
        .sessions
        .shift_table(&other.session_id, "T2", "staff-1")
        .await
        .expect_err("occupied target");
    assert!(matches!(err, AppError::TableUnavailable(_)));
}

#[tokio::test]
async fn close_requires_settled_orders() {
    let h = Harness::new().await;
    let opened = h.open_session("T1").await;
    h.seed_item("noodles", 1200, None).await;

    let placement = h
        .orders
        .place_direct(
            &opened.session_id,
            vec![ItemRequest {
                menu_item_id: "noodles".into(),
                quantity: 1,
                note: None,
                modifiers: vec![],
            }],
            "staff-1",
            None,
        )
        .await
        .expect("place");
    let order_id = match placement {
        Placement::Placed(view) => view.order.id,
        other => panic!("Expected Placed, got {other:?}"),
    };

    let err = h
        .sessions
        .close(&opened.session_id, "staff-1")
        .await
        .expect_err("unsettled order blocks close");
    assert!(matches!(err, AppError::Conflict(_)));

    h.orders.settle(&order_id, "staff-1").await.expect("settle");
    h.sessions
        .close(&opened.session_id, "staff-1")
        .await
        .expect("close after settle");
    assert_eq!(h.table_status("T1").await, TableStatus::Free);

    // 关台后幂等键之外的一切客户操作都该失败
    let err = h
        .orders
        .place_direct(&opened.session_id, vec![], "staff-1", None)
        .await
        .expect_err("closed session");
    assert!(matches!(err, AppError::SessionClosed));
}

#[tokio::test]
async fn idle_sweep_closes_stale_sessions_only() {
    let h = Harness::new().await;
    let stale = h.open_session("T1").await;
    let fresh = h.open_session("T2").await;

    // 回拨空闲会话的活动时间
    let past = chrono::Utc::now() - chrono::Duration::minutes(h.config.session_idle_minutes + 5);
    sqlx::query("UPDATE session SET last_activity_at = ? WHERE id = ?")
        .bind(past)
        .bind(&stale.session_id)
        .execute(&h.db.pool)
        .await
        .expect("backdate");

    let closed = h.sessions.sweep_idle().await.expect("sweep");
    assert_eq!(closed, 1);
    assert_eq!(h.table_status("T1").await, TableStatus::Free);
    assert_eq!(h.table_status("T2").await, TableStatus::Occupied);

    // 新会话不受影响
    h.sessions
        .close(&fresh.session_id, "staff-1")
        .await
        .expect("fresh still open");
}
