//! 会话生命周期管理
//!
//! 开台、换桌、关台、入席（PIN 验证）以及空闲会话清扫。
//! 桌台状态转换用条件 UPDATE 做守卫，"一桌一开放会话" 由数据库
//! 的部分唯一索引兜底。

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::pin_guard::{self, VerifyResult};
use crate::auth::{tokens, IpRateLimiter};
use crate::core::error::{AppError, AppResult};
use crate::core::Config;
use crate::db::models::{
    CustomerToken, Session, SessionMode, SessionStatus, TableStatus,
};
use crate::db::repository::{audit, dining_table as table_repo, session as session_repo};
use crate::events::EventDispatcher;

/// Returned to the opening staff member. The PIN and the raw staff token
/// appear here exactly once; only hashes are stored.
#[derive(Debug, Clone, Serialize)]
pub struct OpenedSession {
    pub session_id: String,
    pub table_id: String,
    pub mode: SessionMode,
    pub pin: String,
    pub staff_token: String,
}

/// Returned to a customer device after a successful PIN entry
#[derive(Debug, Clone, Serialize)]
pub struct JoinedSession {
    pub session_id: String,
    pub table_id: String,
    pub mode: SessionMode,
    /// Raw bearer token for this device, shown exactly once
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

pub struct SessionManager {
    pool: SqlitePool,
    config: Config,
    dispatcher: Arc<EventDispatcher>,
    pin_limiter: Arc<IpRateLimiter>,
}

impl SessionManager {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        dispatcher: Arc<EventDispatcher>,
        pin_limiter: Arc<IpRateLimiter>,
    ) -> Self {
        Self {
            pool,
            config,
            dispatcher,
            pin_limiter,
        }
    }

    /// 开台：FREE -> OCCUPIED 与会话插入在同一事务内完成
    pub async fn open(
        &self,
        table_id: &str,
        mode: SessionMode,
        staff_id: &str,
    ) -> AppResult<OpenedSession> {
        let mut tx = self.pool.begin().await?;

        let table = table_repo::find_by_id(&mut tx, table_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Table {table_id} not found")))?;
        if !table.is_active {
            return Err(AppError::TableUnavailable(format!(
                "Table {} is deactivated",
                table.name
            )));
        }

        if !table_repo::transition_status(&mut tx, table_id, TableStatus::Free, TableStatus::Occupied)
            .await?
        {
            return Err(AppError::TableUnavailable(format!(
                "Table {} is not free",
                table.name
            )));
        }

        let pin = tokens::generate_pin();
        let (staff_token, staff_token_hash) = tokens::mint_token();
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            table_id: table_id.to_string(),
            restaurant_id: self.config.restaurant_id.clone(),
            status: SessionStatus::Open,
            mode,
            pin: pin.clone(),
            staff_token_hash,
            pin_failed_count: 0,
            pin_blocked_until: None,
            checkout_held_by: None,
            opened_by: staff_id.to_string(),
            last_activity_at: now,
            created_at: now,
            closed_at: None,
        };

        // 部分唯一索引在并发开台时兜底
        session_repo::insert(&mut tx, &session).await.map_err(|e| {
            match AppError::from(e) {
                AppError::Conflict(msg) => AppError::TableUnavailable(msg),
                other => other,
            }
        })?;

        audit::record(&mut tx, staff_id, "session.opened", "session", &session.id, None).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session.id, table_id = %table_id, "Session opened");
        Ok(OpenedSession {
            session_id: session.id,
            table_id: table_id.to_string(),
            mode,
            pin,
            staff_token,
        })
    }

    /// 顾客入席：IP 限流 -> 会话级 PIN 守卫 -> 签发设备令牌
    pub async fn join(
        &self,
        table_id: &str,
        entered_pin: &str,
        device_id: Option<&str>,
        client_ip: &str,
    ) -> AppResult<JoinedSession> {
        // IP window first so a distributed guesser burns its budget
        // before touching any session counter
        self.pin_limiter
            .check(client_ip)
            .map_err(|retry_after_secs| AppError::RateLimited { retry_after_secs })?;

        let mut tx = self.pool.begin().await?;

        let session = session_repo::find_open_by_table(&mut tx, table_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No open session on table {table_id}")))?;

        match pin_guard::verify_pin(&mut tx, &self.config, &session, entered_pin).await? {
            VerifyResult::Blocked { minutes_left } => {
                tx.commit().await?;
                tracing::warn!(target: "security", session_id = %session.id, ip = %client_ip,
                    "PIN attempt while blocked");
                return Err(AppError::PinBlocked { minutes_left });
            }
            VerifyResult::WrongPin { attempts_left } => {
                tx.commit().await?;
                tracing::warn!(target: "security", session_id = %session.id, ip = %client_ip,
                    attempts_left, "Wrong PIN");
                return Err(AppError::Forbidden(format!(
                    "Wrong PIN, {attempts_left} attempt(s) left"
                )));
            }
            VerifyResult::Ok => {}
        }

        let (raw, token_hash) = tokens::mint_token();
        let expires_at = Utc::now() + Duration::hours(self.config.customer_token_hours);
        let token = CustomerToken {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            token_hash,
            device_id: device_id.map(str::to_string),
            expires_at,
            created_at: Utc::now(),
        };
        session_repo::insert_customer_token(&mut tx, &token).await?;
        session_repo::touch_activity(&mut tx, &session.id).await?;
        tx.commit().await?;

        Ok(JoinedSession {
            session_id: session.id,
            table_id: table_id.to_string(),
            mode: session.mode,
            token: raw,
            expires_at,
        })
    }

    /// 换桌：目标桌占用、原桌释放、会话改绑，一个事务
    pub async fn shift_table(
        &self,
        session_id: &str,
        to_table_id: &str,
        staff_id: &str,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let session = session_repo::find_by_id(&mut tx, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        if session.status != SessionStatus::Open {
            return Err(AppError::SessionClosed);
        }
        if session.table_id == to_table_id {
            return Err(AppError::Validation("Session is already on that table".into()));
        }

        let target = table_repo::find_by_id(&mut tx, to_table_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Table {to_table_id} not found")))?;
        if !target.is_active
            || !table_repo::transition_status(
                &mut tx,
                to_table_id,
                TableStatus::Free,
                TableStatus::Occupied,
            )
            .await?
        {
            return Err(AppError::TableUnavailable(format!(
                "Table {} is not free",
                target.name
            )));
        }

        table_repo::set_free(&mut tx, &session.table_id).await?;
        session_repo::set_table(&mut tx, session_id, to_table_id).await?;
        session_repo::record_table_move(&mut tx, session_id, &session.table_id, to_table_id, staff_id)
            .await?;
        session_repo::touch_activity(&mut tx, session_id).await?;
        audit::record(&mut tx, staff_id, "session.table_shifted", "session", session_id,
            Some(&format!("{} -> {}", session.table_id, to_table_id)))
        .await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, from = %session.table_id, to = %to_table_id,
            "Table shifted");
        Ok(())
    }

    /// 关台：所有订单须已结清（PAID/CANCELLED）
    pub async fn close(&self, session_id: &str, staff_id: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let session = session_repo::find_by_id(&mut tx, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        if session.status != SessionStatus::Open {
            return Err(AppError::SessionClosed);
        }

        let unsettled = session_repo::count_unsettled_orders(&mut tx, session_id).await?;
        if unsettled > 0 {
            return Err(AppError::Conflict(format!(
                "{unsettled} unsettled order(s) on this session"
            )));
        }

        if !session_repo::close(&mut tx, session_id).await? {
            return Err(AppError::SessionClosed);
        }
        table_repo::set_free(&mut tx, &session.table_id).await?;
        audit::record(&mut tx, staff_id, "session.closed", "session", session_id, None).await?;
        tx.commit().await?;

        self.dispatcher.forget_session(session_id);
        tracing::info!(session_id = %session_id, table_id = %session.table_id, "Session closed");
        Ok(())
    }

    /// 空闲清扫：关闭超时未活动且无未结订单的会话
    ///
    /// 有未结订单的会话跳过并告警，留给人工处理。
    pub async fn sweep_idle(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::minutes(self.config.session_idle_minutes);
        let idle = session_repo::find_idle_open(&self.pool, cutoff).await?;

        let mut closed = 0u64;
        for session in idle {
            let mut tx = self.pool.begin().await?;
            let unsettled = session_repo::count_unsettled_orders(&mut tx, &session.id).await?;
            if unsettled > 0 {
                tracing::warn!(session_id = %session.id, table_id = %session.table_id, unsettled,
                    "Idle session has unsettled orders, skipping auto-close");
                continue;
            }
            if session_repo::close(&mut tx, &session.id).await? {
                table_repo::set_free(&mut tx, &session.table_id).await?;
                audit::record(&mut tx, "system", "session.idle_closed", "session", &session.id, None)
                    .await?;
                tx.commit().await?;
                self.dispatcher.forget_session(&session.id);
                closed += 1;
                tracing::info!(session_id = %session.id, "Idle session closed");
            }
        }
        Ok(closed)
    }
}
