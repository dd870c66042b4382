//! PIN verification with stateful lockout
//!
//! 这是一个累计计数器而不是滑动窗口：失败计数一直累加，直到
//! 一次成功或锁定期结束才清零。第 N 次连续失败（默认 5）设置
//! `pin_blocked_until = now + 15min`，锁定期间一切尝试（包括正确
//! PIN）都被拒绝。

use chrono::{Duration, Utc};
use sqlx::SqliteConnection;

use crate::core::Config;
use crate::db::models::Session;
use crate::db::repository::{session as session_repo, RepoResult};

/// Outcome of one PIN attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// PIN correct, failure counter reset to zero
    Ok,
    /// PIN wrong, this many attempts remain before lockout
    WrongPin { attempts_left: i64 },
    /// Session locked; minutes until the block elapses
    Blocked { minutes_left: i64 },
}

/// Run one PIN attempt against a session, updating counter, block window
/// and attempt history. The caller decides how to surface the result.
pub async fn verify_pin(
    conn: &mut SqliteConnection,
    config: &Config,
    session: &Session,
    entered_pin: &str,
) -> RepoResult<VerifyResult> {
    let now = Utc::now();

    // Block window takes precedence over everything, correct PIN included
    if let Some(blocked_until) = session.pin_blocked_until {
        if blocked_until > now {
            let minutes_left = minutes_until(blocked_until, now);
            session_repo::record_pin_attempt(conn, &session.id, false).await?;
            return Ok(VerifyResult::Blocked { minutes_left });
        }
        // Block elapsed: counter restarts from zero
        session_repo::set_pin_failures(&mut *conn, &session.id, 0, None).await?;
    }

    let prior_failures = if session
        .pin_blocked_until
        .map(|until| until <= now)
        .unwrap_or(false)
    {
        0
    } else {
        session.pin_failed_count
    };

    if entered_pin == session.pin {
        session_repo::record_pin_attempt(&mut *conn, &session.id, true).await?;
        session_repo::set_pin_failures(conn, &session.id, 0, None).await?;
        return Ok(VerifyResult::Ok);
    }

    let failures = prior_failures + 1;
    session_repo::record_pin_attempt(&mut *conn, &session.id, false).await?;

    if failures >= config.pin_max_failures {
        let blocked_until = now + Duration::minutes(config.pin_block_minutes);
        session_repo::set_pin_failures(conn, &session.id, failures, Some(blocked_until)).await?;
        return Ok(VerifyResult::Blocked {
            minutes_left: config.pin_block_minutes,
        });
    }

    session_repo::set_pin_failures(conn, &session.id, failures, None).await?;
    Ok(VerifyResult::WrongPin {
        attempts_left: config.pin_max_failures - failures,
    })
}

fn minutes_until(until: chrono::DateTime<Utc>, now: chrono::DateTime<Utc>) -> i64 {
    let secs = (until - now).num_seconds().max(0);
    // Round up so "try again in N minutes" never understates the wait
    (secs + 59) / 60
}
