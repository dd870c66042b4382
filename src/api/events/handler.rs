//! Event Stream Handlers
//!
//! 广播通道到 SSE 的桥接。落后的订阅者丢弃积压消息继续（broadcast
//! lagged），通道关闭则结束流。

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::{AuthContext, SessionContext};
use crate::core::ServerState;

/// 把一个广播接收端变成 SSE 事件流
fn broadcast_stream<T>(
    rx: broadcast::Receiver<T>,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Clone + Serialize + Send + 'static,
{
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    let event = match serde_json::to_string(&payload) {
                        Ok(json) => Event::default().data(json),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize event");
                            continue;
                        }
                    };
                    return Some((Ok(event), rx));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, dropping backlog");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// GET /api/events/kitchen - 出票流 (员工端)
pub async fn kitchen_stream(
    _auth: AuthContext,
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(broadcast_stream(state.dispatcher.subscribe_kitchen()))
        .keep_alive(KeepAlive::default())
}

/// GET /api/events/waiter - 服务员通知流 (员工端)
pub async fn waiter_stream(
    _auth: AuthContext,
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(broadcast_stream(state.dispatcher.subscribe_waiter()))
        .keep_alive(KeepAlive::default())
}

/// GET /api/events/customer - 顾客会话事件流
pub async fn customer_stream(
    ctx: SessionContext,
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(broadcast_stream(
        state.dispatcher.subscribe_customer(&ctx.session.id),
    ))
    .keep_alive(KeepAlive::default())
}
