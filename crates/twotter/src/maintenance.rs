//! Periodic maintenance: status broadcast, then expiry sweep.

use std::sync::Arc;

use tokio::time::Instant;
use twotter_protocol::{ClientId, Codec, Message, SERVER_NAME};
use twotter_tick::{TickMetrics, TickScheduler};
use twotter_transport::Transport;

use crate::events::{LeaveReason, ServerEvent};
use crate::server::ServerState;

/// Runs maintenance on every tick until the task is aborted.
pub(crate) async fn maintenance_loop<T: Transport, C: Codec>(
    state: Arc<ServerState<T, C>>,
    mut ticker: TickScheduler,
) {
    loop {
        let info = ticker.wait_for_tick().await;
        tracing::trace!(tick = info.tick, "maintenance tick");
        run_maintenance(&state, ticker.metrics()).await;
        ticker.record_tick_end();
    }
}

/// One maintenance pass.
///
/// The status goes out before the sweep, so a client about to expire still
/// receives the status that counts it.
pub(crate) async fn run_maintenance<T: Transport, C: Codec>(
    state: &ServerState<T, C>,
    metrics: &TickMetrics,
) {
    let (targets, online) = {
        let registry = state.registry.lock().await;
        (registry.all_addresses(), registry.len())
    };
    let uptime_secs = state.started.elapsed().as_secs();

    let status = Message::text(
        ClientId::SERVER,
        ClientId::BROADCAST,
        SERVER_NAME,
        status_text(online, uptime_secs),
    );
    let bytes = state.codec.encode(&status);
    for addr in targets {
        state.send_best_effort(&bytes, addr).await;
    }
    state.events.emit(ServerEvent::Status {
        online,
        uptime_secs,
        passes: metrics.total_ticks,
        late_passes: metrics.total_overruns,
        skipped_passes: metrics.total_skipped,
        slowest_pass_ms: metrics.max_tick_time.as_millis() as u64,
    });

    let expired = state
        .registry
        .lock()
        .await
        .sweep_expired(Instant::now(), state.registry_config.ttl);
    for client_id in expired {
        state.events.emit(ServerEvent::ClientLeft {
            client_id,
            reason: LeaveReason::Expired,
        });
    }
}

pub(crate) fn status_text(online: usize, uptime_secs: u64) -> String {
    format!("{online} clients connected, uptime {uptime_secs}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_format() {
        assert_eq!(status_text(2, 61), "2 clients connected, uptime 61s");
        assert_eq!(status_text(0, 0), "0 clients connected, uptime 0s");
    }
}
