use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{forward, Forwarded};
use crate::cloud::EventSink;
use crate::config::PollSettings;
use crate::snmp::QueryExecutor;

/// Выполняет настроенный запрос каждые `interval` до отмены.
///
/// Первый опрос через один интервал после старта. Долгий опрос сдвигает
/// расписание; пропущенные тики отбрасываются, параллельно опросы не идут.
pub async fn start_poll(
    executor: Arc<dyn QueryExecutor>,
    sink: Arc<dyn EventSink>,
    poll: PollSettings,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + poll.interval, poll.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_ms = poll.interval.as_millis() as u64,
        method = %poll.request.method,
        oid = %poll.request.oid,
        "scheduled poll started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = poll_once(executor.as_ref(), sink.as_ref(), &poll) => {}
        }
    }

    info!("scheduled poll stopped");
}

#[instrument(name = "poll", skip_all)]
async fn poll_once(executor: &dyn QueryExecutor, sink: &dyn EventSink, poll: &PollSettings) {
    match forward(executor, sink, &poll.request).await {
        Ok(Forwarded::Sent { entries }) => debug!(entries, "poll forwarded"),
        Ok(Forwarded::Empty) => info!("No results"),
        Err(e) => warn!(error = %e, "poll failed"),
    }
}
