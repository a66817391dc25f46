//! Next-round collector.
//!
//! Connects, waits for the next round to start (`waiting`), collects every
//! tick of that round and disconnects once it completes. Built purely on the
//! public client API.

use std::time::Duration;

use futures_util::StreamExt;

use crate::domain::{CrashTick, DoubleTick, RoundStatus};
use crate::error::{ClientError, ClientResult};
use crate::ws::transport::Transport;
use crate::ws::{
    BlazeClient, ConnectOptions, DispatchedEvent, Event, EventStream, CLOSE, CRASH_TICK, DOUBLE_TICK,
};

/// One tick of a crash or double round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTick {
    Crash(CrashTick),
    Double(DoubleTick),
}

impl RoundTick {
    pub fn id(&self) -> &str {
        match self {
            Self::Crash(tick) => &tick.id,
            Self::Double(tick) => &tick.id,
        }
    }

    pub fn status(&self) -> RoundStatus {
        match self {
            Self::Crash(tick) => tick.round_status(),
            Self::Double(tick) => tick.round_status(),
        }
    }
}

/// Collect the ticks of the next full round.
///
/// Ticks seen before the first `waiting` belong to a round already in
/// progress and are skipped. Fails with [`ClientError::RoundNotStarted`] if
/// the connection closes for good before the round starts, and with
/// [`ClientError::DeadlineElapsed`] if the round does not complete within
/// `deadline`. The client is disconnected in every case.
pub async fn next_round<T: Transport>(
    client: &BlazeClient<T>,
    opts: ConnectOptions,
    deadline: Duration,
) -> ClientResult<Vec<RoundTick>> {
    let mut events = client.events();
    client.connect(opts).await?;

    let result = tokio::time::timeout(deadline, collect_round(&mut events)).await;

    if let Err(e) = client.disconnect().await {
        tracing::debug!("Round finished on a closed session: {}", e);
    }

    result.unwrap_or(Err(ClientError::DeadlineElapsed))
}

async fn collect_round(events: &mut EventStream) -> ClientResult<Vec<RoundTick>> {
    let mut ticks: Vec<RoundTick> = Vec::new();

    while let Some(DispatchedEvent { name, event }) = events.next().await {
        let tick = match (name.as_str(), event.as_ref()) {
            (CRASH_TICK, Event::CrashTick(tick)) => RoundTick::Crash(tick.clone()),
            (DOUBLE_TICK, Event::DoubleTick(tick)) => RoundTick::Double(tick.clone()),
            (CLOSE, Event::Close(close)) if !close.reconnect => {
                if ticks.is_empty() {
                    return Err(ClientError::RoundNotStarted);
                }
                tracing::warn!("Connection closed mid-round after {} ticks", ticks.len());
                return Ok(ticks);
            }
            _ => continue,
        };

        if ticks.is_empty() && tick.status() != RoundStatus::Waiting {
            continue;
        }

        let complete = tick.status().is_terminal();
        ticks.push(tick);
        if complete {
            return Ok(ticks);
        }
    }

    Err(ClientError::ChannelClosed)
}
