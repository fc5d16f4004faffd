use std::{
    pin::Pin,
    time::Duration,
};

use color_eyre::eyre::{
    Report,
    Result,
    eyre,
};
use futures::future::OptionFuture;
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    summary::SummaryPayload,
    summary_client::SummarySource,
};

/// Time between two scheduled refresh cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub enum PollerCommand {
    /// Start a cycle now unless one is already running.
    FetchNow,
    Shutdown,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Success(SummaryPayload),
    Failure(Report),
}

impl CycleOutcome {
    pub fn from_result(result: Result<SummaryPayload>) -> Self {
        match result {
            Ok(payload) => CycleOutcome::Success(payload),
            Err(err) => CycleOutcome::Failure(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success(_))
    }
}

type PendingFetch<'a> = Pin<Box<dyn Future<Output = Result<SummaryPayload>> + Send + 'a>>;

/// Runs refresh cycles until told to stop.
///
/// The first cycle starts immediately, then one per `poll_interval`. At most
/// one fetch is pending at any time: a tick or `FetchNow` that arrives while
/// a fetch is outstanding is dropped, so outcomes are delivered in the order
/// their requests were made. Exits on `Shutdown` or once every command
/// sender is gone, abandoning any pending fetch.
pub async fn poll_worker<S: SummarySource>(
    source: S,
    poll_interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<PollerCommand>,
    outcome_tx: mpsc::UnboundedSender<CycleOutcome>,
) -> Result<()> {
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<PendingFetch<'_>> = None;
    let mut cycle: u64 = 0;

    info!(interval_ms = poll_interval.as_millis() as u64, "summary poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    debug!(cycle, "previous summary fetch still in flight, skipping tick");
                    continue;
                }
                cycle += 1;
                in_flight = Some(Box::pin(source.fetch_summary()));
            }
            Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                let outcome = CycleOutcome::from_result(result);
                if let CycleOutcome::Failure(err) = &outcome {
                    warn!(cycle, ?err, "summary fetch failed");
                }
                outcome_tx
                    .send(outcome)
                    .map_err(|_| eyre!("cycle outcome receiver dropped"))?;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    PollerCommand::FetchNow => {
                        if in_flight.is_some() {
                            debug!(cycle, "manual refresh ignored, fetch already in flight");
                            continue;
                        }
                        cycle += 1;
                        in_flight = Some(Box::pin(source.fetch_summary()));
                    }
                    PollerCommand::Shutdown => break,
                }
            }
        }
    }

    info!(cycles = cycle, "summary poller stopped");
    Ok(())
}
