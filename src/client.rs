use crate::{
    poller::{
        self,
        CycleOutcome,
        POLL_INTERVAL,
        PollerCommand,
    },
    status::{
        DashboardContext,
        StatusLine,
    },
    summary::TicketSummary,
    summary_client::SummaryClient,
    ui,
};
use chrono::{
    DateTime,
    Local,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    io::Write,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

/// What the board currently shows.
#[derive(Clone, Debug, Default)]
pub struct DashboardView {
    /// `None` until the first successful cycle.
    pub summary: Option<TicketSummary>,
    pub status: StatusLine,
}

/// Folds one cycle result into the board. A failed cycle only touches the
/// status line; the last good tables stay on screen.
pub fn apply_outcome(
    ctx: &mut DashboardContext,
    view: &mut DashboardView,
    outcome: CycleOutcome,
    now: DateTime<Local>,
) {
    match outcome {
        CycleOutcome::Success(payload) => {
            let summary = TicketSummary::from_payload(&payload);
            info!(
                senders = summary.regular.len(),
                hodl_holders = summary.hodl.len(),
                regular_total = summary.regular_total,
                hodl_total = summary.hodl_total,
                "dashboard refreshed"
            );
            view.summary = Some(summary);
            view.status = ctx.record_success(now);
        }
        CycleOutcome::Failure(err) => {
            debug!(?err, "keeping previous tables after failed cycle");
            view.status = ctx.record_failure();
        }
    }
}

/// Fetches once and prints the board as plain text. Returns whether the
/// fetch succeeded.
pub async fn run_once(config: &AppConfig) -> Result<bool> {
    let client = SummaryClient::new(&config.base_url, config.request_timeout)?;
    info!("fetching summary once from {client}");
    let outcome = CycleOutcome::from_result(client.latest_summary().await);
    if let CycleOutcome::Failure(err) = &outcome {
        warn!(?err, "summary fetch failed");
    }
    let succeeded = outcome.is_success();

    let mut ctx = DashboardContext::default();
    let mut view = DashboardView::default();
    apply_outcome(&mut ctx, &mut view, outcome, Local::now());

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", ui::render_plain(&view)).wrap_err("failed to write board")?;
    Ok(succeeded)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let client = SummaryClient::new(&config.base_url, config.request_timeout)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI, polling {client}");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(client, &mut ui_state, &mut input_events).await;
    let exit_res = ui::terminal_exit();
    info!("UI closed");
    loop_result_after_teardown(res, exit_res)
}

/// A loop error wins over a teardown error, which is only logged then.
fn loop_result_after_teardown(res: Result<()>, exit_res: Result<()>) -> Result<()> {
    if let (Err(_), Err(exit_err)) = (&res, &exit_res) {
        warn!(?exit_err, "failed to restore terminal");
    }
    res.and(exit_res)
}

async fn run_loop(
    client: SummaryClient,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let poller_handle = tokio::spawn(poller::poll_worker(
        client,
        POLL_INTERVAL,
        cmd_rx,
        outcome_tx,
    ));

    let mut ctx = DashboardContext::default();
    let mut view = DashboardView::default();
    ui::draw(ui_state, &view).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            maybe_outcome = outcome_rx.recv() => {
                let Some(outcome) = maybe_outcome else {
                    warn!("poller channel closed");
                    break;
                };
                apply_outcome(&mut ctx, &mut view, outcome, Local::now());
                ui::draw(ui_state, &view).wrap_err("draw after refresh failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(PollerCommand::Shutdown);
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => {
                        let _ = cmd_tx.send(PollerCommand::Shutdown);
                        break;
                    }
                    ui::UserEvent::Refresh => {
                        debug!("manual refresh requested");
                        let _ = cmd_tx.send(PollerCommand::FetchNow);
                    }
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, &view).wrap_err("draw after input failed")?;
            }
        }
    }

    poller_handle
        .await
        .map_err(|e| eyre!("summary poller task panicked: {e}"))?
}
