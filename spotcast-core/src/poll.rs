//! Waiting for a SpotCast job to reach a terminal status.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    api::SpotCastApi,
    config::PollConfig,
    error::{Error, Result},
    model::{JobState, StatusReport},
};

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub report: StatusReport,
    pub elapsed: Duration,
}

/// Poll `GET /spotcast/{id}/status` until the job completes or fails.
///
/// `on_progress` sees every non-terminal report. Fails with `JobFailed` on a
/// `failed` status, `PollTimeout` once `config.budget` is spent, and
/// `Cancelled` as soon as `cancel` fires. A zero interval or budget is a
/// `Configuration` error before any request is sent. Status reads have no side effects,
/// so nothing is repeated except the read itself.
pub async fn poll_until_terminal<F>(
    api: &dyn SpotCastApi,
    spotcast_id: &str,
    config: PollConfig,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<PollOutcome>
where
    F: FnMut(&StatusReport),
{
    config.validate()?;
    let start = Instant::now();

    while start.elapsed() < config.budget {
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            report = api.get_status(spotcast_id) => report?,
        };

        debug!(spotcast_id, status = %report.status, "status observed");

        match report.state() {
            JobState::Completed => {
                return Ok(PollOutcome {
                    report,
                    elapsed: start.elapsed().min(config.budget),
                });
            }
            JobState::Failed => return Err(Error::JobFailed { payload: report.raw }),
            JobState::Running(_) => on_progress(&report),
        }

        let remaining = config.budget.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = sleep(config.interval.min(remaining)) => {}
        }
    }

    Err(Error::PollTimeout {
        elapsed: start.elapsed(),
        budget: config.budget,
    })
}
