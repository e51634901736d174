//! The end-to-end SpotCast walk-through: balance, create, poll, fetch,
//! refresh, poll, then the three listing reads.

use std::io::Write;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    api::SpotCastApi,
    config::Config,
    error::{Error, Result, truncate},
    model::{Balance, CreateSpotCast, Page, SpotCastSummary, StatusReport},
    poll::{PollOutcome, poll_until_terminal},
};

/// Create plus refresh, one credit each.
pub const MIN_CREDITS: f64 = 2.0;

/// Identifiers and accounting gathered along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSummary {
    pub spotcast_id: String,
    pub forecast_id: String,
    pub refresh_forecast_id: String,
    pub credits_charged: f64,
}

pub struct Workflow<'a> {
    api: &'a dyn SpotCastApi,
    config: &'a Config,
    cancel: CancellationToken,
}

impl<'a> Workflow<'a> {
    pub fn new(api: &'a dyn SpotCastApi, config: &'a Config, cancel: CancellationToken) -> Self {
        Self {
            api,
            config,
            cancel,
        }
    }

    /// Run every step in order, writing progress to `out`.
    ///
    /// Stops at the first error; nothing billed happens before the balance
    /// check passes.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<WorkflowSummary> {
        writeln!(out, "Using API at {}\n", self.config.base_url)?;

        writeln!(out, "1. Checking account balance...")?;
        let balance = self.api.get_balance().await?;
        write_balance(out, &balance)?;
        ensure_credits(&balance)?;

        writeln!(out, "\n2. Creating SpotCast for Miami...")?;
        let request = CreateSpotCast::miami_example(Utc::now());
        let created = self.api.create_spotcast(&request).await?;
        info!(spotcast_id = %created.id, forecast_id = %created.forecast_id, "spotcast created");
        writeln!(out, "   SpotCast: {}", created.id)?;
        writeln!(out, "   Forecast: {}", created.forecast_id)?;
        writeln!(
            out,
            "   Credits charged: {}, remaining: {}",
            created.credits_charged, created.credits_remaining
        )?;
        if let Some(secs) = created.estimated_completion_seconds {
            writeln!(out, "   Estimated time: ~{secs}s")?;
        }

        writeln!(out, "\n3. Waiting for processing...")?;
        self.wait(out, &created.id).await?;

        writeln!(out, "\n4. Retrieving SpotCast details...")?;
        let spotcast = self.api.get_spotcast(&created.id).await?;
        let period = &spotcast.forecast_period;
        writeln!(
            out,
            "   Location: {}, {}",
            spotcast.coordinates.latitude, spotcast.coordinates.longitude
        )?;
        writeln!(
            out,
            "   Period: {} to {} ({} days)",
            truncate(&period.start_date, 10),
            truncate(&period.end_date, 10),
            period.num_days
        )?;
        writeln!(out, "   Trip duration: {}h", spotcast.trip_duration_hours)?;

        if let Some(ai) = spotcast
            .latest_forecast
            .as_ref()
            .and_then(|f| f.ai_analysis.as_ref())
        {
            writeln!(out, "\n   Summary: {}...", truncate(&ai.summary, 120))?;
            for day in &ai.daily_classifications {
                writeln!(
                    out,
                    "   [{}] {}: {}...",
                    day.classification,
                    day.date,
                    truncate(&day.summary, 100)
                )?;
            }
        }

        writeln!(out, "\n5. Refreshing with latest weather data...")?;
        let refresh = self.api.refresh_spotcast(&created.id).await?;
        info!(spotcast_id = %created.id, forecast_id = %refresh.forecast_id, "refresh started");
        writeln!(out, "   New forecast: {}", refresh.forecast_id)?;

        writeln!(out, "\n6. Waiting for refresh...")?;
        self.wait(out, &created.id).await?;

        writeln!(out, "\n7. Listing forecast history...")?;
        let history = self
            .api
            .list_forecasts(&created.id, self.config.list_limit)
            .await?;
        writeln!(out, "   {} forecasts found:", history.data.len())?;
        for entry in &history.data {
            writeln!(
                out,
                "   - {} ({}, {})",
                entry.forecast_id,
                entry.status,
                truncate(&entry.created_at, 19)
            )?;
        }

        writeln!(out, "\n8. Getting original forecast {}...", created.forecast_id)?;
        let forecast = self
            .api
            .get_forecast(&created.id, &created.forecast_id)
            .await?;
        writeln!(out, "   Status: {}", forecast.status)?;
        writeln!(
            out,
            "   Classification: {}",
            forecast.first_classification().unwrap_or("n/a")
        )?;

        writeln!(out, "\n9. Listing all SpotCasts...")?;
        let all = self.api.list_spotcasts(self.config.list_limit).await?;
        write_spotcast_list(out, &all)?;

        writeln!(out, "\nDone! All 9 endpoints exercised successfully.")?;

        Ok(WorkflowSummary {
            spotcast_id: created.id,
            forecast_id: created.forecast_id,
            refresh_forecast_id: refresh.forecast_id,
            credits_charged: created.credits_charged,
        })
    }

    async fn wait<W: Write>(&self, out: &mut W, spotcast_id: &str) -> Result<PollOutcome> {
        // The progress callback can't return errors; keep the first one.
        let mut write_err = None;
        let result = poll_until_terminal(
            self.api,
            spotcast_id,
            self.config.poll,
            &self.cancel,
            |report: &StatusReport| {
                if write_err.is_none() {
                    write_err = writeln!(out, "  {}", report.progress_label()).err();
                }
            },
        )
        .await;

        if let Some(err) = write_err {
            return Err(err.into());
        }

        match &result {
            Ok(outcome) => writeln!(out, "  Completed in {}s", outcome.elapsed.as_secs())?,
            Err(Error::JobFailed { payload }) => writeln!(out, "  FAILED: {payload}")?,
            Err(Error::PollTimeout { .. }) => writeln!(out, "  Timed out waiting for completion")?,
            Err(_) => {}
        }

        result
    }
}

/// Abort before anything billed happens if the account can't cover it.
pub fn ensure_credits(balance: &Balance) -> Result<()> {
    if balance.credit_balance < MIN_CREDITS {
        return Err(Error::Precondition {
            available: balance.credit_balance,
            required: MIN_CREDITS,
            purchase_url: balance.purchase_url.clone(),
        });
    }
    Ok(())
}

pub fn write_balance<W: Write>(out: &mut W, balance: &Balance) -> Result<()> {
    writeln!(out, "   Credits: {} available", balance.credit_balance)?;
    writeln!(
        out,
        "   Purchased: {}, Used: {}",
        balance.total_credits_purchased, balance.total_credits_used
    )?;
    Ok(())
}

pub fn write_status<W: Write>(out: &mut W, report: &StatusReport) -> Result<()> {
    writeln!(out, "   Status: {}", report.progress_label())?;
    Ok(())
}

pub fn write_spotcast_list<W: Write>(out: &mut W, page: &Page<SpotCastSummary>) -> Result<()> {
    writeln!(
        out,
        "   {} SpotCasts (has_more={}):",
        page.data.len(),
        page.has_more
    )?;
    for item in &page.data {
        let status = item
            .latest_forecast
            .as_ref()
            .and_then(|f| f.status.as_deref())
            .unwrap_or("unknown");
        writeln!(
            out,
            "   - {}: ({}, {}) [{}]",
            item.id, item.coordinates.latitude, item.coordinates.longitude, status
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(credits: f64) -> Balance {
        Balance {
            credit_balance: credits,
            total_credits_purchased: 10.0,
            total_credits_used: 10.0 - credits,
            purchase_url: "https://sealegs.ai/credits".into(),
        }
    }

    #[test]
    fn precondition_requires_two_credits() {
        assert!(ensure_credits(&balance(2.0)).is_ok());
        assert!(ensure_credits(&balance(10.0)).is_ok());

        for credits in [0.0, 1.0, 1.5] {
            let err = ensure_credits(&balance(credits)).unwrap_err();
            assert!(matches!(err, Error::Precondition { .. }));
            assert!(err.to_string().contains("https://sealegs.ai/credits"));
        }
    }

    #[test]
    fn spotcast_list_falls_back_to_unknown_status() {
        let page: Page<SpotCastSummary> = serde_json::from_value(serde_json::json!({
            "data": [
                {"id": "sc_1", "coordinates": {"latitude": 25.7617, "longitude": -80.1918},
                 "latest_forecast": {"status": "completed"}},
                {"id": "sc_2", "coordinates": {"latitude": 1.0, "longitude": 2.0}}
            ],
            "has_more": false
        }))
        .unwrap();

        let mut out = Vec::new();
        write_spotcast_list(&mut out, &page).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("2 SpotCasts (has_more=false)"));
        assert!(text.contains("sc_1: (25.7617, -80.1918) [completed]"));
        assert!(text.contains("sc_2: (1, 2) [unknown]"));
    }
}
