use async_trait::async_trait;
use reqwest::{Client, Method, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        Balance, CreateSpotCast, Forecast, ForecastEntry, Page, RefreshStarted, SpotCast,
        SpotCastCreated, SpotCastSummary, StatusReport,
    },
};

use super::{Operation, OperationKind, RetryPolicy, SpotCastApi};

/// reqwest-backed SpotCast client.
///
/// Every request carries the bearer token and JSON content type, and races
/// against `cancel` so an in-flight call stops as soon as it fires.
#[derive(Debug, Clone)]
pub struct SpotCastClient {
    http: Client,
    base_url: Url,
    api_key: String,
    retry: RetryPolicy,
    retry_billed: bool,
    cancel: CancellationToken,
}

struct Call<'a> {
    op: Operation,
    method: Method,
    segments: &'a [&'a str],
    query: &'a [(&'a str, String)],
    body: Option<serde_json::Value>,
}

impl Call<'_> {
    fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl SpotCastClient {
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Configuration(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            retry: config.retry.clone(),
            retry_billed: config.retry_billed,
            cancel,
        })
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Configuration(format!("Base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn attempts_for(&self, op: Operation) -> u32 {
        match op.kind() {
            OperationKind::Billed if !self.retry_billed => 1,
            _ => self.retry.max_attempts.max(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T> {
        let value = self.call_with_retry(&call).await?;
        serde_json::from_value(value).map_err(|source| Error::Decode {
            path: call.path(),
            source,
        })
    }

    async fn call_with_retry(&self, call: &Call<'_>) -> Result<serde_json::Value> {
        let attempts = self.attempts_for(call.op);
        let mut attempt = 1;

        loop {
            match self.send_once(call).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_transient() => {
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        op = %call.op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying transient failure"
                    );

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, call: &Call<'_>) -> Result<serde_json::Value> {
        let path = call.path();
        let url = self.url_for(call.segments)?;
        debug!(op = %call.op, method = %call.method, %path, "sending request");

        let mut req = self
            .http
            .request(call.method.clone(), url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json");

        if !call.query.is_empty() {
            req = req.query(call.query);
        }
        if let Some(body) = &call.body {
            req = req.json(body);
        }

        let transport = |source| Error::Transport {
            path: path.clone(),
            source,
        };

        let exchange = async {
            let res = req.send().await.map_err(transport)?;
            let status = res.status();
            let body = res.text().await.map_err(transport)?;
            Ok::<_, Error>((status, body))
        };

        let (status, body) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            result = exchange => result?,
        };

        debug!(op = %call.op, %status, "received response");

        if !status.is_success() {
            return Err(Error::Http { path, status, body });
        }

        serde_json::from_str(&body).map_err(|source| Error::Decode { path, source })
    }
}

fn to_body<T: Serialize>(value: &T, path: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| Error::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl SpotCastApi for SpotCastClient {
    async fn get_balance(&self) -> Result<Balance> {
        self.call(Call {
            op: Operation::GetBalance,
            method: Method::GET,
            segments: &["account", "balance"],
            query: &[],
            body: None,
        })
        .await
    }

    async fn create_spotcast(&self, request: &CreateSpotCast) -> Result<SpotCastCreated> {
        self.call(Call {
            op: Operation::CreateSpotCast,
            method: Method::POST,
            segments: &["spotcast"],
            query: &[],
            body: Some(to_body(request, "/spotcast")?),
        })
        .await
    }

    async fn get_status(&self, spotcast_id: &str) -> Result<StatusReport> {
        let call = Call {
            op: Operation::GetStatus,
            method: Method::GET,
            segments: &["spotcast", spotcast_id, "status"],
            query: &[],
            body: None,
        };
        let value = self.call_with_retry(&call).await?;

        StatusReport::from_value(value).map_err(|source| Error::Decode {
            path: call.path(),
            source,
        })
    }

    async fn get_spotcast(&self, spotcast_id: &str) -> Result<SpotCast> {
        self.call(Call {
            op: Operation::GetSpotCast,
            method: Method::GET,
            segments: &["spotcast", spotcast_id],
            query: &[],
            body: None,
        })
        .await
    }

    async fn refresh_spotcast(&self, spotcast_id: &str) -> Result<RefreshStarted> {
        self.call(Call {
            op: Operation::RefreshSpotCast,
            method: Method::POST,
            segments: &["spotcast", spotcast_id, "refresh"],
            query: &[],
            body: None,
        })
        .await
    }

    async fn list_forecasts(&self, spotcast_id: &str, limit: u32) -> Result<Page<ForecastEntry>> {
        self.call(Call {
            op: Operation::ListForecasts,
            method: Method::GET,
            segments: &["spotcast", spotcast_id, "forecasts"],
            query: &[("limit", limit.to_string())],
            body: None,
        })
        .await
    }

    async fn get_forecast(&self, spotcast_id: &str, forecast_id: &str) -> Result<Forecast> {
        self.call(Call {
            op: Operation::GetForecast,
            method: Method::GET,
            segments: &["spotcast", spotcast_id, "forecast", forecast_id],
            query: &[],
            body: None,
        })
        .await
    }

    async fn list_spotcasts(&self, limit: u32) -> Result<Page<SpotCastSummary>> {
        self.call(Call {
            op: Operation::ListSpotCasts,
            method: Method::GET,
            segments: &["spotcasts"],
            query: &[("limit", limit.to_string())],
            body: None,
        })
        .await
    }
}
