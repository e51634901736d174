use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    model::{
        Balance, CreateSpotCast, Forecast, ForecastEntry, Page, RefreshStarted, SpotCast,
        SpotCastCreated, SpotCastSummary, StatusReport,
    },
};

pub mod http;
pub mod retry;

pub use http::SpotCastClient;
pub use retry::RetryPolicy;

/// Whether an operation is safe to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ReadOnly,
    /// Consumes credits on every call.
    Billed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetBalance,
    CreateSpotCast,
    GetStatus,
    GetSpotCast,
    RefreshSpotCast,
    ListForecasts,
    GetForecast,
    ListSpotCasts,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetBalance => "get_balance",
            Operation::CreateSpotCast => "create_spotcast",
            Operation::GetStatus => "get_status",
            Operation::GetSpotCast => "get_spotcast",
            Operation::RefreshSpotCast => "refresh_spotcast",
            Operation::ListForecasts => "list_forecasts",
            Operation::GetForecast => "get_forecast",
            Operation::ListSpotCasts => "list_spotcasts",
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateSpotCast | Operation::RefreshSpotCast => OperationKind::Billed,
            _ => OperationKind::ReadOnly,
        }
    }

    pub const fn all() -> &'static [Operation] {
        &[
            Operation::GetBalance,
            Operation::CreateSpotCast,
            Operation::GetStatus,
            Operation::GetSpotCast,
            Operation::RefreshSpotCast,
            Operation::ListForecasts,
            Operation::GetForecast,
            Operation::ListSpotCasts,
        ]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The SpotCast REST surface.
#[async_trait]
pub trait SpotCastApi: Send + Sync + Debug {
    async fn get_balance(&self) -> Result<Balance>;

    /// Billed.
    async fn create_spotcast(&self, request: &CreateSpotCast) -> Result<SpotCastCreated>;

    async fn get_status(&self, spotcast_id: &str) -> Result<StatusReport>;

    async fn get_spotcast(&self, spotcast_id: &str) -> Result<SpotCast>;

    /// Billed.
    async fn refresh_spotcast(&self, spotcast_id: &str) -> Result<RefreshStarted>;

    async fn list_forecasts(&self, spotcast_id: &str, limit: u32) -> Result<Page<ForecastEntry>>;

    async fn get_forecast(&self, spotcast_id: &str, forecast_id: &str) -> Result<Forecast>;

    async fn list_spotcasts(&self, limit: u32) -> Result<Page<SpotCastSummary>>;
}
