use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub credit_balance: f64,
    #[serde(default)]
    pub total_credits_purchased: f64,
    #[serde(default)]
    pub total_credits_used: f64,
    #[serde(default)]
    pub purchase_url: String,
}

/// Body of `POST /spotcast`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSpotCast {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: String,
    pub num_days: u32,
    pub trip_duration_hours: u32,
    pub vessel_info: VesselInfo,
    pub preferences: Preferences,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VesselInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub length_ft: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub language: String,
    pub distance_units: String,
    pub speed_units: String,
}

impl CreateSpotCast {
    /// A one-day sailing trip out of Miami starting tomorrow at midnight UTC.
    pub fn miami_example(now: DateTime<Utc>) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("location_name".into(), "Miami Marina".into());

        Self {
            latitude: 25.7617,
            longitude: -80.1918,
            start_date: tomorrow_midnight(now),
            num_days: 1,
            trip_duration_hours: 8,
            vessel_info: VesselInfo {
                kind: "sailboat".into(),
                length_ft: 35,
            },
            preferences: Preferences {
                language: "en".into(),
                distance_units: "nm".into(),
                speed_units: "kts".into(),
            },
            metadata,
        }
    }
}

fn tomorrow_midnight(now: DateTime<Utc>) -> String {
    let day = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    format!("{}T00:00:00Z", day.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotCastCreated {
    pub id: String,
    pub forecast_id: String,
    #[serde(default)]
    pub credits_charged: f64,
    #[serde(default)]
    pub credits_remaining: f64,
    #[serde(default)]
    pub estimated_completion_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Progress {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub percentage: Option<serde_json::Value>,
}

/// Job state as reported by the status endpoint.
///
/// Only `completed` and `failed` are terminal; any other string means
/// the job is still running and is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Failed,
    Running(String),
}

impl From<&str> for JobState {
    fn from(value: &str) -> Self {
        match value {
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            other => JobState::Running(other.to_string()),
        }
    }
}

/// A single status read, with the raw payload kept for diagnostics.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: String,
    pub progress: Option<Progress>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StatusFields {
    status: String,
    #[serde(default)]
    progress: Option<Progress>,
}

impl StatusReport {
    pub fn from_value(raw: serde_json::Value) -> serde_json::Result<Self> {
        let fields: StatusFields = serde_json::from_value(raw.clone())?;
        Ok(Self {
            status: fields.status,
            progress: fields.progress,
            raw,
        })
    }

    pub fn state(&self) -> JobState {
        JobState::from(self.status.as_str())
    }

    /// `stage (pct%)` when progress is reported, otherwise the raw status.
    pub fn progress_label(&self) -> String {
        let progress = self.progress.as_ref();
        let stage = progress
            .and_then(|p| p.stage.as_deref())
            .unwrap_or(&self.status);

        match progress.and_then(|p| p.percentage.as_ref()) {
            Some(serde_json::Value::String(s)) if s.is_empty() => stage.to_string(),
            Some(serde_json::Value::String(s)) => format!("{stage} ({s}%)"),
            Some(serde_json::Value::Null) | None => stage.to_string(),
            Some(pct) => format!("{stage} ({pct}%)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastPeriod {
    pub start_date: String,
    pub end_date: String,
    pub num_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyClassification {
    pub classification: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub daily_classifications: Vec<DailyClassification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestForecast {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotCast {
    pub id: String,
    pub coordinates: Coordinates,
    pub forecast_period: ForecastPeriod,
    pub trip_duration_hours: f64,
    #[serde(default)]
    pub latest_forecast: Option<LatestForecast>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshStarted {
    pub forecast_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    pub forecast_id: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Forecast {
    pub status: String,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl Forecast {
    /// Classification of the first forecast day, if the analysis is present.
    pub fn first_classification(&self) -> Option<&str> {
        self.ai_analysis
            .as_ref()
            .and_then(|a| a.daily_classifications.first())
            .map(|d| d.classification.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotCastSummary {
    pub id: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub latest_forecast: Option<LatestForecast>,
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}
