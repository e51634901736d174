use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use spotcast_core::{Config, Error, PollConfig, SpotCastClient, Workflow};
use tokio_util::sync::CancellationToken;

fn config(server: &ServerGuard) -> Config {
    let mut cfg = Config::new(&format!("{}/v3/", server.url()), "sk_test").unwrap();
    cfg.poll = PollConfig {
        interval: Duration::from_millis(20),
        budget: Duration::from_millis(400),
    };
    cfg
}

async fn mock_json(
    server: &mut ServerGuard,
    method: &str,
    path: &str,
    body: serde_json::Value,
    hits: usize,
) -> Mock {
    server
        .mock(method, path)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer sk_test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(hits)
        .create_async()
        .await
}

async fn balance(server: &mut ServerGuard, credits: u32) -> Mock {
    mock_json(
        server,
        "GET",
        "/v3/account/balance",
        json!({
            "credit_balance": credits,
            "total_credits_purchased": 20,
            "total_credits_used": 20 - credits,
            "purchase_url": "https://sealegs.ai/pricing"
        }),
        1,
    )
    .await
}

async fn create(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("POST", "/v3/spotcast")
        .match_body(Matcher::PartialJson(json!({
            "latitude": 25.7617,
            "longitude": -80.1918,
            "num_days": 1,
            "vessel_info": {"type": "sailboat", "length_ft": 35}
        })))
        .with_status(200)
        .with_body(
            json!({
                "id": "sc_1",
                "forecast_id": "fc_1",
                "credits_charged": 1,
                "credits_remaining": 9,
                "estimated_completion_seconds": 45
            })
            .to_string(),
        )
        .expect(hits)
        .create_async()
        .await
}

async fn run(server: &ServerGuard) -> (spotcast_core::Result<spotcast_core::WorkflowSummary>, String) {
    let cfg = config(server);
    let cancel = CancellationToken::new();
    let client = SpotCastClient::new(&cfg, cancel.clone()).unwrap();

    let mut out = Vec::new();
    let result = Workflow::new(&client, &cfg, cancel).run(&mut out).await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn full_workflow_succeeds() {
    let mut server = Server::new_async().await;

    let balance = balance(&mut server, 10).await;
    let create = create(&mut server, 1).await;

    // mockito serves the first matching mock that still has expected hits
    // left, so polling sees processing, completed, then completed again.
    let processing = server
        .mock("GET", "/v3/spotcast/sc_1/status")
        .with_status(200)
        .with_body(r#"{"status": "processing", "progress": {"stage": "fetching_weather", "percentage": 30}}"#)
        .expect(1)
        .create_async()
        .await;
    let completed = server
        .mock("GET", "/v3/spotcast/sc_1/status")
        .with_status(200)
        .with_body(r#"{"status": "completed"}"#)
        .expect(2)
        .create_async()
        .await;
    let spotcast = mock_json(
        &mut server,
        "GET",
        "/v3/spotcast/sc_1",
        json!({
            "id": "sc_1",
            "coordinates": {"latitude": 25.7617, "longitude": -80.1918},
            "forecast_period": {
                "start_date": "2026-10-20T00:00:00Z",
                "end_date": "2026-10-20T23:59:59Z",
                "num_days": 1
            },
            "trip_duration_hours": 8,
            "latest_forecast": {
                "status": "completed",
                "ai_analysis": {
                    "summary": "Light easterly breeze with a small afternoon chop.",
                    "daily_classifications": [
                        {"classification": "GO", "date": "2026-10-20", "summary": "Good sailing."}
                    ]
                }
            }
        }),
        1,
    )
    .await;
    let refresh = mock_json(
        &mut server,
        "POST",
        "/v3/spotcast/sc_1/refresh",
        json!({"forecast_id": "fc_2", "credits_charged": 1}),
        1,
    )
    .await;
    let history = mock_json(
        &mut server,
        "GET",
        "/v3/spotcast/sc_1/forecasts",
        json!({"data": [
            {"forecast_id": "fc_2", "status": "completed", "created_at": "2026-10-19T12:05:00.123Z"},
            {"forecast_id": "fc_1", "status": "completed", "created_at": "2026-10-19T12:00:00.456Z"}
        ], "has_more": false}),
        1,
    )
    .await;
    let forecast = mock_json(
        &mut server,
        "GET",
        "/v3/spotcast/sc_1/forecast/fc_1",
        json!({"status": "completed", "ai_analysis": {"summary": "", "daily_classifications": [
            {"classification": "GO", "date": "2026-10-20", "summary": "Good sailing."}
        ]}}),
        1,
    )
    .await;
    let list = mock_json(
        &mut server,
        "GET",
        "/v3/spotcasts",
        json!({"data": [
            {"id": "sc_1", "coordinates": {"latitude": 25.7617, "longitude": -80.1918},
             "latest_forecast": {"status": "completed"}}
        ], "has_more": true}),
        1,
    )
    .await;

    let cfg = config(&server);
    let cancel = CancellationToken::new();
    let client = SpotCastClient::new(&cfg, cancel.clone()).unwrap();
    let mut out = Vec::new();

    let summary = Workflow::new(&client, &cfg, cancel)
        .run(&mut out)
        .await
        .unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.spotcast_id, "sc_1");
    assert_eq!(summary.forecast_id, "fc_1");
    assert_eq!(summary.refresh_forecast_id, "fc_2");

    assert!(text.contains("Credits: 10 available"));
    assert!(text.contains("Credits charged: 1, remaining: 9"));
    assert!(text.contains("fetching_weather (30%)"));
    assert!(text.contains("Period: 2026-10-20 to 2026-10-20 (1 days)"));
    assert!(text.contains("[GO] 2026-10-20: Good sailing...."));
    assert!(text.contains("New forecast: fc_2"));
    assert!(text.contains("- fc_1 (completed, 2026-10-19T12:00:00)"));
    assert!(text.contains("Classification: GO"));
    assert!(text.contains("1 SpotCasts (has_more=true)"));
    assert!(text.ends_with("Done! All 9 endpoints exercised successfully.\n"));

    for mock in [
        balance, create, processing, completed, spotcast, refresh, history, forecast, list,
    ] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn insufficient_balance_never_creates() {
    let mut server = Server::new_async().await;
    let balance = balance(&mut server, 1).await;
    let create = create(&mut server, 0).await;

    let (result, text) = run(&server).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Precondition { .. }));
    assert!(err.to_string().contains("https://sealegs.ai/pricing"));
    assert!(text.contains("Credits: 1 available"));
    assert!(!text.contains("2. Creating"));

    balance.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn failed_job_stops_the_workflow() {
    let mut server = Server::new_async().await;
    let _balance = balance(&mut server, 10).await;
    let _create = create(&mut server, 1).await;
    let status = mock_json(
        &mut server,
        "GET",
        "/v3/spotcast/sc_1/status",
        json!({"status": "failed", "error": {"code": "weather_unavailable"}}),
        1,
    )
    .await;
    let refresh = mock_json(&mut server, "POST", "/v3/spotcast/sc_1/refresh", json!({}), 0).await;
    let list = mock_json(&mut server, "GET", "/v3/spotcasts", json!({}), 0).await;

    let (result, text) = run(&server).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::JobFailed { .. }));
    assert!(text.contains("FAILED:"));
    assert!(text.contains("weather_unavailable"));
    assert!(!text.contains("Timed out"));
    assert!(!text.contains("4. Retrieving"));

    status.assert_async().await;
    refresh.assert_async().await;
    list.assert_async().await;
}

#[tokio::test]
async fn endless_processing_times_out() {
    let mut server = Server::new_async().await;
    let _balance = balance(&mut server, 10).await;
    let _create = create(&mut server, 1).await;
    let _status = server
        .mock("GET", "/v3/spotcast/sc_1/status")
        .with_status(200)
        .with_body(r#"{"status": "processing"}"#)
        .expect_at_least(2)
        .create_async()
        .await;
    let refresh = mock_json(&mut server, "POST", "/v3/spotcast/sc_1/refresh", json!({}), 0).await;

    let (result, text) = run(&server).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::PollTimeout { .. }));
    assert!(text.contains("Timed out waiting for completion"));
    assert!(!text.contains("FAILED"));
    assert_ne!(err.exit_code(), Error::JobFailed { payload: json!({}) }.exit_code());

    refresh.assert_async().await;
}

#[tokio::test]
async fn http_errors_carry_the_body() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v3/account/balance")
        .with_status(401)
        .with_body(r#"{"error": "invalid_api_key"}"#)
        .create_async()
        .await;

    let (result, _) = run(&server).await;

    match result.unwrap_err() {
        Error::Http { status, body, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert!(body.contains("invalid_api_key"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}
