use chrono::TimeZone;
use chrono_tz::Europe::Paris;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tempo_sync::config::Config;
use tempo_sync::error::Result;
use tempo_sync::tempo::{ApiClient, Sleeper, TokenSource};
use tempo_sync::TempoPoller;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticToken;

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok("tok".to_string())
    }
}

struct NoSleep;

#[async_trait::async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn calendar_body(last_end: &str) -> serde_json::Value {
    serde_json::json!({
        "tempo_like_calendars": {
            "values": [
                {
                    "start_date": "2024-01-15T00:00:00+01:00",
                    "end_date": "2024-01-16T00:00:00+01:00",
                    "value": "BLUE",
                    "updated_date": "2024-01-14T10:20:00+01:00"
                },
                {
                    "start_date": "2024-01-16T00:00:00+01:00",
                    "end_date": last_end,
                    "value": "WHITE",
                    "updated_date": "2024-01-15T10:20:00+01:00"
                }
            ]
        }
    })
}

fn poller(server: &MockServer) -> TempoPoller {
    let mut cfg = Config::default();
    cfg.api.calendar_endpoint = format!("{}/calendars", server.uri());
    let client = ApiClient::new(reqwest::Client::new(), Arc::new(StaticToken), &cfg)
        .unwrap()
        .with_sleeper(Arc::new(NoSleep));
    TempoPoller::new(Arc::new(client), &cfg.schedule)
        .unwrap()
        .with_jitter(|r: Range<i64>| r.start)
}

#[tokio::test]
async fn successful_cycle_publishes_and_schedules_tomorrow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("start_date", "2023-01-16T00:00:00+01:00"))
        .and(query_param("end_date", "2024-01-17T00:00:00+01:00"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(calendar_body("2024-01-17T00:00:00+01:00")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut p = poller(&server);
    let mut rx = p.subscribe();
    let now = Paris.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap();

    let wait = p.poll_at(now).await;
    // Past the 10:30 checkpoint with tomorrow known: next 06:00
    assert_eq!(wait, Duration::from_secs(19 * 3600));

    assert!(rx.has_changed().unwrap());
    let published = rx.borrow_and_update().clone().unwrap();
    assert_eq!(published.date_aligned_days.len(), 2);
    assert!(Arc::ptr_eq(&published, &p.latest().unwrap()));
}

#[tokio::test]
async fn failed_cycle_keeps_previous_result_and_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(calendar_body("2024-01-16T00:00:00+01:00")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut p = poller(&server);
    let now = Paris.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();

    // Only today known after the change hour: short retry, lowest draw
    assert_eq!(p.poll_at(now).await, Duration::from_secs(1500));
    let first = p.latest().unwrap();

    assert_eq!(p.poll_at(now).await, Duration::from_secs(600));
    assert!(Arc::ptr_eq(&first, &p.latest().unwrap()));
}

#[tokio::test]
async fn empty_calendar_polls_again_in_ten_minutes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"tempo_like_calendars": {"values": []}}),
        ))
        .mount(&server)
        .await;

    let mut p = poller(&server);
    let now = Paris.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    assert_eq!(p.poll_at(now).await, Duration::from_secs(600));
    assert!(p.latest().unwrap().is_empty());
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(calendar_body("2024-01-17T00:00:00+01:00")),
        )
        .mount(&server)
        .await;

    let mut p = poller(&server);
    let mut rx = p.subscribe();
    let handle = p.shutdown_handle();
    let task = tokio::spawn(async move {
        let outcome = p.run().await;
        (p, outcome)
    });

    // First cycle published, poller now waiting for the next one
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .unwrap()
        .unwrap();
    handle.shutdown();

    let (p, outcome) = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    outcome.unwrap();
    assert!(p.latest().is_some());
}
