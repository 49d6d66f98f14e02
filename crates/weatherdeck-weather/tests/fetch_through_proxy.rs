//! Fetcher reading through an activated cache proxy.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use weatherdeck_core::{City, ProviderConfig};
use weatherdeck_proxy::{CacheProxy, CacheStorage, HttpNetwork, MemoryCacheStorage, ProxyConfig};
use weatherdeck_weather::{ForecastEvent, ForecastFetcher, ForecastSource, WeatherError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATA: &str = "weatherdeck-data";

fn yql(created: &str, temp: &str) -> serde_json::Value {
    json!({
        "query": {
            "created": created,
            "results": { "channel": {
                "astronomy": { "sunrise": "5:32 am", "sunset": "8:21 pm" },
                "atmosphere": { "humidity": "56" },
                "wind": { "direction": "225", "speed": "11" },
                "item": {
                    "condition": { "code": "32", "date": "Tue, 02 May 2017", "temp": temp, "text": "Sunny" },
                    "forecast": [
                        { "code": "32", "day": "Tue", "high": "21", "low": "9" },
                        { "code": "11", "day": "Wed", "high": "17", "low": "8" }
                    ]
                }
            }}
        }
    })
}

struct Stack {
    fetcher: ForecastFetcher,
    events: mpsc::UnboundedReceiver<ForecastEvent>,
    storage: Arc<MemoryCacheStorage>,
}

async fn stack(server: &MockServer) -> Stack {
    let storage = Arc::new(MemoryCacheStorage::new());
    let network = Arc::new(HttpNetwork::new(Duration::from_secs(5), "weatherdeck-test").unwrap());
    let proxy = Arc::new(CacheProxy::new(
        ProxyConfig {
            shell_origin: Url::parse(&format!("{}/app/", server.uri())).unwrap(),
            shell_cache: "weatherdeck-v1".to_string(),
            shell_assets: vec![],
            data_origin: format!("{}/data/", server.uri()),
            data_cache: DATA.to_string(),
        },
        storage.clone(),
        network,
    ));
    proxy.register().await.unwrap();

    let provider = ProviderConfig {
        url_template: format!("{}/data/yql?id=$$CITY_ID$$", server.uri()),
        data_origin: format!("{}/data/", server.uri()),
        ..ProviderConfig::default()
    };
    let (tx, rx) = mpsc::unbounded_channel();
    let fetcher = ForecastFetcher::new(provider, proxy, tx, CancellationToken::new())
        .with_cache(storage.clone(), DATA);

    Stack {
        fetcher,
        events: rx,
        storage,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ForecastEvent>) -> Vec<(ForecastSource, String)> {
    let mut out = Vec::new();
    while let Ok(ForecastEvent::Ready(f)) = rx.try_recv() {
        out.push((f.source, f.created.to_rfc3339()));
    }
    out
}

#[tokio::test]
async fn second_fetch_shows_cached_forecast_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/yql"))
        .and(query_param("id", "924938"))
        .respond_with(ResponseTemplate::new(200).set_body_json(yql("2017-05-02T10:00:00Z", "12")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/yql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(yql("2017-05-02T11:00:00Z", "14"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let mut s = stack(&server).await;
    let kyiv = City::new("924938", "Kyiv, UA");

    let first = s.fetcher.get_forecast(&kyiv).join().await;
    assert!(!first.provisional_delivered);
    assert!(first.network.is_ok());
    assert_eq!(s.storage.entry_count(DATA).await.unwrap(), 1);
    assert_eq!(
        drain(&mut s.events),
        vec![(ForecastSource::Network, "2017-05-02T10:00:00+00:00".to_string())]
    );

    let second = s.fetcher.get_forecast(&kyiv).join().await;
    assert!(second.provisional_delivered);
    assert_eq!(
        drain(&mut s.events),
        vec![
            (ForecastSource::Cache, "2017-05-02T10:00:00+00:00".to_string()),
            (ForecastSource::Network, "2017-05-02T11:00:00+00:00".to_string()),
        ]
    );
}

#[tokio::test]
async fn failing_provider_leaves_cached_forecast_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/yql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(yql("2017-05-02T10:00:00Z", "12")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/yql"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut s = stack(&server).await;
    let kyiv = City::new("924938", "Kyiv, UA");
    s.fetcher.get_forecast(&kyiv).join().await;
    drain(&mut s.events);

    let outcome = s.fetcher.get_forecast(&kyiv).join().await;

    assert!(outcome.provisional_delivered);
    assert!(matches!(outcome.network, Err(WeatherError::Status(500))));
    assert_eq!(
        drain(&mut s.events),
        vec![(ForecastSource::Cache, "2017-05-02T10:00:00+00:00".to_string())]
    );
    // The failed response did not replace the cached one.
    let cached = s
        .storage
        .match_any(&format!("{}/data/yql?id=924938", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.status, 200);
}

#[tokio::test]
async fn undecodable_body_is_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/yql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut s = stack(&server).await;
    let outcome = s.fetcher.get_forecast(&City::new("924938", "Kyiv, UA")).join().await;

    assert!(matches!(outcome.network, Err(WeatherError::Parse(_))));
    assert!(drain(&mut s.events).is_empty());
}
