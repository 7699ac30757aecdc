//! End-to-end scan tests: real HTTP adapters against `wiremock` fixtures,
//! driven through the full Matcher -> Calculator -> Cache -> Alert path.

use std::sync::Arc;
use std::time::Duration;

use arb_scanner::alert::{AlertConfig, AlertDispatcher};
use arb_scanner::cache::memory::MemoryCache;
use arb_scanner::orchestrator::{ScanJob, ScanOrchestrator};
use arb_scanner::platform::manifold::ManifoldAdapter;
use arb_scanner::platform::polymarket::PolymarketAdapter;
use arb_scanner::platform::{Platform, PlatformAdapter};
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(pm: &MockServer, man: &MockServer) -> ScanOrchestrator<MemoryCache> {
    let http = reqwest::Client::new();
    let adapters: Vec<Arc<dyn PlatformAdapter>> = vec![
        Arc::new(PolymarketAdapter::new(http.clone(), pm.uri())),
        Arc::new(ManifoldAdapter::new(http.clone(), man.uri())),
    ];
    let cache = Arc::new(MemoryCache::new());
    let alerts = Arc::new(AlertDispatcher::new(
        http,
        cache.clone(),
        AlertConfig {
            webhook_url: None,
            min_roi_percent: dec!(5),
            min_profit_amount: dec!(0),
            cooldown_seconds: 60,
        },
    ));
    ScanOrchestrator::new(adapters, cache, alerts)
}

#[tokio::test]
async fn seed_scenario_clear_arbitrage_between_polymarket_and_manifold() {
    let pm_server = MockServer::start().await;
    let man_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "pm-1",
                "question": "US recession in 2025?",
                "slug": "us-recession-in-2025",
                "outcomes": "[\"Yes\",\"No\"]",
                "outcomePrices": "[\"0.45\",\"0.55\"]",
                "endDate": null,
                "liquidity": "5000",
                "category": "Economics",
            }
        ])))
        .mount(&pm_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v0/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "man-1",
                "question": "US recession 2025",
                "url": null,
                "outcomeType": "BINARY",
                "isResolved": false,
                "probability": 0.60,
                "closeTime": null,
                "totalLiquidity": 3000,
                "groupSlugs": ["economics"],
            }
        ])))
        .mount(&man_server)
        .await;

    let orch = orchestrator(&pm_server, &man_server);
    let job = ScanJob {
        platform_a: Platform::Pm,
        platform_b: Platform::Man,
        limit: 50,
    };
    let result = orch.run(&job).await.unwrap();

    assert_eq!(result.markets_scanned, 2);
    assert_eq!(result.matches_found, 1);
    assert_eq!(result.opportunities.len(), 1);
    let opp = &result.opportunities[0];
    assert_eq!(opp.total_cost, dec!(0.83));
    assert!(opp.is_profitable);
}

#[tokio::test]
async fn unrelated_markets_yield_no_opportunities() {
    let pm_server = MockServer::start().await;
    let man_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "pm-2",
                "question": "Will the Fed cut rates?",
                "slug": "will-the-fed-cut-rates",
                "outcomes": "[\"Yes\",\"No\"]",
                "outcomePrices": "[\"0.30\",\"0.70\"]",
                "endDate": null,
                "liquidity": "1000",
                "category": null,
            }
        ])))
        .mount(&pm_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v0/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "man-2",
                "question": "Who wins the World Cup?",
                "url": null,
                "outcomeType": "BINARY",
                "isResolved": false,
                "probability": 0.20,
                "closeTime": null,
                "totalLiquidity": 500,
                "groupSlugs": ["sports"],
            }
        ])))
        .mount(&man_server)
        .await;

    let orch = orchestrator(&pm_server, &man_server);
    let job = ScanJob {
        platform_a: Platform::Pm,
        platform_b: Platform::Man,
        limit: 50,
    };
    let result = orch.run(&job).await.unwrap();

    assert_eq!(result.matches_found, 0);
    assert!(result.opportunities.is_empty());
}

#[tokio::test]
async fn rate_limited_response_retries_after_the_advertised_delay() {
    let pm_server = MockServer::start().await;
    let man_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&pm_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "pm-3",
                "question": "Will it rain tomorrow?",
                "slug": "will-it-rain-tomorrow",
                "outcomes": "[\"Yes\",\"No\"]",
                "outcomePrices": "[\"0.40\",\"0.60\"]",
                "endDate": null,
                "liquidity": "2000",
                "category": null,
            }
        ])))
        .expect(1)
        .mount(&pm_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v0/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&man_server)
        .await;

    let orch = orchestrator(&pm_server, &man_server);
    let job = ScanJob {
        platform_a: Platform::Pm,
        platform_b: Platform::Man,
        limit: 50,
    };

    let start = std::time::Instant::now();
    let result = orch.run(&job).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1900), "expected a ~2s wait honoring Retry-After, got {elapsed:?}");
    assert_eq!(result.markets_scanned, 1);
}
