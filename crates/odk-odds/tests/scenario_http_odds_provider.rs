//! Scenario: `HttpOddsProvider` against a mocked TheOddsAPI-shaped endpoint.
//!
//! No network, no real API key — `httpmock` stands in for the upstream.

use httpmock::MockServer;
use odk_odds::provider::{FetchRequest, HttpOddsProvider, OddsProvider, ProviderError};
use odk_schemas::{Market, Sport};

fn req() -> FetchRequest {
    FetchRequest {
        sport: Sport::Nhl,
        markets: vec![Market::Moneyline],
        hours_ahead: 36,
    }
}

#[tokio::test]
async fn fetch_decodes_a_well_formed_array_response() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::GET)
            .path("/v4/sports/icehockey_nhl/odds")
            .query_param("apiKey", "test-key")
            .query_param("markets", "h2h");
        then.status(200).json_body(serde_json::json!([
            {
                "id": "game-1",
                "home_team": "Boston Bruins",
                "away_team": "New York Rangers",
                "commence_time": "2026-03-01T00:00:00Z",
                "bookmakers": [],
            }
        ]));
    });

    let provider = HttpOddsProvider::new(server.base_url(), "test-key");
    let games = provider.fetch(&req()).await.unwrap();

    mock.assert();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].provider_id.as_deref(), Some("game-1"));
}

#[tokio::test]
async fn fetch_maps_401_to_config_error_without_leaking_the_key() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/v4/sports/icehockey_nhl/odds");
        then.status(401).body("unauthorized");
    });

    let provider = HttpOddsProvider::new(server.base_url(), "bad-key");
    let err = provider.fetch(&req()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Config(_)));
    assert!(!err.to_string().contains("bad-key"));
}

#[tokio::test]
async fn fetch_rejects_a_non_array_payload_as_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/v4/sports/icehockey_nhl/odds");
        then.status(200).json_body(serde_json::json!({ "message": "not an array" }));
    });

    let provider = HttpOddsProvider::new(server.base_url(), "test-key");
    let err = provider.fetch(&req()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn fetch_surfaces_non_401_api_errors_with_status_code() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/v4/sports/icehockey_nhl/odds");
        then.status(429).body("rate limited");
    });

    let provider = HttpOddsProvider::new(server.base_url(), "test-key");
    let err = provider.fetch(&req()).await.unwrap_err();

    match err {
        ProviderError::Api { code, message } => {
            assert_eq!(code, Some(429));
            assert_eq!(message, "rate limited");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
