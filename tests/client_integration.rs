use std::time::Duration;

use rust_decimal::Decimal;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bdl_api_client::client::BdlClientBuilder;
use bdl_api_client::fetch::CLIENT_ID_HEADER;
use bdl_api_client::types::{Unit, UnitLevel, Variable};
use bdl_api_client::{BdlClient, BdlError, Identity};

fn builder(server: &MockServer, dir: &TempDir) -> BdlClientBuilder {
    BdlClient::builder()
        .base_url(server.uri())
        .state_path(dir.path().join("rate_limiter_state.json"))
        .cache_dir(dir.path().join("api_cache"))
        .backoff(Duration::from_millis(20))
}

fn units_response() -> serde_json::Value {
    serde_json::json!({
        "totalRecords": 3,
        "results": [
            {"id": "011200000000", "name": "MAŁOPOLSKIE", "parentId": "010000000000", "level": 2},
            {"id": "010200000000", "name": "DOLNOŚLĄSKIE", "parentId": "010000000000", "level": 2},
            {"id": "030200000000", "name": "LUBUSKIE", "parentId": "030000000000", "level": 2}
        ]
    })
}

#[tokio::test]
async fn test_get_units_is_cached() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/units"))
        .and(query_param("level", "0"))
        .and(query_param("page-size", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(units_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();

    let first = client.get_units(None, None).await.unwrap();
    let second = client.get_units(None, None).await.unwrap();

    assert_eq!(first, second);
    let names: Vec<_> = first.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["DOLNOŚLĄSKIE", "LUBUSKIE", "MAŁOPOLSKIE"]);
    assert_eq!(first[0].level, UnitLevel::Voivodeship);

    let stats = client.statistics().await;
    assert_eq!(stats.window("15m").unwrap().remaining, 99);
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/units"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/units"))
        .respond_with(ResponseTemplate::new(200).set_body_json(units_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();
    let units = client.get_units(None, None).await.unwrap();

    assert_eq!(units.len(), 3);
    // Every attempt was admitted and counted.
    assert_eq!(client.statistics().await.window("15m").unwrap().remaining, 97);
}

#[tokio::test]
async fn test_persistent_throttling_exhausts_retries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();
    let err = client.get_units(None, None).await.unwrap_err();

    assert!(matches!(err, BdlError::RetriesExhausted { attempts: 3 }));
    assert_eq!(client.clear_cache().await.unwrap(), 0);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();
    let err = client.get_units(None, None).await.unwrap_err();

    match err {
        BdlError::Transport(e) => assert_eq!(e.status(), Some(500)),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_registered_identity() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/units"))
        .and(query_param("parent-id", "011200000000"))
        .and(query_param("level", "5"))
        .and(header(CLIENT_ID_HEADER, "my-client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"id": "011201000000", "name": "Powiat bocheński", "level": 5},
                {"id": "011261000000", "name": "Powiat m. Kraków", "level": 5}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server, &dir)
        .api_key("my-client-id")
        .build_http()
        .await
        .unwrap();
    assert_eq!(client.identity(), &Identity::from_api_key(Some("my-client-id")));

    let parent = Unit {
        id: "011200000000".to_string(),
        name: "MAŁOPOLSKIE".to_string(),
        level: UnitLevel::Voivodeship,
        parent_id: None,
    };
    let powiaty = client.get_unit_children(&parent).await.unwrap();

    assert_eq!(powiaty.len(), 2);
    assert!(powiaty.iter().all(|u| u.level == UnitLevel::Powiat));

    let stats = client.statistics().await;
    assert_eq!(
        stats.to_string(),
        "Available limits: | 1s: 9/10 | 15m: 499/500 | 12h: 4999/5000 | 7d: 49999/50000"
    );
}

#[tokio::test]
async fn test_collect_rows() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/data/by-unit/011212161011"))
        .and(query_param("var-id", "60559"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "unitId": "011212161011",
            "unitName": "Kraków",
            "results": [{
                "id": 60559,
                "values": [
                    {"year": "2022", "val": 803282, "attrId": 1},
                    {"year": "2023", "val": 804237, "attrId": 1}
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();
    let units = [Unit {
        id: "011212161011".to_string(),
        name: "Kraków".to_string(),
        level: UnitLevel::Gmina,
        parent_id: Some("011212161000".to_string()),
    }];
    let variables = [Variable::new("60559", "Ludność ogółem")];

    let rows = client
        .collect_rows(&variables, &units, &[2021, 2022, 2023])
        .await
        .unwrap();

    let values: Vec<_> = rows["60559"].iter().map(|r| (r.year, r.value)).collect();
    assert_eq!(
        values,
        [
            (2021, None),
            (2022, Some(Decimal::from(803282))),
            (2023, Some(Decimal::from(804237))),
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap();
    assert_eq!(query, "var-id=60559&year=2021&year=2022&year=2023&format=json");
}

#[tokio::test]
async fn test_quota_survives_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(units_response()))
        .mount(&server)
        .await;

    let client = builder(&server, &dir).build_http().await.unwrap();
    client.get_units(None, None).await.unwrap();
    client.save_state().await;
    drop(client);

    let restarted = builder(&server, &dir).build_http().await.unwrap();
    let stats = restarted.statistics().await;

    assert_eq!(stats.window("15m").unwrap().remaining, 99);
    assert_eq!(stats.window("7d").unwrap().remaining, 9_999);
    assert!(dir.path().join("rate_limiter_state.json").exists());
}
