//! Unit tests for the repodata client

use super::*;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client() -> ChannelClient {
    let retry = RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    };
    ChannelClient::with_config(retry, Duration::from_secs(5)).unwrap()
}

fn mock_repodata() -> serde_json::Value {
    serde_json::json!({
        "info": { "subdir": "linux-64" },
        "packages": {
            "zlib-1.3.1-h4ab18f5_1.tar.bz2": {
                "name": "zlib", "version": "1.3.1", "build": "h4ab18f5_1", "build_number": 1,
                "depends": ["libgcc-ng >=12"], "size": 61574
            }
        }
    })
}

#[tokio::test]
async fn test_retry_config_default() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.multiplier, 2.0);

    let client = ChannelClient::new().unwrap();
    assert_eq!(client.retry_config.max_retries, 3);
}

#[tokio::test]
async fn test_fetch_repodata_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/main/linux-64/repodata.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_json(mock_repodata()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let channel = Channel::parse(&format!("{}/main", mock_server.uri()), "https://unused.example").unwrap();
    let outcome = fast_client().fetch_repodata(&channel, "linux-64", None).await.unwrap();

    match outcome {
        FetchOutcome::Modified(data) => {
            assert_eq!(data.etag.as_deref(), Some("\"v1\""));
            assert_eq!(data.records.len(), 1);
            let record = &data.records[0];
            assert_eq!(record.name, "zlib");
            assert_eq!(record.channel, channel.url());
            assert_eq!(record.subdir, "linux-64");
            assert_eq!(record.depends, vec!["libgcc-ng >=12".to_string()]);
        },
        FetchOutcome::NotModified => panic!("expected a new document"),
    }
}

#[tokio::test]
async fn test_conditional_fetch_not_modified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/main/noarch/repodata.json"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .mount(&mock_server)
        .await;

    let channel = Channel::parse(&format!("{}/main", mock_server.uri()), "https://unused.example").unwrap();
    let outcome = fast_client().fetch_repodata(&channel, "noarch", Some("\"v1\"")).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::NotModified));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing/linux-64/repodata.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let channel = Channel::parse(&format!("{}/missing", mock_server.uri()), "https://unused.example").unwrap();
    let result = fast_client().fetch_repodata(&channel, "linux-64", None).await;

    match result {
        Err(SprigError::ChannelFetchFailed { channel: failed, subdir, message, .. }) => {
            assert_eq!(failed, channel.url());
            assert_eq!(subdir, "linux-64");
            assert!(message.contains("404"));
        },
        other => panic!("expected ChannelFetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky/linux-64/repodata.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let channel = Channel::parse(&format!("{}/flaky", mock_server.uri()), "https://unused.example").unwrap();
    let result = fast_client().fetch_repodata(&channel, "linux-64", None).await;
    assert!(matches!(result, Err(SprigError::ChannelFetchFailed { .. })));
}

#[tokio::test]
async fn test_invalid_repodata_is_a_fetch_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken/noarch/repodata.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let channel = Channel::parse(&format!("{}/broken", mock_server.uri()), "https://unused.example").unwrap();
    let error = fast_client().fetch_repodata(&channel, "noarch", None).await.unwrap_err();
    assert!(error.to_string().contains("invalid repodata"));
}

#[tokio::test]
async fn test_local_channel() {
    let temp = tempfile::tempdir().unwrap();
    let subdir = temp.path().join("noarch");
    std::fs::create_dir_all(&subdir).unwrap();
    std::fs::write(
        subdir.join("repodata.json"),
        serde_json::to_vec(&serde_json::json!({
            "packages": {
                "tzdata-2024a-h0c530f3_0.tar.bz2": {
                    "name": "tzdata", "version": "2024a", "build": "h0c530f3_0", "subdir": "noarch"
                }
            }
        }))
        .unwrap(),
    )
    .unwrap();

    let channel = Channel::parse(temp.path().to_str().unwrap(), "https://unused.example").unwrap();
    assert!(channel.is_local());

    let client = fast_client();
    match client.fetch(&channel, "noarch", None).await.unwrap() {
        FetchOutcome::Modified(data) => {
            assert_eq!(data.records.len(), 1);
            assert_eq!(data.records[0].name, "tzdata");
        },
        FetchOutcome::NotModified => panic!("local channels are always read"),
    }

    let missing = client.fetch(&channel, "linux-64", None).await;
    assert!(matches!(missing, Err(SprigError::ChannelFetchFailed { .. })));
}
