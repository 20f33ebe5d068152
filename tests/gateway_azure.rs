use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use namematch_harness::gateway::azure::{
    AzureSearchAdapter, SearchProvider, DEFAULT_API_VERSION, MAX_UPLOAD_BATCH,
};
use namematch_harness::gateway::{
    Attribution, GatewayConfig, NoopUsageSink, SearchError, SearchGateway, SearchOutcome,
    SearchRequest, SearchServiceGateway,
};
use namematch_harness::evaluation::{ExperimentRunner, ReportStore, RunError};
use namematch_harness::{FieldSubset, NameDataset};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEARCH_PATH: &str = "/indexes/names/docs/search";

fn adapter(server: &MockServer) -> AzureSearchAdapter {
    AzureSearchAdapter::with_config(
        "test-key",
        server.uri(),
        "names",
        DEFAULT_API_VERSION,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn gateway(server: &MockServer) -> SearchServiceGateway<NoopUsageSink> {
    SearchServiceGateway::with_config(
        adapter(server),
        Arc::new(NoopUsageSink),
        GatewayConfig {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1),
        },
    )
}

fn subset(fields: &[&str]) -> FieldSubset {
    FieldSubset::new(fields.iter().map(|f| f.to_string()).collect()).unwrap()
}

#[tokio::test]
async fn search_sends_full_query_over_joined_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(query_param("api-version", DEFAULT_API_VERSION))
        .and(header("api-key", "test-key"))
        .and(body_json(json!({
            "queryType": "full",
            "search": "Smyth",
            "searchFields": "phonetic,ngram"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "@search.score": 1.5, "standard_lucene": "Smith" },
                { "@search.score": 0.7, "standard_lucene": "Smythe" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = SearchGateway::search(&gateway(&server), "Smyth", &subset(&["phonetic", "ngram"]))
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::Found("Smith".into()));
}

#[tokio::test]
async fn first_hit_at_the_top_score_wins() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "@search.score": 0.4, "standard_lucene": "Jonas" },
                { "@search.score": 2.0, "standard_lucene": "Jones" },
                { "@search.score": 2.0, "standard_lucene": "Jonez" }
            ]
        })))
        .mount(&server)
        .await;

    let req = SearchRequest::new("Jnoes", vec!["keyword".into()], Attribution::new("test"));
    let resp = adapter(&server).search(&req).await.unwrap();
    assert_eq!(resp.hits.len(), 3);
    assert_eq!(resp.outcome(), SearchOutcome::Found("Jones".into()));
}

#[tokio::test]
async fn hit_without_a_name_fails_the_query_instead_of_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "@search.score": 3.0, "name": "Smith" },
                { "@search.score": 1.0, "standard_lucene": "Smythe" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = SearchGateway::search(&gateway(&server), "Smyth", &subset(&["keyword"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Service { retryable: false, .. }));
    assert!(err.to_string().contains("standard_lucene"));
}

#[tokio::test]
async fn unnamed_hits_abort_the_run_without_a_report() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "@search.score": 3.0, "name": "Smith" }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let dataset = NameDataset::new(vec!["Smith".into()], vec!["Smyth".into()]).unwrap();
    let keyword = subset(&["keyword"]);

    let err = ExperimentRunner::new(&store)
        .run(&dataset, std::slice::from_ref(&keyword), &gateway(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Search { .. }));
    assert!(!store.is_complete(&keyword).unwrap());
}

#[tokio::test]
async fn no_hits_is_not_found_rather_than_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let outcome = SearchGateway::search(&gateway(&server), "Zzyzx", &subset(&["keyword"]))
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(outcome.as_str(), "NOT_FOUND");
}

#[tokio::test]
async fn unauthorized_is_fatal_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("request-id", "req-403")
                .set_body_json(json!({
                    "error": { "code": "Forbidden", "message": "bad api key" }
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = SearchGateway::search(&gateway(&server), "Smyth", &subset(&["keyword"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Unauthorized { .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.request_id(), Some("req-403"));
    assert!(err.to_string().contains("bad api key"));
}

struct FailThenSucceed {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl Respond for FailThenSucceed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            ResponseTemplate::new(503).set_body_string("busy")
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "@search.score": 1.0, "standard_lucene": "Smith" }]
            }))
        }
    }
}

#[tokio::test]
async fn service_unavailable_is_retried_until_success() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(FailThenSucceed {
            calls: calls.clone(),
            failures: 2,
        })
        .mount(&server)
        .await;

    let outcome = SearchGateway::search(&gateway(&server), "Smyth", &subset(&["keyword"]))
        .await
        .unwrap();
    assert_eq!(outcome, SearchOutcome::Found("Smith".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(FailThenSucceed {
            calls: calls.clone(),
            failures: usize::MAX,
        })
        .mount(&server)
        .await;

    let err = SearchGateway::search(&gateway(&server), "Smyth", &subset(&["keyword"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Service { retryable: true, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Accepts every document except the name "Reject".
struct IndexEcho;

impl Respond for IndexEcho {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let results: Vec<serde_json::Value> = body["value"]
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| {
                let ok = doc["standard_lucene"] != "Reject";
                let status_code = if ok { 201 } else { 400 };
                json!({ "key": doc["id"], "status": ok, "statusCode": status_code })
            })
            .collect();
        ResponseTemplate::new(207).set_body_json(json!({ "value": results }))
    }
}

#[tokio::test]
async fn upload_splits_into_service_sized_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/indexes/names/docs/index"))
        .and(header("api-key", "test-key"))
        .respond_with(IndexEcho)
        .mount(&server)
        .await;

    let mut names: Vec<String> = (0..MAX_UPLOAD_BATCH).map(|i| format!("Name{i}")).collect();
    names.push("Reject".into());
    let fields = vec!["phonetic".to_string(), "keyword".to_string()];

    let summary = adapter(&server)
        .upload_documents(&names, &fields)
        .await
        .unwrap();
    assert_eq!(summary.documents, MAX_UPLOAD_BATCH + 1);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.failed, 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let doc = &first["value"][0];
    assert_eq!(doc["@search.action"], "upload");
    assert_eq!(doc["standard_lucene"], "Name0");
    assert_eq!(doc["phonetic"], "Name0");
    assert_eq!(doc["keyword"], "Name0");
    assert_eq!(first["value"].as_array().unwrap().len(), MAX_UPLOAD_BATCH);
}

#[tokio::test]
async fn create_index_puts_schema_under_configured_name() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/indexes/names"))
        .and(query_param("api-version", DEFAULT_API_VERSION))
        .and(body_partial_json(json!({ "name": "names" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "names" })))
        .expect(1)
        .mount(&server)
        .await;

    let schema = json!({
        "name": "something-else",
        "fields": [{ "name": "id", "type": "Edm.String", "key": true }]
    });
    adapter(&server).create_index(&schema).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["fields"], schema["fields"]);
}

#[tokio::test]
async fn create_index_surfaces_service_validation_errors() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/indexes/names"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "InvalidRequestParameter", "message": "unknown analyzer" }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .create_index(&json!({ "fields": [] }))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidRequest { .. }));
    assert_eq!(err.code(), "invalid_request");
}
