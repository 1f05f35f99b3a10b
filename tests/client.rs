use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use datapilot_client::client::{
    DataPilotClient, DataPilotHttpClient, FETCH_FAILED, QA_FAILED, UPLOAD_FAILED,
};
use datapilot_client::config::ClientConfig;
use datapilot_client::domain::{DatasetId, TabularFileName};
use datapilot_client::error::DataPilotError;

/// The blocking client must not run on an async worker thread.
async fn with_client<T, F>(base_url: String, call: F) -> T
where
    T: Send + 'static,
    F: FnOnce(DataPilotHttpClient) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let config = ClientConfig::new(&base_url).unwrap();
        call(DataPilotHttpClient::new(&config).unwrap())
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn dashboard_maps_datasets_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_datasets": 2,
            "total_rows": 160,
            "datasets": [
                {"dataset_id": "d1", "name": "sales.csv", "rows": 120, "columns": 5,
                 "preview": [{"region": "north", "revenue": 100}]},
                {"dataset_id": "d2", "name": "costs.csv", "rows": 40, "columns": 3}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Trailing slash on the base URL must not produce `//dashboard`.
    let datasets = with_client(format!("{}/", server.uri()), |client| {
        client.fetch_registry()
    })
    .await
    .unwrap();

    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0].id, DatasetId::from("d1"));
    assert_eq!(datasets[0].name, "sales.csv");
    assert_eq!(datasets[0].row_count, 120);
    assert_eq!(datasets[0].column_count, 5);
    assert_eq!(datasets[0].preview.len(), 1);
    assert_eq!(datasets[1].id, DatasetId::from("d2"));
    assert!(datasets[1].preview.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn dashboard_failure_ignores_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "database locked"})),
        )
        .mount(&server)
        .await;

    let err = with_client(server.uri(), |client| client.fetch_registry())
        .await
        .unwrap_err();

    assert_matches!(err, DataPilotError::FetchFailed { status: Some(500), .. });
    assert_eq!(err.to_string(), FETCH_FAILED);
}

#[tokio::test(flavor = "multi_thread")]
async fn dashboard_malformed_body_is_a_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = with_client(server.uri(), |client| client.fetch_registry())
        .await
        .unwrap_err();

    assert_matches!(err, DataPilotError::FetchFailed { status: Some(200), .. });
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"sales.csv\""))
        .and(body_string_contains("region,revenue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dataset_id": "d1", "name": "sales.csv", "rows": 2, "columns": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = with_client(server.uri(), |client| {
        let name: TabularFileName = "sales.csv".parse().unwrap();
        client.upload_dataset(b"region,revenue\nnorth,100\nsouth,80\n", &name)
    })
    .await
    .unwrap();

    assert_eq!(receipt.dataset_id, Some(DatasetId::from("d1")));
    assert_eq!(receipt.name, "sales.csv");
    assert_eq!(receipt.rows, 2);
    assert_eq!(receipt.columns, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_failure_surfaces_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Failed to parse CSV: No columns to parse from file"
        })))
        .mount(&server)
        .await;

    let err = with_client(server.uri(), |client| {
        let name: TabularFileName = "empty.csv".parse().unwrap();
        client.upload_dataset(b"", &name)
    })
    .await
    .unwrap_err();

    assert_matches!(err, DataPilotError::UploadFailed { status: Some(400), .. });
    assert_eq!(
        err.to_string(),
        "Failed to parse CSV: No columns to parse from file"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_failure_without_json_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = with_client(server.uri(), |client| {
        let name: TabularFileName = "sales.csv".parse().unwrap();
        client.upload_dataset(b"a,b\n1,2\n", &name)
    })
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), UPLOAD_FAILED);
    assert_eq!(err.status(), Some(502));
}

#[tokio::test(flavor = "multi_thread")]
async fn qa_includes_selected_dataset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qa"))
        .and(body_json(json!({
            "question": "What is total revenue?",
            "dataset_id": "d1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Total revenue is 1,520.",
            "reasoning": "Summed the revenue column.",
            "code": "df['revenue'].sum()",
            "dataset_id": "d1",
            "provider": "openai"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = with_client(server.uri(), |client| {
        client.ask_question("What is total revenue?", Some(&DatasetId::from("d1")))
    })
    .await
    .unwrap();

    assert_eq!(answer.text, "Total revenue is 1,520.");
    assert_eq!(answer.provider_label, "openai");
    assert_eq!(answer.dataset_id, Some(DatasetId::from("d1")));
    assert!(answer.has_detail());
}

#[tokio::test(flavor = "multi_thread")]
async fn qa_omits_dataset_when_none_selected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qa"))
        .and(body_json(json!({"question": "How many rows?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "120",
            "reasoning": null,
            "code": null,
            "dataset_id": "d2",
            "provider": "groq"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = with_client(server.uri(), |client| {
        client.ask_question("How many rows?", None)
    })
    .await
    .unwrap();

    assert_eq!(answer.dataset_id, Some(DatasetId::from("d2")));
    assert!(!answer.has_detail());
}

#[tokio::test(flavor = "multi_thread")]
async fn qa_failure_surfaces_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qa"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "model unavailable"})),
        )
        .mount(&server)
        .await;

    let err = with_client(server.uri(), |client| client.ask_question("q", None))
        .await
        .unwrap_err();

    assert_matches!(err, DataPilotError::QaFailed { status: Some(500), .. });
    assert_eq!(err.to_string(), "model unavailable");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_is_a_generic_failure() {
    // A non-pooled server so dropping it actually closes the listener.
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let err = with_client(uri, |client| client.ask_question("q", None))
        .await
        .unwrap_err();

    assert_matches!(err, DataPilotError::QaFailed { status: None, .. });
    assert_eq!(err.to_string(), QA_FAILED);
}
