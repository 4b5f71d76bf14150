use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(endpoint: String) -> GeneratorConfig {
    GeneratorConfig {
        endpoint,
        timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_generate_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_json(json!({"prompt": "a lighthouse at dusk"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "s3://out/1.png"})))
        .expect(1)
        .mount(&server)
        .await;

    let generator = HttpGenerator::new(&config(format!("{}/generate", server.uri()))).unwrap();
    let output = generator
        .generate(&json!({"prompt": "a lighthouse at dusk"}))
        .await
        .unwrap();
    assert_eq!(output, "s3://out/1.png");
}

#[tokio::test]
async fn test_generate_sends_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(server.uri());
    config
        .headers
        .insert("Authorization".to_string(), "Bearer t0ken".to_string());
    let generator = HttpGenerator::new(&config).unwrap();
    assert_eq!(generator.generate(&json!({})).await.unwrap(), "ok");
}

#[tokio::test]
async fn test_generate_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model is overloaded"))
        .mount(&server)
        .await;

    let generator = HttpGenerator::new(&config(server.uri())).unwrap();
    let err = generator.generate(&json!({})).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("503"));
    assert!(message.contains("model is overloaded"));
}

#[tokio::test]
async fn test_generate_missing_output_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "nope"})))
        .mount(&server)
        .await;

    let generator = HttpGenerator::new(&config(server.uri())).unwrap();
    let err = generator.generate(&json!({})).await.unwrap_err();
    assert!(err.to_string().contains("invalid response body"));
}

#[tokio::test]
async fn test_generate_without_endpoint() {
    let generator = HttpGenerator::new(&GeneratorConfig::default()).unwrap();
    let err = generator.generate(&json!({})).await.unwrap_err();
    assert!(matches!(err, QueueError::Generation(_)));
}

#[test]
fn test_invalid_header_rejected() {
    let mut config = GeneratorConfig::default();
    config
        .headers
        .insert("bad header".to_string(), "x".to_string());
    assert!(HttpGenerator::new(&config).is_err());
}

#[tokio::test]
async fn test_services_run_job_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "file:///out.mp4"})))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.store.path = dir.path().join("genflow.db").to_string_lossy().into_owned();
    config.generator.endpoint = server.uri();
    config.queue.poll_interval_ms = 20;

    let services = Services::open(&config).await.unwrap();
    let (tx, rx) = tokio::sync::watch::channel(false);
    let pool = services.queue.start(rx);

    let id = services
        .queue
        .enqueue(genflow_store::JobSpec::new("clip", json!({"prompt": "waves"})))
        .await
        .unwrap();
    let job = services.queue.wait_for(&id).await.unwrap();
    assert_eq!(job.status, genflow_store::JobStatus::Completed);
    assert_eq!(job.output.as_deref(), Some("file:///out.mp4"));

    tx.send(true).unwrap();
    pool.await.unwrap();
    assert_eq!(services.store.history(Some(&id)).await.unwrap().len(), 1);
}

#[test]
fn test_genflow_dir() {
    assert!(genflow_dir().ends_with(".genflow"));
}
