//! Runs the real HTTP client against a local server that mimics the
//! chat-completions endpoint.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use helmet_check::config::ModelSettings;
use helmet_check::ingest::EncodedPayload;
use helmet_check::preset::Preset;
use helmet_check::vision::{ClassificationRequest, ClassificationResult, OpenAiClient, VisionModel};
use helmet_check::workflow::Classifier;
use helmet_check::Error;
use std::sync::{Arc, Mutex};

/// What the mock returns, and what it saw
struct Mock {
    status: u16,
    content: Option<String>,
    requests: Mutex<Vec<(Option<String>, serde_json::Value)>>,
}

async fn completions(
    req: HttpRequest,
    body: web::Json<serde_json::Value>,
    mock: web::Data<Mock>,
) -> HttpResponse {
    let auth = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    mock.requests.lock().unwrap().push((auth, body.into_inner()));

    let status = actix_web::http::StatusCode::from_u16(mock.status).unwrap();
    match &mock.content {
        Some(content) => HttpResponse::build(status).json(serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })),
        None => HttpResponse::build(status).body("upstream exploded"),
    }
}

/// Start the mock on a free port and return a client pointed at it
fn start_mock(mock: web::Data<Mock>) -> OpenAiClient {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(mock.clone())
            .route("/v1/chat/completions", web::post().to(completions))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    OpenAiClient::new(&ModelSettings {
        endpoint: format!("http://{addr}/"),
        name: "gpt-4o-mini".into(),
        timeout_secs: Some(10),
        api_key: "sk-test".into(),
    })
    .unwrap()
}

fn mock(status: u16, content: Option<&str>) -> web::Data<Mock> {
    web::Data::new(Mock {
        status,
        content: content.map(|c| c.to_string()),
        requests: Mutex::new(Vec::new()),
    })
}

fn request() -> ClassificationRequest {
    let payload = EncodedPayload::from_png(vec![0x89, b'P', b'N', b'G']);
    ClassificationRequest::new(&payload, "is a helmet worn? reply in JSON")
}

#[actix_web::test]
async fn test_helmet_worn() {
    let mock = mock(200, Some(r#"{"helmet": true, "confidence": 87}"#));
    let client = start_mock(mock.clone());

    let result = client.classify(&request()).await.unwrap();
    assert_eq!(
        result,
        ClassificationResult {
            helmet: true,
            confidence: 87
        }
    );

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["response_format"]["type"], "json_object");
    let content = &body["messages"][0]["content"];
    assert_eq!(content[0]["type"], "image_url");
    assert_eq!(content[0]["image_url"]["url"], "data:image/png;base64,iVBORw==");
    assert_eq!(content[1]["type"], "text");
    assert_eq!(content[1]["text"], "is a helmet worn? reply in JSON");
}

#[actix_web::test]
async fn test_helmet_not_worn() {
    let client = start_mock(mock(200, Some(r#"{"helmet": false, "confidence": 42}"#)));
    let result = client.classify(&request()).await.unwrap();
    assert!(!result.helmet);
    assert_eq!(result.confidence, 42);
}

#[actix_web::test]
async fn test_non_json_content() {
    let client = start_mock(mock(200, Some("not json")));
    let err = client.classify(&request()).await.unwrap_err();
    assert!(matches!(err, Error::ResponseParse(_)));
}

#[actix_web::test]
async fn test_missing_confidence() {
    let client = start_mock(mock(200, Some(r#"{"helmet": true}"#)));
    let err = client.classify(&request()).await.unwrap_err();
    assert!(matches!(err, Error::ResponseParse(_)));
}

#[actix_web::test]
async fn test_service_error() {
    let client = start_mock(mock(500, None));
    let err = client.classify(&request()).await.unwrap_err();
    match &err {
        Error::Service { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!err.to_string().contains("upstream exploded"));
}

#[actix_web::test]
async fn test_every_request_is_sent() {
    let mock = mock(200, Some(r#"{"helmet": true, "confidence": 60}"#));
    let client = start_mock(mock.clone());
    let request = request();

    client.classify(&request).await.unwrap();
    client.classify(&request).await.unwrap();
    assert_eq!(mock.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_service() {
    // Nothing listens on port 9 of localhost
    let client = OpenAiClient::new(&ModelSettings {
        endpoint: "http://127.0.0.1:9".into(),
        name: "gpt-4o-mini".into(),
        timeout_secs: Some(5),
        api_key: "sk-test".into(),
    })
    .unwrap();
    let err = client.classify(&request()).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));

    let classifier = Classifier::new(Arc::new(client), Preset::Generic);
    assert_eq!(
        classifier.error_message(&err),
        Preset::Generic.wording().network_error_message
    );
}
