use std::sync::Arc;

use fieldops_application::{ControlAction, StepCompletionRequest, TaskStepGateway};
use fieldops_core::AppError;
use fieldops_domain::{FieldValues, StepId, TaskId};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::HttpTaskStepGateway;

#[derive(Debug, Clone)]
struct RecordedRequest {
    head: String,
    body: String,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_owned())
        })
    }
}

/// Serves one canned response per connection, in order.
async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<RecordedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|_| unreachable!());
    let address = listener.local_addr().unwrap_or_else(|_| unreachable!());
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buffer = Vec::new();
            let mut chunk = [0_u8; 1024];
            let request = loop {
                let Ok(read) = stream.read(&mut chunk).await else {
                    return;
                };
                if read == 0 {
                    return;
                }
                buffer.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&buffer).to_string();
                let Some((head, body)) = text.split_once("\r\n\r\n") else {
                    continue;
                };
                let recorded = RecordedRequest {
                    head: head.to_owned(),
                    body: body.to_owned(),
                };
                let expected = recorded
                    .header("content-length")
                    .and_then(|length| length.parse::<usize>().ok())
                    .unwrap_or(0);
                if recorded.body.len() >= expected {
                    break recorded;
                }
            };
            sink.lock().await.push(request);

            let response = format!(
                "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{address}/"), recorded)
}

fn completion_request() -> StepCompletionRequest {
    let mut field_values = FieldValues::new();
    field_values.insert("selected_option".to_owned(), json!("answered"));

    StepCompletionRequest {
        task_id: TaskId::new(12),
        step_id: StepId::new(34),
        field_values,
        control_action: ControlAction::Advance,
        idempotency_key: "2b0f2c1e-5a8e-4a53-9a52-7c1bd1d6f0aa".to_owned(),
    }
}

#[tokio::test]
async fn completion_retries_transient_failures_with_a_stable_key() {
    let (base_url, recorded) = serve(vec![
        (503, "{}".to_owned()),
        (200, "{}".to_owned()),
    ])
    .await;
    let gateway = HttpTaskStepGateway::new(reqwest::Client::new(), base_url, 3, 50)
        .with_api_token("secret-token");

    let result = gateway.complete_step(&completion_request()).await;
    assert!(result.is_ok());

    let recorded = recorded.lock().await.clone();
    assert_eq!(recorded.len(), 2);
    assert!(
        recorded[0]
            .head
            .starts_with("POST /api/tasks/12/steps/34/complete ")
    );
    assert_eq!(
        recorded[0].header("idempotency-key"),
        recorded[1].header("idempotency-key")
    );
    assert_eq!(
        recorded[1].header("authorization").as_deref(),
        Some("Bearer secret-token")
    );
    let body = serde_json::from_str::<Value>(&recorded[1].body).unwrap_or_default();
    assert_eq!(body, json!({ "field_values": { "selected_option": "answered" } }));
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let (base_url, recorded) = serve(vec![
        (409, r#"{"error":"step already completed"}"#.to_owned()),
        (200, "{}".to_owned()),
    ])
    .await;
    let gateway = HttpTaskStepGateway::new(reqwest::Client::new(), base_url, 3, 50);

    let result = gateway.complete_step(&completion_request()).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(recorded.lock().await.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_as_upstream_error() {
    let (base_url, recorded) = serve(vec![
        (500, "{}".to_owned()),
        (429, "{}".to_owned()),
    ])
    .await;
    let gateway = HttpTaskStepGateway::new(reqwest::Client::new(), base_url, 2, 50);

    let result = gateway.complete_step(&completion_request()).await;

    assert!(matches!(&result, Err(error) if error.is_retryable()));
    assert_eq!(recorded.lock().await.len(), 2);
}

#[tokio::test]
async fn load_task_reads_the_step_list() {
    let task = json!({
        "id": 12,
        "template_id": 4,
        "completion_percentage": 0,
        "steps": [
            {"id": 34, "name": "Call Homeowner", "status": "pending", "step_order": 1},
            {"id": 35, "name": "Inspect panel", "status": "pending", "step_order": 2}
        ]
    });
    let (base_url, recorded) = serve(vec![(200, task.to_string())]).await;
    let gateway = HttpTaskStepGateway::new(reqwest::Client::new(), base_url, 1, 50);

    let loaded = gateway.load_task(TaskId::new(12)).await;
    assert!(loaded.is_ok());
    let loaded = loaded.unwrap_or_else(|_| unreachable!());

    assert_eq!(loaded.steps().len(), 2);
    assert!(
        recorded.lock().await[0]
            .head
            .starts_with("GET /api/tasks/12 ")
    );
}
