use crate::config::EmbeddingConfig;
use crate::error::IngestError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Maps texts to vectors, one per input, in input order.
#[async_trait]
pub trait Embedder {
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Client for OpenAI-compatible `/embeddings` endpoints. Requests are sent one
/// batch at a time and never retried.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, IngestError> {
        let endpoint = Url::parse(&format!(
            "{}/embeddings",
            config.base_url.trim_end_matches('/')
        ))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn embed_batch(
        &self,
        api_key: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, IngestError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IngestError::EmbeddingService {
                status: status.as_u16(),
                details,
            });
        }

        let body = response.bytes().await?;
        let parsed: EmbeddingResponse = serde_json::from_slice(&body)
            .map_err(|error| IngestError::EmbeddingResponse(error.to_string()))?;
        order_embeddings(parsed, inputs.len())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            IngestError::MissingCredential(
                "OPENAI_API_KEY is not set; add it to the environment or .env".to_string(),
            )
        })?;

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch, inputs) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch, size = inputs.len(), model = %self.model, "requesting embeddings");
            vectors.extend(self.embed_batch(api_key, inputs).await?);
        }

        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Restores input order from the `index` field and checks that every input got exactly one vector.
fn order_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, IngestError> {
    if response.data.len() != expected {
        return Err(IngestError::EmbeddingResponse(format!(
            "received {} embeddings for {} inputs",
            response.data.len(),
            expected
        )));
    }

    response.data.sort_by_key(|entry| entry.index);
    for (position, entry) in response.data.iter().enumerate() {
        if entry.index != position {
            return Err(IngestError::EmbeddingResponse(format!(
                "embedding indices are not contiguous: expected {position}, found {}",
                entry.index
            )));
        }
    }

    Ok(response
        .data
        .into_iter()
        .map(|entry| entry.embedding)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn response(entries: Vec<(usize, Vec<f32>)>) -> EmbeddingResponse {
        EmbeddingResponse {
            data: entries
                .into_iter()
                .map(|(index, embedding)| EmbeddingData { embedding, index })
                .collect(),
        }
    }

    #[test]
    fn out_of_order_items_are_realigned_with_inputs() -> Result<(), IngestError> {
        let parsed = response(vec![(2, vec![2.0]), (0, vec![0.0]), (1, vec![1.0])]);
        let vectors = order_embeddings(parsed, 3)?;
        assert_eq!(vectors, vec![vec![0.0], vec![1.0], vec![2.0]]);
        Ok(())
    }

    #[test]
    fn short_response_is_rejected() {
        let parsed = response(vec![(0, vec![0.0])]);
        assert!(matches!(
            order_embeddings(parsed, 2),
            Err(IngestError::EmbeddingResponse(_))
        ));
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let parsed = response(vec![(0, vec![0.0]), (0, vec![1.0])]);
        assert!(matches!(
            order_embeddings(parsed, 2),
            Err(IngestError::EmbeddingResponse(_))
        ));
    }

    #[test]
    fn response_body_deserializes() -> Result<(), serde_json::Error> {
        let body = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.5, -0.25]}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 3, "total_tokens": 3}
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body)?;
        assert_eq!(parsed.data[0].embedding, vec![0.5, -0.25]);
        Ok(())
    }

    #[test]
    fn request_omits_unset_dimensions() -> Result<(), serde_json::Error> {
        let inputs = vec!["a".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &inputs,
            dimensions: None,
        };
        let value = serde_json::to_value(&request)?;
        assert_eq!(
            value,
            serde_json::json!({"model": "text-embedding-3-small", "input": ["a"]})
        );
        Ok(())
    }

    #[test]
    fn endpoint_is_derived_from_base_url() -> Result<(), IngestError> {
        let config = EmbeddingConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config)?;
        assert_eq!(embedder.endpoint().as_str(), "http://localhost:8080/v1/embeddings");
        Ok(())
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() -> Result<(), IngestError> {
        let config = EmbeddingConfig {
            api_key: Some("   ".to_string()),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config)?;

        let result = embedder.embed_documents(&["text".to_string()]).await;
        assert!(matches!(result, Err(IngestError::MissingCredential(_))));
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_needs_no_credential() -> Result<(), IngestError> {
        let embedder = OpenAiEmbedder::new(&EmbeddingConfig::default())?;
        assert!(embedder.embed_documents(&[]).await?.is_empty());
        Ok(())
    }

    /// One-request-per-connection HTTP stub that answers with canned
    /// `(status, body)` pairs in order and records each request's JSON body.
    /// Once the canned replies run out the listener is dropped, so any
    /// further request fails to connect.
    async fn stub_service(
        replies: Vec<(u16, String)>,
    ) -> Result<(String, Arc<Mutex<Vec<serde_json::Value>>>), std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}/v1", listener.local_addr()?);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();

        tokio::spawn(async move {
            for (status, body) in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let Ok(request_body) = read_request_body(&mut socket).await else {
                    return;
                };
                if let Ok(value) = serde_json::from_slice(&request_body) {
                    if let Ok(mut seen) = recorded.lock() {
                        seen.push(value);
                    }
                }

                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok((base_url, seen))
    }

    async fn read_request_body(socket: &mut TcpStream) -> Result<Vec<u8>, std::io::Error> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await?;
            if read == 0 {
                return Ok(Vec::new());
            }
            buffer.extend_from_slice(&chunk[..read]);

            let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = header_end + 4;
            if buffer.len() >= body_start + length {
                return Ok(buffer[body_start..body_start + length].to_vec());
            }
        }
    }

    fn embedder_for(base_url: String, batch_size: usize) -> Result<OpenAiEmbedder, IngestError> {
        OpenAiEmbedder::new(&EmbeddingConfig {
            base_url,
            api_key: Some("sk-test".to_string()),
            batch_size,
            ..EmbeddingConfig::default()
        })
    }

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn batches_are_split_and_rejoined_in_input_order() -> Result<(), Box<dyn std::error::Error>> {
        let (base_url, seen) = stub_service(vec![
            (
                200,
                r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#
                    .to_string(),
            ),
            (200, r#"{"data":[{"index":0,"embedding":[3.0]}]}"#.to_string()),
        ])
        .await?;
        let embedder = embedder_for(base_url, 2)?;

        let vectors = embedder.embed_documents(&texts(&["a", "b", "c"])).await?;

        assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
        let requests = seen.lock().map_err(|_| "request log poisoned")?.clone();
        let inputs: Vec<_> = requests.iter().map(|request| request["input"].clone()).collect();
        assert_eq!(
            inputs,
            vec![serde_json::json!(["a", "b"]), serde_json::json!(["c"])]
        );
        assert_eq!(requests[0]["model"], "text-embedding-3-small");
        Ok(())
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() -> Result<(), Box<dyn std::error::Error>> {
        let (base_url, _) = stub_service(vec![(
            429,
            r#"{"error":{"message":"quota exceeded"}}"#.to_string(),
        )])
        .await?;
        let embedder = embedder_for(base_url, 2)?;

        let result = embedder.embed_documents(&texts(&["a"])).await;

        match result {
            Err(IngestError::EmbeddingService { status, details }) => {
                assert_eq!(status, 429);
                assert!(details.contains("quota exceeded"));
            }
            other => panic!("expected a service error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn failing_second_batch_aborts_without_retry() -> Result<(), Box<dyn std::error::Error>> {
        let (base_url, seen) = stub_service(vec![
            (
                200,
                r#"{"data":[{"index":0,"embedding":[1.0]},{"index":1,"embedding":[2.0]}]}"#
                    .to_string(),
            ),
            (500, "upstream unavailable".to_string()),
            (200, r#"{"data":[{"index":0,"embedding":[3.0]}]}"#.to_string()),
        ])
        .await?;
        let embedder = embedder_for(base_url, 2)?;

        let result = embedder.embed_documents(&texts(&["a", "b", "c"])).await;

        assert!(matches!(
            result,
            Err(IngestError::EmbeddingService { status: 500, .. })
        ));
        assert_eq!(seen.lock().map_err(|_| "request log poisoned")?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_response_error() -> Result<(), Box<dyn std::error::Error>> {
        let (base_url, _) = stub_service(vec![(200, r#"{"data":"nope"}"#.to_string())]).await?;
        let embedder = embedder_for(base_url, 2)?;

        let result = embedder.embed_documents(&texts(&["a"])).await;

        assert!(matches!(result, Err(IngestError::EmbeddingResponse(_))));
        Ok(())
    }
}
