use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

pub type LlmError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Streams completion chunks into `tx` as they arrive. The channel is
    /// closed when the upstream stream ends.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        tx: mpsc::Sender<String>,
    ) -> Result<(), LlmError>;
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    fn request_body(&self, messages: &[ChatMessage], max_tokens: u32) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": true,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        tx: mpsc::Sender<String>,
    ) -> Result<(), LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(messages, max_tokens))
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut pending = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // Upstream frames are newline-delimited `data: {...}` lines; a
            // chunk boundary can split a line, so only consume full lines.
            while let Some(pos) = pending.find('\n') {
                let line = pending[..pos].trim().to_string();
                pending.drain(..=pos);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(());
                }
                if let Ok(value) = serde_json::from_str::<Value>(data) {
                    if let Some(content) = value["choices"][0]["delta"]["content"].as_str() {
                        if tx.send(content.to_string()).await.is_err() {
                            // Receiver dropped; nothing left to stream to.
                            return Ok(());
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
        assert_eq!(ChatMessage::assistant("c").role, "assistant");
    }

    #[test]
    fn request_body_carries_model_and_stream_flag() {
        let client = OpenAiClient::new(
            "key".into(),
            "http://localhost:8081/v1".into(),
            "gpt-4o-mini".into(),
        );
        let body = client.request_body(&[ChatMessage::user("hi")], 500);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["content"], "hi");
    }
}
