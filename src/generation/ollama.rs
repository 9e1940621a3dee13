//! Blocking client for an Ollama server's `/api/generate` endpoint.
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{GenerationError, GenerationRequest, Generator};
use crate::config::GenerationConfig;

pub struct OllamaClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
        });
        if request.json_format {
            body["format"] = json!("json");
        }
        if let Some(t) = self.temperature {
            let mut options = Map::new();
            options.insert("temperature".to_string(), json!(t));
            body["options"] = Value::Object(options);
        }
        body
    }
}

impl Generator for OllamaClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        info!(
            "Generating with {} ({} prompt chars)",
            self.model,
            request.prompt.len()
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(request))
            .send()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Generation response: {} bytes", body.len());
        parse_generate_body(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Read the generated text out of a response body.
///
/// A JSON object must carry a string `response` field. A body that is not
/// JSON at all is taken as plain text.
pub fn parse_generate_body(body: &str) -> Result<String, GenerationError> {
    if body.trim().is_empty() {
        return Err(GenerationError::Malformed("empty response body".into()));
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("response") {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(_) => Err(GenerationError::Malformed(
                "`response` field is not a string".into(),
            )),
            None => Err(GenerationError::Malformed(
                "missing `response` field".into(),
            )),
        },
        Ok(_) => Err(GenerationError::Malformed(
            "expected a JSON object".into(),
        )),
        Err(_) => Ok(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(temperature: Option<f32>) -> OllamaClient {
        let config = GenerationConfig {
            base_url: "http://localhost:11434/".to_string(),
            temperature,
            ..GenerationConfig::default()
        };
        OllamaClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_body() {
        let c = client(None);
        assert_eq!(c.endpoint, "http://localhost:11434/api/generate");

        let body = c.request_body(&GenerationRequest::new("hi", true));
        assert_eq!(body["model"], "qwen2.5:latest");
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert!(body.get("options").is_none());

        let plain = c.request_body(&GenerationRequest::new("hi", false));
        assert!(plain.get("format").is_none());
    }

    #[test]
    fn test_temperature_in_options() {
        let body = client(Some(0.5)).request_body(&GenerationRequest::new("hi", false));
        assert_eq!(body["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_parse_generate_body() {
        assert_eq!(
            parse_generate_body(r#"{"model":"m","response":"Dhaka","done":true}"#).unwrap(),
            "Dhaka"
        );
        assert_eq!(parse_generate_body("plain answer").unwrap(), "plain answer");
    }

    #[test]
    fn test_parse_generate_body_malformed() {
        for body in ["", "   ", r#"{"done":true}"#, r#"{"response":42}"#, "[1,2]"] {
            assert!(
                matches!(parse_generate_body(body), Err(GenerationError::Malformed(_))),
                "body {body:?}"
            );
        }
    }

    #[test]
    fn test_unreachable_server() {
        let config = GenerationConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let c = OllamaClient::new(&config).unwrap();
        assert!(matches!(
            c.generate(&GenerationRequest::new("hi", true)),
            Err(GenerationError::Request(_))
        ));
    }
}
