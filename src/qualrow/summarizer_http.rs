// Summarization through a chat-completions endpoint.

use reqwest::blocking::Client;
use serde_json::json;

use crate::qualrow::*;

const SYSTEM_MESSAGE: &str =
    "Tu es un extracteur documentaire strict. Tu renvoies uniquement du JSON conforme au schéma demandé.";

pub struct ChatSummarizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl ChatSummarizer {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: String,
        temperature: f64,
    ) -> QualrowResult<ChatSummarizer> {
        let client = Client::builder().build().context(HttpClientSnafu {})?;
        Ok(ChatSummarizer {
            client,
            endpoint,
            model,
            api_key,
            temperature,
        })
    }

    fn request_body(&self, instruction: &str) -> JSValue {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_MESSAGE},
                {"role": "user", "content": instruction}
            ]
        })
    }
}

fn summarizer_error(message: String) -> SurveyError {
    SurveyError::Summarizer { message }
}

/// Reads the reply of the model as JSON. Falls back to the first `{...}`
/// block, then to the raw text.
pub fn coerce_json(text: &str) -> JSValue {
    if let Ok(js) = serde_json::from_str::<JSValue>(text) {
        return js;
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(js) = serde_json::from_str::<JSValue>(&text[start..=end]) {
                return js;
            }
        }
    }
    debug!("coerce_json: reply is not JSON, keeping the text");
    JSValue::String(text.to_string())
}

impl Summarizer for ChatSummarizer {
    fn summarize(&self, instruction: &str) -> Result<JSValue, SurveyError> {
        debug!("summarize: calling {} with model {}", self.endpoint, self.model);
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(instruction))
            .send()
            .map_err(|e| summarizer_error(format!("request failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(summarizer_error(format!(
                "server returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        let js: JSValue = resp
            .json()
            .map_err(|e| summarizer_error(format!("invalid response: {}", e)))?;
        match js["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(coerce_json(content)),
            None => Err(summarizer_error(format!("no message in response: {}", js))),
        }
    }
}
