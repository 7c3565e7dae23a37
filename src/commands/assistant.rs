use serde::{Deserialize, Serialize};

use crate::commands::logbook::LogbookState;
use crate::error::{PlaygroundError, Result};
use crate::templates;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-3.5-turbo";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub source_code: String,
    /// One of "explain", "findBugs", "refactor"; anything else sends an
    /// empty, effectively no-op prompt.
    pub action: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub response: String,
}

fn extract_content(data: &serde_json::Value) -> Option<&str> {
    data["choices"][0]["message"]["content"].as_str()
}

/// Single synchronous pass-through to the chat-completions API: fixed
/// prompt per action, no retry, no rate limiting, no caching. The
/// credential stays in the app process environment and never reaches the
/// frontend.
#[tauri::command]
pub async fn ask_assistant(
    request: AssistantRequest,
    logbook: tauri::State<'_, LogbookState>,
) -> Result<AssistantReply> {
    if request.source_code.trim().is_empty() {
        return Err(PlaygroundError::Validation(
            "Enter some code in the editor to analyze.".into(),
        ));
    }

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| PlaygroundError::Custom("OpenAI API key is not configured.".into()))?;

    logbook
        .log("assistant", &format!("request: {}", request.action))
        .await;

    let body = serde_json::json!({
        "model": MODEL,
        "messages": [
            { "role": "system", "content": templates::ASSISTANT_SYSTEM_PROMPT },
            { "role": "user", "content": templates::assistant_prompt(&request.action, &request.source_code) },
        ],
        "temperature": 0.5,
    });

    let client = reqwest::Client::new();
    let response = client
        .post(CHAT_COMPLETIONS_URL)
        .bearer_auth(&api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let detail: serde_json::Value = response.json().await.unwrap_or_default();
        let message = detail["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Assistant request failed with status {status}"));
        logbook
            .log("assistant", &format!("upstream error: {message}"))
            .await;
        return Err(PlaygroundError::Custom(message));
    }

    let data: serde_json::Value = response.json().await?;
    let content = extract_content(&data).ok_or_else(|| {
        PlaygroundError::Custom("Malformed response from the assistant API.".into())
    })?;

    Ok(AssistantReply {
        response: content.to_string(),
    })
}
