//! Ollama discovery helpers.
//!
//! Pings the configured Ollama server and lists the locally downloaded
//! models from its `/api/tags` endpoint.

use serde::Deserialize;

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

/// Ping the Ollama server and return the list of available models.
///
/// Returns `Err(reason)` when the server is offline or answers with
/// something other than a tag list.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = reqwest::blocking::get(&url)
        .map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;

    Ok(tags.models)
}

/// Whether `name` is among `models`. A bare name matches its `:latest` tag.
pub fn has_model(models: &[OllamaModel], name: &str) -> bool {
    models
        .iter()
        .any(|m| m.name == name || m.name.strip_suffix(":latest") == Some(name))
}
