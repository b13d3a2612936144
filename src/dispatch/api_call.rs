//! Execution of `api_call` flow steps against configured API integrations

use serde_json::Value;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::integrations::{self, ApiIntegration, AuthType};
use crate::storage::{get_connection, DbPool};

/// Perform the HTTP call described by a step's `api_call` config and render
/// the response as reply text.
///
/// The config references an integration (`integration_id` or
/// `integration_name`) and carries `method`, `path`, `query`, and `body`.
/// Any transport error or non-2xx status is an `Upstream` error; callers
/// translate that into the generic "API call failed." reply instead of
/// propagating.
pub async fn execute(
    http: &reqwest::Client,
    pool: &DbPool,
    project_id: &str,
    step_config: &Value,
) -> AppResult<String> {
    let key = step_config
        .get("integration_id")
        .or_else(|| step_config.get("integration_name"))
        .or_else(|| step_config.get("integration"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::NotFound("api_call step without an integration reference".into()))?;

    // The connection goes back to the pool before any network I/O starts
    let integration = {
        let conn = get_connection(pool)?;
        integrations::find(&conn, project_id, key)?
            .ok_or_else(|| AppError::NotFound(format!("api integration {key}")))?
    };

    let method = step_config
        .get("method")
        .and_then(Value::as_str)
        .and_then(|m| reqwest::Method::from_bytes(m.to_uppercase().as_bytes()).ok())
        .unwrap_or(reqwest::Method::GET);

    let mut url = integration.endpoint_base_url.trim_end_matches('/').to_string();
    if let Some(path) = step_config.get("path").and_then(Value::as_str) {
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
    }

    let mut request = http
        .request(method, &url)
        .timeout(config::network::api_call_timeout());

    if let Some(query) = step_config.get("query").and_then(Value::as_object) {
        let pairs: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect();
        request = request.query(&pairs);
    }
    if let Some(body) = step_config.get("body") {
        if !body.is_null() {
            request = request.json(body);
        }
    }
    request = apply_auth(request, &integration);

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!("{} returned status {}", integration.name, status)));
    }

    let data: Value = response.json().await?;
    Ok(render_response(&data, &integration))
}

fn apply_auth(request: reqwest::RequestBuilder, integration: &ApiIntegration) -> reqwest::RequestBuilder {
    let creds = &integration.credentials;
    match integration.auth_type {
        AuthType::None => request,
        AuthType::ApiKey => {
            let header = creds
                .get("header_name")
                .and_then(Value::as_str)
                .unwrap_or("X-API-Key")
                .to_string();
            let key = creds.get("api_key").and_then(Value::as_str).unwrap_or_default();
            request.header(header.as_str(), key)
        }
        AuthType::Bearer => {
            let token = creds.get("token").and_then(Value::as_str).unwrap_or_default();
            request.bearer_auth(token)
        }
        AuthType::Basic => {
            let username = creds.get("username").and_then(Value::as_str).unwrap_or_default();
            let password = creds.get("password").and_then(Value::as_str);
            request.basic_auth(username, password)
        }
    }
}

/// Apply the integration's flat key -> dotted-path mapping and render the
/// result as reply text. Without a mapping the raw JSON is relayed.
fn render_response(data: &Value, integration: &ApiIntegration) -> String {
    match &integration.response_mapping {
        Some(mapping) if !mapping.is_empty() => {
            let mut lines = Vec::with_capacity(mapping.len());
            for (key, path) in mapping {
                let resolved = path
                    .as_str()
                    .and_then(|p| lookup_path(data, p))
                    .map(stringify)
                    .unwrap_or_else(|| "-".to_string());
                lines.push(format!("{key}: {resolved}"));
            }
            lines.join("\n")
        }
        _ => stringify(data),
    }
}

/// Walk a dotted path ("data.temperature", "items.0.name") through nested
/// values. Numeric segments index into arrays.
fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Strings render bare, everything else as compact JSON
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
