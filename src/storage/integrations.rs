use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Result};
use strum::EnumString;

/// Authentication scheme of an external API integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthType {
    None,
    ApiKey,
    Bearer,
    Basic,
}

/// A configured external HTTP API, referenced by `api_call` flow steps.
/// Read-only to the runtime.
#[derive(Debug, Clone)]
pub struct ApiIntegration {
    pub id: String,
    pub name: String,
    pub endpoint_base_url: String,
    pub auth_type: AuthType,
    /// Scheme-specific secrets: api_key/header_name, token, or username/password
    pub credentials: serde_json::Value,
    /// Optional flat key -> dotted-path response mapping
    pub response_mapping: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Resolve an integration by id or, failing that, by name
pub fn find(conn: &Connection, project_id: &str, key: &str) -> Result<Option<ApiIntegration>> {
    conn.query_row(
        "SELECT id, name, endpoint_base_url, auth_type, credentials, mapping_config
         FROM api_integrations
         WHERE project_id = ?1 AND is_active = 1 AND (id = ?2 OR name = ?2)
         ORDER BY CASE WHEN id = ?2 THEN 0 ELSE 1 END
         LIMIT 1",
        params![project_id, key],
        |row| {
            let auth_raw: String = row.get(3)?;
            let credentials_raw: Option<String> = row.get(4)?;
            let mapping_raw: Option<String> = row.get(5)?;

            let mapping = mapping_raw
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
                .and_then(|config| {
                    // The dashboard nests the map under "response_mapping";
                    // accept a bare object too.
                    let value = config.get("response_mapping").cloned().unwrap_or(config);
                    value.as_object().cloned()
                });

            Ok(ApiIntegration {
                id: row.get(0)?,
                name: row.get(1)?,
                endpoint_base_url: row.get(2)?,
                auth_type: AuthType::from_str(&auth_raw).unwrap_or(AuthType::None),
                credentials: credentials_raw
                    .and_then(|raw| serde_json::from_str(&raw).ok())
                    .unwrap_or(serde_json::Value::Null),
                response_mapping: mapping,
            })
        },
    )
    .optional()
}
