use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const PROVIDERS: [&str; 4] = ["gemini", "openai", "lmstudio", "ollama"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.url", "url")?;
        validate_optional_string_field(database, "database.schema", "schema")?;
        validate_u64_field(
            database,
            "database.max_connections",
            "max_connections",
            1,
            1_000,
        )?;
        validate_u64_field(
            database,
            "database.acquire_timeout_secs",
            "acquire_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_provider_field(llm, "llm.provider")?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_bool_field(embedding, "embedding.enabled", "enabled")?;
        validate_provider_field(embedding, "embedding.provider")?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.top_k", "top_k", 1, 500)?;
        validate_u64_field(rag, "rag.row_limit", "row_limit", 1, 10_000)?;
        validate_u64_field(
            rag,
            "rag.context_char_budget",
            "context_char_budget",
            100,
            1_000_000,
        )?;
        validate_u64_field(rag, "rag.embed_batch_size", "embed_batch_size", 1, 1_000)?;
        validate_u64_field(rag, "rag.retries", "retries", 0, 20)?;
        validate_u64_field(rag, "rag.base_delay_ms", "base_delay_ms", 0, 60_000)?;
        validate_u64_field(rag, "rag.max_jitter_ms", "max_jitter_ms", 0, 60_000)?;
        validate_string_array_field(rag, "rag.extra_vocabulary", "extra_vocabulary")?;
        validate_bool_field(rag, "rag.warm_up_on_start", "warm_up_on_start")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_provider_field(section: &Map<String, Value>, path: &str) -> Result<(), ApiError> {
    let Some(value) = section.get("provider") else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !PROVIDERS.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            PROVIDERS.join(", ")
        )));
    }
    Ok(())
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "server": { "host": "0.0.0.0", "port": 3001 },
            "database": { "url": "postgres://localhost/db", "max_connections": 4 },
            "llm": { "provider": "gemini", "model": "gemini-2.5-flash" },
            "embedding": { "enabled": false, "provider": "ollama" },
            "rag": { "top_k": 12, "retries": 3, "extra_vocabulary": ["boleto"] }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = validate_config(&json!({ "llm": { "provider": "mystery" } })).unwrap_err();
        assert!(err.to_string().contains("llm.provider"));
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let err = validate_config(&json!({ "rag": { "top_k": 0 } })).unwrap_err();
        assert!(err.to_string().contains("rag.top_k"));

        let err = validate_config(&json!({ "server": { "port": 70000 } })).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn rejects_wrong_section_types() {
        assert!(validate_config(&json!({ "rag": [] })).is_err());
        assert!(validate_config(&json!({ "rag": { "extra_vocabulary": [""] } })).is_err());
        assert!(validate_config(&json!({ "embedding": { "enabled": "yes" } })).is_err());
    }
}
