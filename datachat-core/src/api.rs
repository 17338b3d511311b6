// datachat-core/src/api.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, to_value, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::models::chat::ApiResponse;
use crate::models::chat::ChatMessage;
use crate::models::tools::ToolDefinition;

/// Sends one chat-completion request and returns the parsed response.
///
/// A turn makes at most two of these calls and a failed call fails the
/// turn, so there is deliberately no retry here: the client sees the
/// error immediately instead of waiting out a backoff schedule.
pub async fn get_chat_completion(
    client: &Client,
    model_config: &ModelConfig,
    messages: Vec<ChatMessage>,
    tool_definitions: &[ToolDefinition],
) -> Result<ApiResponse> {
    let url_str = &model_config.endpoint;

    let request_body = build_openai_request(
        &model_config.model_name,
        messages,
        model_config,
        tool_definitions,
    )?;

    debug!(
        "Request URL: {}\nRequest JSON: {}",
        url_str,
        serde_json::to_string_pretty(&request_body)?
    );

    let response = client
        .post(url_str)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", model_config.api_key))
        .json(&request_body)
        .send()
        .await
        .context("Network error sending chat completion request")?;

    let status = response.status();

    if !status.is_success() {
        let headers = response.headers().clone();
        let error_text = response
            .text()
            .await
            .context("Failed to read API error response body")?;
        debug!(
            "API request failed. Status: {}, Headers: {:#?}, Body: {}",
            status, headers, error_text
        );
        return Err(anyhow!("API error: {} - {}", status, error_text));
    }

    let response_value: Value = response
        .json()
        .await
        .context("Failed to read API response body as JSON")?;

    let mut response_json_obj = if let Value::Object(map) = response_value.clone() {
        map
    } else {
        return Err(anyhow!(
            "API response was not a JSON object: {:?}",
            response_value
        ));
    };

    // Some OpenAI-compatible backends omit the 'id' field.
    if !response_json_obj.contains_key("id") {
        let new_id = format!("chatcmpl-{}", Uuid::new_v4());
        debug!(
            "Added missing 'id' field to API response with value: {}",
            new_id
        );
        response_json_obj.insert("id".to_string(), json!(new_id));
    }

    let api_response_result: Result<ApiResponse, serde_json::Error> =
        serde_json::from_value(Value::Object(response_json_obj.clone()));

    let api_response = match api_response_result {
        Ok(resp) => resp,
        Err(e) => {
            debug!(
                "ERROR: failed to deserialize API response {:#?}",
                response_value.clone()
            );
            return Err(anyhow!("Failed to deserialize API response").context(e));
        }
    };

    if let Some(choice) = api_response.choices.first() {
        if let Some(tool_calls) = &choice.message.tool_calls {
            debug!("Tool calls: {:#?}", tool_calls);
        } else {
            debug!("No tool calls");
        }
    } else {
        debug!("Response has empty 'choices' array");
    }

    Ok(api_response)
}

fn build_openai_request(
    model_name: &str,
    messages: Vec<ChatMessage>,
    model_config: &ModelConfig,
    tool_definitions: &[ToolDefinition],
) -> Result<Value> {
    let mut request_map = serde_json::Map::new();
    request_map.insert("model".to_string(), json!(model_name));
    request_map.insert("messages".to_string(), to_value(messages)?);

    let tools_json: Vec<Value> = tool_definitions
        .iter()
        .map(|tool_def| {
            json!({
                "type": "function",
                "function": tool_def
            })
        })
        .collect();

    if !tools_json.is_empty() {
        request_map.insert("tools".to_string(), Value::Array(tools_json));
    }

    if let Some(parameters) = model_config.parameters.as_ref().and_then(|p| p.as_table()) {
        for (key, value) in parameters {
            let json_value = to_value(value.clone())
                .with_context(|| format!("Failed to convert TOML parameter '{}' to JSON", key))?;
            request_map.insert(key.clone(), json_value);
        }
    }
    Ok(Value::Object(request_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tools::{
        ToolParameter, ToolParameterType, ToolParametersDefinition,
    };
    use serde_json::json;
    use std::collections::HashMap;

    use httpmock::prelude::*;

    fn create_mock_tool_definitions() -> Vec<ToolDefinition> {
        let mut properties = HashMap::new();
        properties.insert(
            "arg1".to_string(),
            ToolParameter {
                param_type: ToolParameterType::String,
                description: "Arg 1".to_string(),
                enum_values: None,
            },
        );
        vec![ToolDefinition {
            name: "mock_tool".to_string(),
            description: "A mock tool".to_string(),
            parameters: ToolParametersDefinition {
                param_type: "object".to_string(),
                properties,
                required: vec!["arg1".to_string()],
            },
        }]
    }

    fn create_test_model_config(endpoint: &str, params: Option<toml::value::Table>) -> ModelConfig {
        ModelConfig {
            model_name: "test-model-name".to_string(),
            endpoint: endpoint.to_string(),
            api_key: "test-api-key".to_string(),
            parameters: params.map(toml::Value::Table),
        }
    }

    #[test]
    fn test_build_openai_request_basic() {
        let messages = vec![ChatMessage::user("Hello")];
        let model_config = create_test_model_config("http://fake.endpoint/v1", None);
        let tool_definitions = create_mock_tool_definitions();
        let result = build_openai_request(
            "gpt-basic",
            messages.clone(),
            &model_config,
            &tool_definitions,
        );
        assert!(result.is_ok());
        let value = result.unwrap();
        assert_eq!(value["messages"], json!(messages));
        assert!(value.get("tools").is_some());
    }

    #[test]
    fn test_build_openai_request_no_tools() {
        let messages = vec![ChatMessage::user("Hi")];
        let model_config = create_test_model_config("http://fake.endpoint/v1", None);
        let result = build_openai_request("gpt-no-tools", messages.clone(), &model_config, &[]);
        assert!(result.is_ok());
        let value = result.unwrap();
        assert_eq!(value["messages"], json!(messages));
        // No tools registered means no 'tools' key at all.
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_build_openai_request_with_parameters() {
        let messages = vec![ChatMessage::user("Test")];
        let mut params = toml::value::Table::new();
        params.insert("temperature".to_string(), toml::Value::Float(0.9));
        let model_config = create_test_model_config("http://fake.endpoint/v1", Some(params));
        let result = build_openai_request("gpt-params", messages.clone(), &model_config, &[]);
        assert!(result.is_ok());
        let value = result.unwrap();
        assert_eq!(value["temperature"], json!(0.9));
    }

    #[tokio::test]
    async fn test_get_chat_completion_success() {
        let server = MockServer::start_async().await;
        let endpoint_path = "/v1/chat/completions";
        let full_endpoint_url = format!("{}{}", server.base_url(), endpoint_path);
        let messages = vec![ChatMessage::user("Ping")];
        let model_config = create_test_model_config(&full_endpoint_url, None);
        let tool_definitions = create_mock_tool_definitions();

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(endpoint_path).json_body(
                    build_openai_request(
                        &model_config.model_name,
                        messages.clone(),
                        &model_config,
                        &tool_definitions,
                    )
                    .unwrap(),
                );
                then.status(200).json_body(json!({
                    "id": "chatcmpl-123", "choices": [{"index": 0, "message": {"role": "assistant", "content": "Pong"}, "finish_reason": "stop"}]
                }));
            })
            .await;

        let client = Client::new();
        let result =
            get_chat_completion(&client, &model_config, messages, &tool_definitions).await;
        mock.assert_async().await;
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap().id, "chatcmpl-123");
    }

    #[tokio::test]
    async fn test_get_chat_completion_patches_missing_id() {
        let server = MockServer::start_async().await;
        let endpoint_path = "/v1/chat/completions";
        let model_config =
            create_test_model_config(&format!("{}{}", server.base_url(), endpoint_path), None);

        server
            .mock_async(|when, then| {
                when.method(POST).path(endpoint_path);
                then.status(200).json_body(json!({
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}, "finish_reason": "stop"}]
                }));
            })
            .await;

        let client = Client::new();
        let result =
            get_chat_completion(&client, &model_config, vec![ChatMessage::user("Hi")], &[]).await;
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert!(result.unwrap().id.starts_with("chatcmpl-"));
    }

    #[tokio::test]
    async fn test_get_chat_completion_server_error_no_retry() {
        let server = MockServer::start_async().await;
        let endpoint_path = "/v1/chat/completions";
        let model_config =
            create_test_model_config(&format!("{}{}", server.base_url(), endpoint_path), None);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(endpoint_path);
                then.status(500).body("Server error");
            })
            .await;

        let client = Client::new();
        let result =
            get_chat_completion(&client, &model_config, vec![ChatMessage::user("Hi")], &[]).await;
        // Exactly one attempt: failures surface to the turn immediately.
        assert_eq!(mock.hits_async().await, 1);
        assert!(result.is_err(), "Expected Err, got Ok");
        assert!(result.err().unwrap().to_string().contains("API error: 500"));
    }
}
