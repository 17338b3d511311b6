// datachat-core/src/turn.rs

//! The chat-turn orchestrator: one decide-tools model call, tool
//! execution, one finalize call, one envelope.

use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::api::get_chat_completion;
use crate::config::RuntimeConfig;
use crate::envelope::{build_envelope, ResponseEnvelope};
use crate::errors::{ToolError, TurnError};
use crate::models::chat::ChatMessage;
use crate::models::domain::DomainData;
use crate::models::tools::ToolInput;
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "\
You are an AI assistant. Give short, clear answers to the user's questions.

When the user sends a simple greeting (e.g. 'hi', 'hello', 'merhaba'), reply \
with a polite greeting only, without extra information or feature introductions.

For questions about earthquakes, you must determine the location from the \
user's message:
1. If the user names a specific place (country, city, region), fetch data for \
that location.
2. If the user asks about global or worldwide activity, use the location \
\"Turkey\" but set the radius to 1000 km.
3. If the user names no place at all, use the location \"Turkey\" with the \
normal radius (300 km).

When you see phrases like global, world or worldwide, call get_earthquake \
with search_type=location, location=\"Turkey\" and radius=1000 by default.

When the user asks for them, you can provide weather, earthquake, exchange \
rate, cryptocurrency and stock market information.

Use get_coin for cryptocurrencies and get_stock for stocks.";

/// Shown when the model returns an empty message on the no-tool path.
const EMPTY_RESPONSE_TEXT: &str = "An unexpected error occurred.";

/// The terminal result of one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// No tools were invoked; the model's text is the whole reply.
    Direct(String),
    /// At least one tool produced data; the reply carries an envelope.
    WithData(ResponseEnvelope),
}

/// Runs tool-augmented chat turns against one model endpoint and one
/// set of upstream providers.
pub struct ChatPipeline {
    config: RuntimeConfig,
    client: Client,
    tools: ToolRegistry,
}

impl ChatPipeline {
    pub fn new(config: RuntimeConfig) -> Self {
        let client = Client::new();
        let tools = ToolRegistry::new(client.clone(), config.providers.clone());
        ChatPipeline {
            config,
            client,
            tools,
        }
    }

    /// Runs one turn over the caller-supplied history.
    ///
    /// Phase 1 offers all five tools; if the model calls any, each is
    /// executed in call order and the history is extended with the
    /// assistant's calls and their results before the tool-free phase
    /// 2 call that produces the summary. Any tool failure aborts the
    /// turn.
    pub async fn run_turn(&self, history: &[ChatMessage]) -> Result<TurnOutcome, TurnError> {
        if history.is_empty() {
            return Err(TurnError::EmptyHistory);
        }
        // Credentials are checked per turn, before any network call.
        if self.config.model.api_key.is_empty() {
            return Err(TurnError::config("Missing API configuration"));
        }

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(history.iter().cloned());

        let definitions = self.tools.definitions();
        let initial = get_chat_completion(&self.client, &self.config.model, messages.clone(), &definitions)
            .await
            .map_err(TurnError::Api)?;

        let choice = match initial.choices.into_iter().next() {
            Some(choice) => choice,
            None => return Ok(TurnOutcome::Direct(EMPTY_RESPONSE_TEXT.to_string())),
        };

        let tool_calls = match choice.message.tool_calls.clone() {
            Some(calls) if !calls.is_empty() => calls,
            _ => {
                let text = choice
                    .message
                    .content
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| EMPTY_RESPONSE_TEXT.to_string());
                debug!("No tools called, returning direct text");
                return Ok(TurnOutcome::Direct(text));
            }
        };

        info!(count = tool_calls.len(), "Model requested tool calls");

        let mut results: Vec<DomainData> = Vec::with_capacity(tool_calls.len());
        let mut extended = messages;
        extended.push(ChatMessage::assistant_tool_calls(tool_calls.clone()));

        for tool_call in &tool_calls {
            let arguments: HashMap<String, JsonValue> =
                serde_json::from_str(&tool_call.function.arguments).map_err(|e| {
                    ToolError::InvalidParameters(format!(
                        "Tool '{}' received malformed arguments: {}",
                        tool_call.function.name, e
                    ))
                })?;
            let input = ToolInput { arguments };
            let result = self.tools.execute(&tool_call.function.name, &input).await?;
            let result_json = serde_json::to_string(&result)
                .map_err(|e| TurnError::Api(anyhow::anyhow!("Failed to serialize tool result: {}", e)))?;
            extended.push(ChatMessage::tool_result(tool_call.id.clone(), result_json));
            results.push(result);
        }

        // Phase 2: tools disabled, plain summary over the extended
        // history.
        let final_response = get_chat_completion(&self.client, &self.config.model, extended, &[])
            .await
            .map_err(TurnError::Api)?;
        let summary = final_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(TurnOutcome::WithData(build_envelope(&results, &summary)))
    }
}
