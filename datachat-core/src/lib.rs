// datachat-core/src/lib.rs

//! Core library for datachat: a tool-augmented chat pipeline that
//! answers data questions (weather, earthquakes, exchange rates,
//! cryptocurrencies, stocks) by letting a chat model call typed data
//! tools and then summarizing the results into a structured response
//! envelope.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod models;
pub mod store;
pub mod tools;
pub mod turn;


pub use config::{AppConfig, ModelConfig, RuntimeConfig};
pub use dispatch::{parse_message_content, MessageView};
pub use envelope::{build_envelope, RenderMode, ResponseEnvelope};
pub use errors::{ToolError, TurnError};
pub use models::chat::{ApiResponse, ChatMessage, Choice};
pub use models::domain::{DataKind, DomainData};
pub use models::tools::{
    ToolCall, ToolDefinition, ToolFunction, ToolInput, ToolParameter, ToolParameterType,
    ToolParametersDefinition,
};
pub use store::{ChatStore, RestBackend, Session, StorageBackend, StoredMessage};
pub use tools::ToolRegistry;
pub use turn::{ChatPipeline, TurnOutcome};

pub use async_trait::async_trait;
