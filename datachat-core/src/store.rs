// datachat-core/src/store.rs

//! Session and message persistence behind a PostgREST-style backend,
//! with an in-memory view kept consistent by issuing the persistence
//! call first.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::StorageConfig;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_name: Option<String>,
}

/// Row-oriented persistence for sessions, messages and attachment
/// URLs.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Sessions ordered by created_at descending.
    async fn list_sessions(&self) -> Result<Vec<Session>>;
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    async fn rename_session(&self, session_id: &str, title: &str) -> Result<()>;

    /// Messages of one session ordered by created_at ascending.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;
    async fn insert_message(&self, message: &StoredMessage) -> Result<()>;
    async fn update_message_content(&self, message_id: &str, content: &str) -> Result<()>;
    async fn update_response_time(&self, message_id: &str, response_time: f64) -> Result<()>;

    /// A time-limited signed URL for an uploaded attachment.
    async fn signed_attachment_url(&self, file_id: &str, expires_in_secs: u64) -> Result<String>;
}

/// PostgREST/Supabase-flavored HTTP backend.
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl RestBackend {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        RestBackend {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn expect_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("storage error while {}: {} - {}", what, status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl StorageBackend for RestBackend {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let response = self
            .request(
                reqwest::Method::GET,
                "/rest/v1/sessions?select=*&order=created_at.desc",
            )
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "listing sessions")
            .await?
            .json()
            .await
            .context("Failed to decode session rows")
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/sessions")
            .header("Prefer", "return=minimal")
            .json(session)
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "inserting a session").await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/rest/v1/sessions?id=eq.{}", session_id),
            )
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "deleting a session").await?;
        Ok(())
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/rest/v1/sessions?id=eq.{}", session_id),
            )
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "renaming a session").await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/rest/v1/messages?select=*&session_id=eq.{}&order=created_at.asc",
                    session_id
                ),
            )
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "listing messages")
            .await?
            .json()
            .await
            .context("Failed to decode message rows")
    }

    async fn insert_message(&self, message: &StoredMessage) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/messages")
            .header("Prefer", "return=minimal")
            .json(message)
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "inserting a message").await?;
        Ok(())
    }

    async fn update_message_content(&self, message_id: &str, content: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/rest/v1/messages?id=eq.{}", message_id),
            )
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "updating message content").await?;
        Ok(())
    }

    async fn update_response_time(&self, message_id: &str, response_time: f64) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/rest/v1/messages?id=eq.{}", message_id),
            )
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "response_time": response_time }))
            .send()
            .await
            .context("Failed to reach storage backend")?;
        Self::expect_success(response, "updating message response time").await?;
        Ok(())
    }

    async fn signed_attachment_url(&self, file_id: &str, expires_in_secs: u64) -> Result<String> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/storage/v1/object/sign/attachments/{}", file_id),
            )
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await
            .context("Failed to reach storage backend")?;
        let signed: SignedUrlResponse = Self::expect_success(response, "signing an attachment URL")
            .await?
            .json()
            .await
            .context("Failed to decode signed URL response")?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

/// In-memory conversation state mirroring the backend.
///
/// Every mutation persists first and only then updates the local
/// view, so a persistence failure leaves memory untouched.
pub struct ChatStore<B: StorageBackend> {
    backend: B,
    sessions: Vec<Session>,
    messages: HashMap<String, Vec<StoredMessage>>,
}

impl<B: StorageBackend> ChatStore<B> {
    pub fn new(backend: B) -> Self {
        ChatStore {
            backend,
            sessions: Vec::new(),
            messages: HashMap::new(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn messages(&self, session_id: &str) -> &[StoredMessage] {
        self.messages
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub async fn refresh_sessions(&mut self) -> Result<()> {
        self.sessions = self.backend.list_sessions().await?;
        Ok(())
    }

    pub async fn create_session(&mut self, title: &str) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        self.backend.insert_session(&session).await?;
        self.sessions.insert(0, session.clone());
        Ok(session)
    }

    pub async fn delete_session(&mut self, session_id: &str) -> Result<()> {
        self.backend.delete_session(session_id).await?;
        self.sessions.retain(|s| s.id != session_id);
        self.messages.remove(session_id);
        Ok(())
    }

    pub async fn rename_session(&mut self, session_id: &str, title: &str) -> Result<()> {
        self.backend.rename_session(session_id, title).await?;
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            session.title = title.to_string();
        }
        Ok(())
    }

    pub async fn load_messages(&mut self, session_id: &str) -> Result<()> {
        let rows = self.backend.list_messages(session_id).await?;
        self.messages.insert(session_id.to_string(), rows);
        Ok(())
    }

    pub async fn append_message(
        &mut self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<StoredMessage> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            response_time: None,
            file_id: None,
            file_name: None,
        };
        self.backend.insert_message(&message).await?;
        self.messages
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    pub async fn update_message_content(&mut self, message_id: &str, content: &str) -> Result<()> {
        self.backend
            .update_message_content(message_id, content)
            .await?;
        if let Some(message) = self.find_message_mut(message_id) {
            message.content = content.to_string();
        }
        Ok(())
    }

    pub async fn update_message_response_time(
        &mut self,
        message_id: &str,
        response_time: f64,
    ) -> Result<()> {
        self.backend
            .update_response_time(message_id, response_time)
            .await?;
        if let Some(message) = self.find_message_mut(message_id) {
            message.response_time = Some(response_time);
        }
        Ok(())
    }

    pub async fn signed_attachment_url(
        &self,
        file_id: &str,
        expires_in_secs: u64,
    ) -> Result<String> {
        self.backend
            .signed_attachment_url(file_id, expires_in_secs)
            .await
    }

    fn find_message_mut(&mut self, message_id: &str) -> Option<&mut StoredMessage> {
        self.messages
            .values_mut()
            .flat_map(|messages| messages.iter_mut())
            .find(|m| m.id == message_id)
    }
}
