//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authorization-code flow and token refresh
//! - Gmail API client for profile, message and attachment reads
//! - Payload decoding into flat bodies and attachment descriptors
//!
//! The two network-facing seams are traits so the session manager and
//! fetcher can be driven by fixtures.

mod auth;
mod client;
mod decode;

pub use auth::GmailAuth;
pub use client::GmailClient;
pub use decode::{decode_attachments, decode_base64, decode_body, extract_header};

use anyhow::Result;

use crate::models::Credential;
use api::{GmailMessage, ListMessagesResponse, ProfileResponse};

/// Read access to a mailbox on behalf of a credential
pub trait MailApi: Send + Sync {
    /// Fetch the profile of the mailbox the credential belongs to
    fn get_profile(&self, credential: &Credential) -> Result<ProfileResponse>;

    /// List up to `max_results` message references, in provider order
    fn list_messages(&self, credential: &Credential, max_results: usize)
    -> Result<ListMessagesResponse>;

    /// Fetch a full message by ID
    fn get_message(&self, credential: &Credential, id: &str) -> Result<GmailMessage>;

    /// Fetch decoded attachment bytes
    fn get_attachment(
        &self,
        credential: &Credential,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>>;
}

/// The OAuth provider side of authentication
pub trait AuthorizationFlow: Send + Sync {
    /// Run the interactive authorization-code exchange
    fn authorize(&self) -> Result<Credential>;

    /// Exchange the credential's refresh token for a new access token
    fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub snippet: Option<String>,
        pub payload: Option<MessagePayload>,
    }

    /// Top-level message payload containing headers and body
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub mime_type: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Part body: inline data, or a reference to attachment data
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u64>,
        /// base64url-encoded content
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Response from users.getProfile
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
        pub messages_total: Option<u64>,
        pub history_id: Option<String>,
    }

    /// Response from messages.attachments.get
    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        pub size: Option<u64>,
        pub data: Option<String>,
    }
}
