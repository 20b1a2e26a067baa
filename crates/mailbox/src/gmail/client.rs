//! Gmail API HTTP client
//!
//! Read-only calls against the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::MailApi;
use super::api::{AttachmentResponse, GmailMessage, ListMessagesResponse, ProfileResponse};
use super::decode::decode_base64;
use crate::models::Credential;

/// Gmail API client; every call is authorized by the credential passed in
#[derive(Debug, Default, Clone)]
pub struct GmailClient;

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest page the list endpoint accepts
    const MAX_PAGE_SIZE: usize = 500;

    pub fn new() -> Self {
        Self
    }

    /// GET a Gmail endpoint and parse the JSON response
    fn get_json<T: DeserializeOwned>(&self, credential: &Credential, path: &str) -> Result<T> {
        let url = format!("{}{}", Self::BASE_URL, path);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", credential.access_token))
            .call()
            .with_context(|| format!("Request to {} failed", path))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

impl MailApi for GmailClient {
    fn get_profile(&self, credential: &Credential) -> Result<ProfileResponse> {
        self.get_json(credential, "/users/me/profile")
            .context("Failed to fetch mailbox profile")
    }

    fn list_messages(
        &self,
        credential: &Credential,
        max_results: usize,
    ) -> Result<ListMessagesResponse> {
        let path = format!(
            "/users/me/messages?maxResults={}",
            max_results.min(Self::MAX_PAGE_SIZE)
        );
        self.get_json(credential, &path)
            .context("Failed to list messages")
    }

    fn get_message(&self, credential: &Credential, id: &str) -> Result<GmailMessage> {
        let path = format!(
            "/users/me/messages/{}?format=full",
            urlencoding::encode(id)
        );
        self.get_json(credential, &path)
            .with_context(|| format!("Failed to get message {}", id))
    }

    fn get_attachment(
        &self,
        credential: &Credential,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>> {
        let path = format!(
            "/users/me/messages/{}/attachments/{}",
            urlencoding::encode(message_id),
            urlencoding::encode(attachment_id)
        );
        let attachment: AttachmentResponse = self
            .get_json(credential, &path)
            .with_context(|| format!("Failed to get attachment for message {}", message_id))?;

        let data = attachment.data.unwrap_or_default();
        decode_base64(&data)
            .with_context(|| format!("Attachment data for message {} is not base64", message_id))
    }
}
