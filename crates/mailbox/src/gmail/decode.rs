//! Gmail payload decoding
//!
//! Pure functions turning a message payload into a flat body string,
//! attachment descriptors, and header values. No I/O.

use base64::prelude::*;

use super::api::{MessageBody, MessagePayload};
use crate::models::AttachmentRef;

/// MIME type used when a part doesn't declare one
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Extract the first header with exactly this name (case-sensitive)
pub fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name == name)
        .map(|h| h.value.clone())
}

/// Decode the message body.
///
/// Looks through the top-level parts for a `text/plain` part with inline
/// data. Without one, falls back to the payload's own inline body. HTML
/// parts are never returned. Invalid UTF-8 is replaced, never an error.
pub fn decode_body(payload: &MessagePayload) -> Option<String> {
    let plain_part = payload.parts.iter().flatten().find_map(|part| {
        if part.mime_type.as_deref() == Some("text/plain") {
            part.body.as_ref().and_then(decode_inline_text)
        } else {
            None
        }
    });

    plain_part.or_else(|| payload.body.as_ref().and_then(decode_inline_text))
}

/// Collect attachment descriptors from the top-level parts.
///
/// A part counts as an attachment only when it carries both a filename and
/// an attachment ID; content is left empty for the caller to fill.
pub fn decode_attachments(payload: &MessagePayload) -> Vec<AttachmentRef> {
    payload
        .parts
        .iter()
        .flatten()
        .filter_map(|part| {
            let filename = part.filename.as_deref().filter(|f| !f.is_empty())?;
            let body = part.body.as_ref()?;
            let attachment_id = body.attachment_id.as_deref().filter(|id| !id.is_empty())?;

            Some(AttachmentRef {
                filename: filename.to_string(),
                mime_type: part
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                size_bytes: body.size,
                attachment_id: Some(attachment_id.to_string()),
                content: None,
            })
        })
        .collect()
}

/// Decode base64 data from the Gmail API
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_base64(data: &str) -> Option<Vec<u8>> {
    let decoders: [&base64::engine::GeneralPurpose; 4] = [
        &BASE64_URL_SAFE_NO_PAD,
        &BASE64_URL_SAFE,
        &BASE64_STANDARD,
        &BASE64_STANDARD_NO_PAD,
    ];

    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}

/// Decode an inline body as trimmed, lossily-decoded UTF-8 text
fn decode_inline_text(body: &MessageBody) -> Option<String> {
    let data = body.data.as_deref().filter(|d| !d.is_empty())?;
    let bytes = decode_base64(data)?;
    Some(String::from_utf8_lossy(&bytes).trim().to_string())
}
