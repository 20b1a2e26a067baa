//! Domain models for credentials and fetched email

mod credential;
mod email;

pub use credential::Credential;
pub use email::{AttachmentRef, EmailRecord};
