//! HTTP routes
//!
//! Each caller is identified by a session cookie that owns one
//! [`MailboxContext`]. Mailbox calls block (network I/O, the browser
//! consent wait) so they run on the blocking pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{debug, info};
use mailbox::{MailboxContext, MailboxService};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;

/// Cookie carrying the caller's session ID
pub const SESSION_COOKIE: &str = "mailbox_session";

/// One caller's context, locked for the whole of each mailbox call
type SharedContext = Arc<Mutex<MailboxContext>>;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    service: Arc<MailboxService>,
    /// Locked only to look up or drop a context, never across a call
    contexts: Arc<Mutex<HashMap<String, SharedContext>>>,
    default_limit: usize,
}

impl AppState {
    pub fn new(service: MailboxService, default_limit: usize) -> Self {
        Self {
            service: Arc::new(service),
            contexts: Arc::new(Mutex::new(HashMap::new())),
            default_limit,
        }
    }

    /// Run a mailbox operation against the caller's context
    async fn run<T, F>(&self, session_id: String, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&MailboxService, &mut MailboxContext) -> mailbox::Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let contexts = Arc::clone(&self.contexts);

        tokio::task::spawn_blocking(move || {
            let shared = checkout(&contexts, &session_id)?;
            let outcome = {
                let mut ctx = shared
                    .lock()
                    .map_err(|_| ApiError::Internal("Session is unavailable".to_string()))?;
                op(service.as_ref(), &mut ctx)
            };
            drop(shared);
            release(&contexts, &session_id)?;
            outcome.map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {}", e)))?
    }
}

fn lock_contexts(
    contexts: &Mutex<HashMap<String, SharedContext>>,
) -> Result<MutexGuard<'_, HashMap<String, SharedContext>>, ApiError> {
    contexts
        .lock()
        .map_err(|_| ApiError::Internal("Session store is unavailable".to_string()))
}

/// Get the caller's context, creating it on first use
fn checkout(
    contexts: &Mutex<HashMap<String, SharedContext>>,
    session_id: &str,
) -> Result<SharedContext, ApiError> {
    let mut contexts = lock_contexts(contexts)?;
    Ok(Arc::clone(contexts.entry(session_id.to_string()).or_default()))
}

/// Drop the caller's context once it is idle and no other request holds it
fn release(
    contexts: &Mutex<HashMap<String, SharedContext>>,
    session_id: &str,
) -> Result<(), ApiError> {
    let mut contexts = lock_contexts(contexts)?;
    let idle = match contexts.get(session_id) {
        Some(ctx) => {
            Arc::strong_count(ctx) == 1 && matches!(ctx.try_lock(), Ok(ctx) if ctx.is_idle())
        }
        None => false,
    };
    if idle {
        debug!("Dropping idle session {}", session_id);
        contexts.remove(session_id);
    }
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get-user-email", get(get_user_email))
        .route("/fetch-emails", get(fetch_emails))
        .route("/clear-session", get(clear_session))
        .with_state(state)
}

/// Reuse the caller's session ID or issue a new one
fn session_id(jar: CookieJar) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let id = cookie.value().to_string();
        return (jar, id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .build();
    (jar.add(cookie), id)
}

async fn get_user_email(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    let outcome = state
        .run(id, |service, ctx| service.get_user_email(ctx))
        .await
        .map(|email| {
            Json(json!({
                "status": "success",
                "message": "User email retrieved",
                "email": email,
            }))
        });
    (jar, outcome).into_response()
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    limit: Option<usize>,
}

async fn fetch_emails(
    State(state): State<AppState>,
    jar: CookieJar,
    params: Result<Query<FetchParams>, QueryRejection>,
) -> Response {
    let (jar, id) = session_id(jar);
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return (jar, ApiError::BadRequest(rejection.body_text())).into_response();
        }
    };
    let limit = params.limit.unwrap_or(state.default_limit);
    info!("Fetching up to {} emails", limit);

    let outcome = state
        .run(id, move |service, ctx| {
            let batch = service.fetch_emails(ctx, limit)?;
            let path = service.batch_file().path().display().to_string();
            Ok((batch, path))
        })
        .await
        .map(|(batch, path)| {
            let mut body: Value = json!({
                "status": "success",
                "message": format!("Emails fetched and saved to {}", path),
                "emails": batch.emails,
            });
            if !batch.failures.is_empty() {
                body["failures"] = json!(batch.failures);
            }
            Json(body)
        });
    (jar, outcome).into_response()
}

async fn clear_session(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    let outcome = state
        .run(id, |service, ctx| service.clear_session(ctx))
        .await
        .map(|()| {
            Json(json!({
                "status": "success",
                "message": "Session cleared",
            }))
        });
    (jar, outcome).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use mailbox::gmail::api::{GmailMessage, ListMessagesResponse, ProfileResponse};
    use mailbox::{
        AuthorizationFlow, BatchFile, Credential, CredentialStore, FetchOptions, MailApi,
    };
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Grants one fixed credential, or refuses consent
    struct Flow(Option<Credential>);

    impl AuthorizationFlow for Flow {
        fn authorize(&self) -> anyhow::Result<Credential> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("access_denied"))
        }

        fn refresh(&self, _: &Credential) -> anyhow::Result<Credential> {
            anyhow::bail!("invalid_grant")
        }
    }

    /// Knows one mailbox whose message listing is unavailable
    struct Api;

    impl MailApi for Api {
        fn get_profile(&self, _: &Credential) -> anyhow::Result<ProfileResponse> {
            Ok(ProfileResponse {
                email_address: "me@example.com".to_string(),
                messages_total: None,
                history_id: None,
            })
        }

        fn list_messages(&self, _: &Credential, _: usize) -> anyhow::Result<ListMessagesResponse> {
            anyhow::bail!("503 Service Unavailable")
        }

        fn get_message(&self, _: &Credential, id: &str) -> anyhow::Result<GmailMessage> {
            anyhow::bail!("404 Not Found: {}", id)
        }

        fn get_attachment(&self, _: &Credential, _: &str, _: &str) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("404 Not Found")
        }
    }

    /// Blocks inside consent until released
    struct GatedFlow {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl AuthorizationFlow for GatedFlow {
        fn authorize(&self) -> anyhow::Result<Credential> {
            self.entered.lock().unwrap().send(())?;
            self.release.lock().unwrap().recv()?;
            Ok(Credential::new("at", None, Vec::new(), 3600))
        }

        fn refresh(&self, _: &Credential) -> anyhow::Result<Credential> {
            anyhow::bail!("invalid_grant")
        }
    }

    fn state(dir: &TempDir, flow: Arc<dyn AuthorizationFlow>) -> AppState {
        let service = MailboxService::new(
            CredentialStore::with_token_file(dir.path().join("token.json")),
            flow,
            Arc::new(Api),
            BatchFile::new(dir.path().join("emails.json")),
            FetchOptions::default(),
        );
        AppState::new(service, 5)
    }

    fn app(dir: &TempDir, credential: Option<Credential>) -> Router {
        router(state(dir, Arc::new(Flow(credential))))
    }

    fn context_count(state: &AppState) -> usize {
        state.contexts.lock().unwrap().len()
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, cookie, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_clear_session_without_state_succeeds() {
        let dir = TempDir::new().unwrap();
        let (status, cookie, body) = get(app(&dir, None), "/clear-session").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(cookie.unwrap().starts_with(SESSION_COOKIE));
    }

    #[tokio::test]
    async fn test_get_user_email_success() {
        let dir = TempDir::new().unwrap();
        let credential = Credential::new("at", None, Vec::new(), 3600);
        let (status, _, body) = get(app(&dir, Some(credential)), "/get-user-email").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "me@example.com");
        assert!(dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_denied_consent_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = get(app(&dir, None), "/get-user-email").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let credential = Credential::new("at", None, Vec::new(), 3600);
        let (status, _, body) = get(app(&dir, Some(credential)), "/fetch-emails?limit=3").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("503"));
        assert!(!dir.path().join("emails.json").exists());
    }

    #[tokio::test]
    async fn test_cleared_sessions_are_dropped() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Arc::new(Flow(None)));

        for _ in 0..50 {
            let (status, _, _) = get(router(state.clone()), "/clear-session").await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(context_count(&state), 0);
    }

    #[tokio::test]
    async fn test_authenticated_session_is_kept_until_cleared() {
        let dir = TempDir::new().unwrap();
        let credential = Credential::new("at", None, Vec::new(), 3600);
        let state = state(&dir, Arc::new(Flow(Some(credential))));

        let (status, cookie, _) = get(router(state.clone()), "/get-user-email").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(context_count(&state), 1);

        let cookie = cookie.unwrap();
        let pair = cookie.split(';').next().unwrap().to_string();
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/clear-session")
                    .header(header::COOKIE, pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(context_count(&state), 0);
    }

    #[tokio::test]
    async fn test_pending_consent_does_not_block_other_sessions() {
        let dir = TempDir::new().unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let state = state(
            &dir,
            Arc::new(GatedFlow {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
        );

        let pending = tokio::spawn(get(router(state.clone()), "/get-user-email"));
        tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
            .await
            .unwrap();

        let cleared = tokio::time::timeout(
            Duration::from_secs(1),
            get(router(state.clone()), "/clear-session"),
        )
        .await;
        release_tx.send(()).unwrap();

        let (status, _, _) = cleared.expect("clear-session waited on another session");
        assert_eq!(status, StatusCode::OK);
        let (status, _, body) = pending.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "me@example.com");
    }

    #[tokio::test]
    async fn test_malformed_limit_is_a_structured_bad_request() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = get(app(&dir, None), "/fetch-emails?limit=-1").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(!body["message"].as_str().unwrap().is_empty());
        assert!(!dir.path().join("emails.json").exists());
    }
}
