//! HTTP collaborators: dataset fetch, the editing server and the publish
//! endpoint.
//!
//! All calls are blocking. The TUI runs dataset fetches and publishes on
//! worker threads; editing-server calls are short and run inline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{Created, DatasetSource, EventStore, PendingEdits, Publisher, Refresh, StoreMode};
use crate::authoring::{self, EventDraft};
use crate::error::TimelineError;
use crate::export::ExportDataset;
use crate::model::{Dataset, TimelineItem};

/// Cookie the editing server keys sessions on.
pub const SESSION_COOKIE: &str = "kcm_session";

const USER_AGENT: &str = concat!("cas-timeline/", env!("CARGO_PKG_VERSION"));
const SAVE_FAILED: &str = "Unable to save to server. Are you logged in?";
const PUBLISH_FAILED: &str = "Publish failed.";
const PUBLISH_UNREACHABLE: &str = "Publish failed. Check the publish server.";

/// Shared blocking HTTP agent.
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }

    fn get(&self, url: &str, cookie: Option<&str>) -> ureq::Request {
        with_cookie(self.agent.get(url), cookie)
    }

    fn post(&self, url: &str, cookie: Option<&str>) -> ureq::Request {
        with_cookie(self.agent.post(url), cookie).set("Content-Type", "application/json")
    }
}

fn with_cookie(request: ureq::Request, cookie: Option<&str>) -> ureq::Request {
    match cookie {
        Some(token) => request.set("Cookie", &format!("{SESSION_COOKIE}={token}")),
        None => request,
    }
}

/// Join `base` and an absolute `path` without doubling the slash.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Append a `ts` query parameter so intermediaries never serve a stale copy.
#[must_use]
pub fn cache_busted(url: &str, now_millis: i64) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}ts={now_millis}")
}

/// Session token from a `Set-Cookie` header value, if it names the session
/// cookie. An empty value means the server cleared the session.
#[must_use]
pub fn session_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != SESSION_COOKIE || value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

fn read_json<T: serde::de::DeserializeOwned>(
    response: ureq::Response,
    what: &str,
) -> Result<T, TimelineError> {
    serde_json::from_reader(response.into_reader())
        .map_err(|err| TimelineError::decode(format!("{what}: {err}")))
}

fn transport(url: &str, err: &ureq::Error) -> TimelineError {
    match err {
        ureq::Error::Status(code, _) => TimelineError::network(format!("{url} returned {code}")),
        ureq::Error::Transport(t) => TimelineError::network(format!("{url}: {t}")),
    }
}

// ---------------------------------------------------------------------------
// Dataset source
// ---------------------------------------------------------------------------

/// Dataset served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDatasetSource {
    client: HttpClient,
    url: String,
    cache_bust: bool,
}

impl HttpDatasetSource {
    #[must_use]
    pub fn new(client: HttpClient, url: impl Into<String>, cache_bust: bool) -> Self {
        Self {
            client,
            url: url.into(),
            cache_bust,
        }
    }

    fn request_url(&self) -> String {
        if self.cache_bust {
            cache_busted(&self.url, chrono::Utc::now().timestamp_millis())
        } else {
            self.url.clone()
        }
    }
}

impl DatasetSource for HttpDatasetSource {
    fn fetch_dataset(&self) -> Result<Dataset, TimelineError> {
        let url = self.request_url();
        debug!(url, "fetching dataset");
        let response = self
            .client
            .get(&url, None)
            .set("Cache-Control", "no-store")
            .call()
            .map_err(|err| transport(&self.url, &err))?;
        read_json(response, &self.url)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ---------------------------------------------------------------------------
// Editing server
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    logged_in: bool,
    #[serde(default)]
    item: Option<TimelineItem>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Event store backed by the editing server's `/api/*` endpoints.
pub struct RemoteEventStore {
    client: HttpClient,
    server: String,
    session: Option<String>,
}

impl std::fmt::Debug for RemoteEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEventStore")
            .field("server", &self.server)
            .field("session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl RemoteEventStore {
    #[must_use]
    pub fn new(client: HttpClient, server: &str) -> Self {
        Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.server, path)
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ureq::Response, ureq::Error> {
        self.client
            .post(&self.url(path), self.session.as_deref())
            .send_json(body)
    }

    /// POST `body`, treating any non-ok outcome as an authorization failure
    /// carrying `fallback` unless the server supplied its own message.
    fn post_authorized<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Reply, TimelineError> {
        match self.post(path, body) {
            Ok(response) => {
                let reply: Reply = read_json(response, path)?;
                if reply.ok {
                    Ok(reply)
                } else {
                    Err(TimelineError::unauthorized(
                        reply.error.unwrap_or_else(|| fallback.to_string()),
                    ))
                }
            }
            Err(ureq::Error::Status(code, _)) => {
                debug!(path, code, "editing server refused request");
                Err(TimelineError::unauthorized(fallback))
            }
            Err(err) => Err(transport(path, &err)),
        }
    }
}

impl EventStore for RemoteEventStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Remote
    }

    fn is_authorized(&mut self) -> Result<bool, TimelineError> {
        let url = self.url("/api/me");
        let response = self
            .client
            .get(&url, self.session.as_deref())
            .call()
            .map_err(|err| transport(&url, &err))?;
        let reply: Reply = read_json(response, &url)?;
        Ok(reply.ok && reply.logged_in)
    }

    fn login(&mut self, password: &str) -> Result<(), TimelineError> {
        match self.post("/api/login", &json!({ "password": password })) {
            Ok(response) => {
                let token = response
                    .all("set-cookie")
                    .into_iter()
                    .find_map(session_from_set_cookie);
                let reply: Reply = read_json(response, "/api/login")?;
                if !reply.ok {
                    return Err(TimelineError::login_rejected());
                }
                if token.is_none() {
                    warn!("login succeeded without a session cookie");
                }
                self.session = token;
                Ok(())
            }
            Err(ureq::Error::Status(401, _)) => Err(TimelineError::login_rejected()),
            Err(err) => Err(transport("/api/login", &err)),
        }
    }

    fn logout(&mut self) {
        if let Err(err) = self.post("/api/logout", &json!({})) {
            debug!(%err, "logout request failed; dropping session anyway");
        }
        self.session = None;
    }

    fn create_event(&mut self, draft: EventDraft) -> Result<Created, TimelineError> {
        let reply = self.post_authorized("/api/events", &draft, SAVE_FAILED)?;
        Ok(Created {
            item: reply.item,
            refresh: Refresh::Reload,
        })
    }

    fn delete_event(&mut self, id: &str) -> Result<Refresh, TimelineError> {
        self.post_authorized("/api/delete", &json!({ "id": id }), SAVE_FAILED)?;
        Ok(Refresh::Reload)
    }

    fn upload_image(&mut self, bytes: &[u8], filename: &str) -> Result<String, TimelineError> {
        let data_url = authoring::image_data_uri(bytes, filename)?;
        let body = json!({ "dataUrl": data_url, "filename": filename });
        match self.post_authorized("/api/upload-image", &body, "Upload failed.") {
            Ok(Reply { url: Some(url), .. }) => Ok(url),
            Ok(_) => {
                warn!(filename, "upload reply had no url; embedding image inline");
                Ok(data_url)
            }
            Err(err) => {
                warn!(filename, %err, "upload failed; embedding image inline");
                Ok(data_url)
            }
        }
    }

    fn list_events(&mut self) -> Result<Vec<TimelineItem>, TimelineError> {
        let url = self.url(super::SERVER_DATA_PATH);
        let response = self
            .client
            .get(&url, self.session.as_deref())
            .call()
            .map_err(|err| transport(&url, &err))?;
        let dataset: Dataset = read_json(response, &url)?;
        Ok(dataset.items)
    }

    fn pending_edits(&self) -> PendingEdits<'_> {
        PendingEdits::NONE
    }

    fn clear_pending(&mut self) -> Result<(), TimelineError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Publish endpoint
// ---------------------------------------------------------------------------

/// Password-protected publish endpoint that replaces the public dataset.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: HttpClient,
    endpoint: String,
}

impl HttpPublisher {
    #[must_use]
    pub fn new(client: HttpClient, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

impl Publisher for HttpPublisher {
    fn publish(&self, payload: &ExportDataset, password: &str) -> Result<(), TimelineError> {
        let body = json!({ "password": password, "data": payload });
        debug!(endpoint = %self.endpoint, items = payload.items.len(), "publishing");
        match self.client.post(&self.endpoint, None).send_json(body) {
            Ok(response) => {
                let reply: Reply = response.into_json().unwrap_or_default();
                if reply.ok {
                    Ok(())
                } else {
                    Err(TimelineError::PublishFailure(
                        reply.error.unwrap_or_else(|| PUBLISH_FAILED.to_string()),
                    ))
                }
            }
            Err(ureq::Error::Status(code, response)) => {
                let reply: Reply = response.into_json().unwrap_or_default();
                debug!(code, "publish endpoint rejected payload");
                Err(TimelineError::PublishFailure(
                    reply.error.unwrap_or_else(|| PUBLISH_FAILED.to_string()),
                ))
            }
            Err(ureq::Error::Transport(err)) => {
                warn!(%err, "publish endpoint unreachable");
                Err(TimelineError::PublishFailure(PUBLISH_UNREACHABLE.to_string()))
            }
        }
    }
}
