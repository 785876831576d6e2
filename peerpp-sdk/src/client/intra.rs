//! Intra v2 API client.
//!
//! Every request goes through one pipeline that:
//! - attaches a bearer token, refreshing it when it expires within a minute
//! - waits on the per-second [`RateLimiter`]
//! - retries HTTP 429 forever with a doubling [`Cooldown`]
//!
//! The token refresh itself uses the same pipeline without the bearer step.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::Stream;
use futures_util::stream;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::IgnoredAny;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

use super::limiter::{Cooldown, RateLimiter};
use super::{ClientError, Response};
use crate::objects::AccessToken;

/// Page size requested when the caller does not paginate explicitly.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Refresh the token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

const PAGE_NUMBER: &str = "page[number]";
const PAGE_SIZE: &str = "page[size]";

/// OAuth application credentials for the client-credentials grant.
#[derive(Clone)]
pub struct IntraCredentials {
    pub uid: String,
    pub secret: String,
    pub scopes: String,
}

impl std::fmt::Debug for IntraCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntraCredentials")
            .field("uid", &self.uid)
            .field("secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

struct Session {
    token: String,
    expires_at: i64,
}

#[derive(Clone, Copy)]
enum Payload<'a> {
    Empty,
    Json(&'a serde_json::Value),
    Form(&'a [(&'a str, &'a str)]),
}

/// Authenticated, throttled access to `https://api.intra.42.fr/v2`.
pub struct IntraClient {
    http: Client,
    api_root: Url,
    token_url: Url,
    credentials: IntraCredentials,
    limiter: RateLimiter,
    cooldown: Cooldown,
    session: Mutex<Option<Session>>,
}

impl IntraClient {
    /// Create a new `IntraClient`.
    ///
    /// * `root` – site root (e.g. `https://api.intra.42.fr`); the API lives
    ///   under `v2/` and the token endpoint under `oauth/token`.
    /// * `max_per_second` – requests allowed per wall-clock second.
    /// * `cooldown_base` – first wait after an HTTP 429.
    pub fn new(
        mut root: Url,
        credentials: IntraCredentials,
        max_per_second: u32,
        cooldown_base: Duration,
    ) -> Result<Self, ClientError> {
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            api_root: root.join("v2/")?,
            token_url: root.join("oauth/token")?,
            credentials,
            limiter: RateLimiter::new(max_per_second),
            cooldown: Cooldown::new(cooldown_base),
            session: Mutex::new(None),
        })
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// The wait the next HTTP 429 would cause.
    pub fn current_cooldown(&self) -> Duration {
        self.cooldown.current()
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, ClientError> {
        let query = owned_query(query);
        self.send(Method::GET, path, &query, Payload::Empty).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, &[], Payload::Json(&body)).await
    }

    pub async fn delete(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ClientError> {
        let payload = body.map_or(Payload::Empty, Payload::Json);
        self.send(Method::DELETE, path, &[], payload).await
    }

    /// Lazily fetch every page of a collection endpoint.
    ///
    /// `page[number]` counts up from 1. When the caller passes neither
    /// `page[number]` nor `page_size`, `page[size]` defaults to
    /// [`DEFAULT_PAGE_SIZE`]. The stream ends at the first page that decodes
    /// to zero items; a failed page is yielded once and ends the stream.
    pub fn get_all_pages<'a>(
        &'a self,
        path: &str,
        query: &[(&str, String)],
    ) -> impl Stream<Item = Result<Response, ClientError>> + use<'a> {
        let caller_paginates = query
            .iter()
            .any(|(k, _)| *k == PAGE_NUMBER || *k == "page_size" || *k == PAGE_SIZE);
        let mut base: Vec<(String, String)> = query
            .iter()
            .filter(|(k, _)| *k != PAGE_NUMBER)
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect();
        if !caller_paginates {
            base.push((PAGE_SIZE.to_owned(), DEFAULT_PAGE_SIZE.to_string()));
        }
        let path = path.to_owned();

        stream::unfold(Some(1u32), move |next| {
            let mut query = base.clone();
            let path = path.clone();
            async move {
                let page = next?;
                query.push((PAGE_NUMBER.to_owned(), page.to_string()));
                match self.send(Method::GET, &path, &query, Payload::Empty).await {
                    Ok(response) if !response.ok => Some((Ok(response), None)),
                    Ok(response) if page_is_empty(&response) => {
                        debug!(path = %path, page, "Reached last page");
                        None
                    }
                    Ok(response) => Some((Ok(response), Some(page + 1))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        payload: Payload<'_>,
    ) -> Result<Response, ClientError> {
        let token = self.bearer().await?;
        let url = self.api_root.join(path.trim_start_matches('/'))?;
        self.dispatch(method, url, query, payload, Some(&token)).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        payload: Payload<'_>,
        bearer: Option<&str>,
    ) -> Result<Response, ClientError> {
        loop {
            self.limiter.acquire().await;

            let mut request = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }
            request = match payload {
                Payload::Empty => request,
                Payload::Json(body) => request.json(body),
                Payload::Form(form) => request.form(form),
            };

            debug!(method = %method, path = url.path(), "Intra request");
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = self.cooldown.escalate();
                warn!(
                    path = url.path(),
                    cooldown_ms = wait.as_millis() as u64,
                    "Rate limited by Intra, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            self.cooldown.reset();
            let body = response.text().await?;
            return Ok(Response {
                ok: status.is_success(),
                status,
                body,
            });
        }
    }

    async fn bearer(&self) -> Result<String, ClientError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if let Some(token) = self.cached_token(now) {
            return Ok(token);
        }
        let session = self.refresh().await?;
        let token = session.token.clone();
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(token)
    }

    fn cached_token(&self, now: i64) -> Option<String> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session
            .as_ref()
            .filter(|s| s.expires_at - REFRESH_MARGIN_SECS > now)
            .map(|s| s.token.clone())
    }

    async fn refresh(&self) -> Result<Session, ClientError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.uid.as_str()),
            ("client_secret", self.credentials.secret.as_str()),
            ("scope", self.credentials.scopes.as_str()),
        ];
        let response = self
            .dispatch(
                Method::POST,
                self.token_url.clone(),
                &[],
                Payload::Form(&form),
                None,
            )
            .await?;
        let token: AccessToken = response.parse()?;
        info!(expires_at = token.expires_at(), "Refreshed Intra access token");
        Ok(Session {
            expires_at: token.expires_at(),
            token: token.access_token,
        })
    }
}

fn owned_query(query: &[(&str, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn page_is_empty(response: &Response) -> bool {
    response
        .json::<Vec<IgnoredAny>>()
        .map(|items| items.is_empty())
        .unwrap_or(true)
}
