//! Typed async client for the ragpile API.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    AuthReason, AuthUrl, ChatRequest, ModelInfo, ModelPage, Schedule, TelegramAuthPayload, Thread,
    ThreadItem, User,
};
use crate::response::ensure_success;
use crate::stream::text_deltas;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

/// Name of the session cookie set by the login callbacks.
pub const SESSION_COOKIE: &str = "ragpile_token";

/// Result of a login callback.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// Session token captured from `Set-Cookie`, if the server issued one.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    root: Url,
    token: Option<String>,
}

impl Client {
    /// Client for the API mounted at `root` (e.g. `http://host/ragpile/api`).
    pub fn new(root: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            root,
            token: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.api_root()?))
    }

    /// Send `token` as the session cookie on every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn api_root(&self) -> &Url {
        &self.root
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API root cannot be a base: {}", self.root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        ensure_success(builder.send().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        let response = Self::send(self.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    async fn login(builder: RequestBuilder) -> Result<LoginOutcome> {
        let response = Self::send(builder).await?;
        let token = session_token(&response);
        if token.is_none() {
            log::warn!("login succeeded without a {} cookie", SESSION_COOKIE);
        }
        let user = response.json().await?;
        Ok(LoginOutcome { user, token })
    }

    // ------------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------------

    /// Stream the completion for `request` as text deltas.
    ///
    /// Nothing is sent until the stream is first polled. A failed status is
    /// yielded as the only item.
    pub fn chat_stream(&self, request: &ChatRequest) -> BoxStream<'static, Result<String>> {
        let builder = match self.endpoint(&["chat"]) {
            Ok(url) => self.request(Method::POST, url).json(request),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        stream::once(async move {
            let response = Self::send(builder).await?;
            Ok::<_, Error>(text_deltas(response.bytes_stream()))
        })
        .try_flatten()
        .boxed()
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    pub async fn google_login_url(&self) -> Result<AuthUrl> {
        self.get_json(&["auth", "google_login"]).await
    }

    /// Authorization URL for granting ragpile access to a Google scope.
    pub async fn google_token_url(&self, reason: AuthReason) -> Result<AuthUrl> {
        self.get_json(&["google_token", reason.as_str()]).await
    }

    /// Exchange a Google login code for a session.
    pub async fn google_callback(&self, code: &str) -> Result<LoginOutcome> {
        let mut url = self.endpoint(&["auth", "google_callback"])?;
        url.query_pairs_mut().append_pair("code", code);
        Self::login(self.request(Method::GET, url)).await
    }

    pub async fn google_token_callback(&self, reason: AuthReason, code: &str) -> Result<User> {
        let mut url = self.endpoint(&["google_token_callback", reason.as_str()])?;
        url.query_pairs_mut().append_pair("code", code);
        let response = Self::send(self.request(Method::POST, url)).await?;
        Ok(response.json().await?)
    }

    pub async fn telegram_callback(&self, payload: &TelegramAuthPayload) -> Result<LoginOutcome> {
        let url = self.endpoint(&["telegram_callback"])?;
        Self::login(self.request(Method::POST, url).json(payload)).await
    }

    pub async fn me(&self) -> Result<User> {
        self.get_json(&["auth", "me"]).await
    }

    pub async fn logout(&self) -> Result<()> {
        let url = self.endpoint(&["auth", "logout"])?;
        Self::send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Threads and schedules
    // ------------------------------------------------------------------------

    pub async fn threads(&self) -> Result<Vec<ThreadItem>> {
        self.get_json(&["threads"]).await
    }

    pub async fn thread(&self, id: &str) -> Result<Thread> {
        self.get_json(&["threads", id]).await
    }

    pub async fn schedules(&self) -> Result<Vec<Schedule>> {
        self.get_json(&["schedules"]).await
    }

    pub async fn update_schedule(&self, schedule: &Schedule) -> Result<Schedule> {
        let url = self.endpoint(&["schedules", &schedule.id])?;
        let response = Self::send(self.request(Method::PUT, url).json(schedule)).await?;
        Ok(response.json().await?)
    }

    pub async fn models(&self) -> Result<Vec<ModelInfo>> {
        let page: ModelPage = self.get_json(&["models"]).await?;
        Ok(page.data)
    }
}

/// Value of the session cookie in the response's `Set-Cookie` headers.
fn session_token(response: &Response) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .find_map(|pair| pair.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .filter(|token| !token.is_empty())
}
