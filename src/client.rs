//! Session manager and the caller-facing surface.
//!
//! `Client` owns one session behind an async `RwLock`. Ordinary calls hold
//! the read half for their whole run, so a session or store reset (write
//! half) never interleaves with a call that depends on the token.

use log::{debug, info};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{CallExecutor, HttpTransport, Request, Response, Transport};
use crate::session::{Session, XSRF_COOKIE, mask, set_cookie_value};

pub const SESSION_EXPIRE_PATH: &str = "/Home/SessionExpire";
pub const STORE_RESET_PATH: &str = "/Store/Reset";

pub struct Client<T: Transport = HttpTransport> {
    config: ClientConfig,
    executor: CallExecutor<T>,
    session: RwLock<Session>,
}

impl Client<HttpTransport> {
    /// Builds a client over HTTP without contacting the remote.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(transport, config)
    }

    /// Builds a client and establishes the store context.
    #[tracing::instrument(skip(config))]
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.reset_store().await?;
        Ok(client)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let session = Session::new(&config)?;
        Ok(Self {
            executor: CallExecutor::new(transport, &config),
            session: RwLock::new(session),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn executor(&self) -> &CallExecutor<T> {
        &self.executor
    }

    /// Anti-forgery token currently mirrored into request headers.
    pub async fn token(&self) -> Option<String> {
        self.session.read().await.token().map(str::to_string)
    }

    /// Runs one call through the rate-limited, retrying executor.
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let session = self.session.read().await;
        self.executor.execute(&session, request).await
    }

    /// Builds a request from the current anti-forgery token and runs it
    /// under the same session read, so a concurrent reset cannot swap the
    /// token between building the body and sending the header.
    pub async fn execute_with_token<F>(&self, build: F) -> Result<Response>
    where
        F: FnOnce(&str) -> Result<Request>,
    {
        let session = self.session.read().await;
        let token = session
            .token()
            .ok_or_else(|| Error::Session("no anti-forgery token; reset the store first".to_string()))?;
        let request = build(token)?;
        self.executor.execute(&session, &request).await
    }

    /// Runs one call, giving up with `Cancelled` at `deadline`.
    pub async fn execute_with_deadline(&self, request: &Request, deadline: Instant) -> Result<Response> {
        let session = self.session.read().await;
        self.executor.execute_with_deadline(&session, request, deadline).await
    }

    /// Expires the remote session and starts a fresh local one.
    ///
    /// The old session, token included, is dropped only once the expire
    /// call succeeded; on failure it stays in place.
    #[tracing::instrument(skip(self))]
    pub async fn new_session(&self) -> Result<Response> {
        let mut session = self.session.write().await;
        let response = self
            .executor
            .execute(&session, &Request::get(SESSION_EXPIRE_PATH))
            .await?;

        *session = Session::new(&self.config)?;
        info!("Started a new session");
        Ok(response)
    }

    /// Clears the current store on the remote and picks up a fresh
    /// anti-forgery token for every later request.
    #[tracing::instrument(skip(self))]
    pub async fn reset_store(&self) -> Result<Response> {
        let mut session = self.session.write().await;
        let response = self
            .executor
            .execute(&session, &Request::get(STORE_RESET_PATH))
            .await?;

        let token = set_cookie_value(&response.headers, XSRF_COOKIE).ok_or_else(|| {
            Error::Session(format!(
                "{} did not set the {} cookie",
                STORE_RESET_PATH, XSRF_COOKIE
            ))
        })?;
        session.set_token(&token)?;

        debug!("Store reset, anti-forgery token {}", mask(&token));
        Ok(response)
    }

    /// Renews the session once it is older than the configured TTL.
    pub async fn ensure_session(&self) -> Result<()> {
        let age = self.session.read().await.age();
        if age >= self.config.session_ttl {
            info!("Session is {:?} old, renewing", age);
            self.new_session().await?;
        }
        Ok(())
    }

    /// Makes sure a live session holds an anti-forgery token.
    pub async fn ensure_store_context(&self) -> Result<()> {
        self.ensure_session().await?;
        if self.token().await.is_none() {
            self.reset_store().await?;
        }
        Ok(())
    }
}
