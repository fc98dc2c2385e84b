//! Rate-limited, retrying call executor.
//!
//! Every call to the remote passes through [`CallExecutor::execute`]:
//! budget check, dispatch, classify, and on a retryable failure back off and
//! start over, up to the configured number of attempts.

use std::future::Future;

use log::{debug, warn};
use tokio::time::Instant;

use super::limiter::CallBudget;
use super::request::{Request, Response};
use super::retry::{Backoff, classify_response, should_retry};
use super::transport::{Outgoing, Transport};
use crate::config::{ClientConfig, MutationRetry};
use crate::error::{Error, Result};
use crate::session::Session;

pub struct CallExecutor<T: Transport> {
    transport: T,
    budget: CallBudget,
    backoff: Backoff,
    mutations: MutationRetry,
}

impl<T: Transport> CallExecutor<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            budget: CallBudget::new(config.rate_limit),
            backoff: Backoff::new(config.retry.clone()),
            mutations: config.mutation_retry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    /// Executes `request` against `session`, waiting for budget and retrying
    /// as needed. Returns the first 200 response.
    #[tracing::instrument(skip(self, session, request), fields(method = request.method.as_str(), path = %request.path))]
    pub async fn execute(&self, session: &Session, request: &Request) -> Result<Response> {
        self.run(session, request, None).await
    }

    /// Like [`execute`](Self::execute), but gives up with `Cancelled` once
    /// `deadline` passes, whether waiting for budget, backing off or in flight.
    #[tracing::instrument(skip(self, session, request), fields(method = request.method.as_str(), path = %request.path))]
    pub async fn execute_with_deadline(
        &self,
        session: &Session,
        request: &Request,
        deadline: Instant,
    ) -> Result<Response> {
        self.run(session, request, Some(deadline)).await
    }

    async fn run(&self, session: &Session, request: &Request, deadline: Option<Instant>) -> Result<Response> {
        if request.requires_token && session.token().is_none() {
            return Err(Error::Session(format!(
                "{} requires an anti-forgery token; reset the store first",
                request.path
            )));
        }

        let max_attempts = self.backoff.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.attempt(session, request, deadline).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !should_retry(&err, request, self.mutations) {
                debug!("{}: non-retryable error: {}", request.path, err);
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!("{}: giving up after {} attempts ({})", request.path, attempt, err);
                return Err(err.exhausted(attempt));
            }

            let delay = self.backoff.delay_for_attempt(attempt);
            warn!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}...",
                request.path, attempt, max_attempts, err, delay
            );
            within(deadline, &request.path, tokio::time::sleep(delay)).await?;
        }
    }

    /// One pass through the gate and the transport.
    async fn attempt(&self, session: &Session, request: &Request, deadline: Option<Instant>) -> Result<Response> {
        if self.budget.limit().wait {
            within(deadline, &request.path, self.budget.acquire()).await?;
        } else {
            self.budget.try_acquire()?;
        }

        let outgoing = prepare(session, request)?;
        let raw = within(deadline, &request.path, self.transport.send(outgoing)).await??;

        // Cookies count even on failures; the remote may rotate them on errors.
        session.store_cookies(&raw.headers);
        classify_response(&request.path, &raw)?;

        Ok(Response {
            endpoint: request.path.clone(),
            headers: raw.headers,
            body: raw.body,
        })
    }
}

fn prepare(session: &Session, request: &Request) -> Result<Outgoing> {
    let url = session.url(&request.path, &request.query)?;
    let body = request
        .body
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|e| Error::Decode {
            endpoint: request.path.clone(),
            message: format!("failed to encode request body: {}", e),
        })?;

    Ok(Outgoing {
        method: request.method,
        url,
        headers: session.request_headers(),
        body,
    })
}

async fn within<F: Future>(deadline: Option<Instant>, endpoint: &str, fut: F) -> Result<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::Cancelled {
                endpoint: endpoint.to_string(),
            }),
        None => Ok(fut.await),
    }
}
