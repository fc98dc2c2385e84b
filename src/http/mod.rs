//! HTTP plumbing: request descriptors, the transport seam, the call budget
//! and the retrying executor that ties them together.

mod executor;
mod limiter;
mod request;
mod retry;
mod transport;

pub use executor::CallExecutor;
pub use limiter::CallBudget;
pub use request::{Method, RawResponse, Request, Response};
pub use retry::{Backoff, SUCCESS_STATUS, classify_response, should_retry};
pub use transport::{HttpTransport, Outgoing, Transport};

#[cfg(test)]
pub use transport::MockTransport;
