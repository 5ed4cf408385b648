//! Network and filesystem side of a single fetch.
//!
//! - [`HttpClient`] issues one request at a time with redirects disabled
//! - [`RedirectResolver`] walks redirect chains hop by hop under a bound
//! - [`DomainThrottle`] delays repeat contact with rate-limited hosts
//! - [`ArtifactWriter`] streams a body to scratch and moves it into place
//!
//! Nothing here touches the ledger; claim ordering lives in [`crate::run`].

mod client;
mod error;
mod resolver;
mod throttle;
mod writer;

pub use client::HttpClient;
pub use error::{FailureKind, FetchError};
pub use resolver::{REDIRECT_STATUSES, RedirectResolver, Resolved, absolutize_location};
pub use throttle::DomainThrottle;
pub use writer::{ArtifactWriter, WriteOutcome, is_allowed_type};
