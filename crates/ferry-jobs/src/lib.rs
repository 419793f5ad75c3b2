//! Job layer contract for the Ferry workspace.
//!
//! A job is one asynchronous filesystem operation issued against a URL. The
//! issuer receives a [`JobHandle`] and consumes an ordered stream of
//! [`JobEvent`]s until a terminal event arrives; the producer side drives a
//! [`JobFeed`]. Backends implement [`JobBackend`] to mint jobs for the
//! supported operations.

pub mod backend;
pub mod error;
pub mod event;
pub mod handle;

pub use backend::{JobBackend, JobOptions, MetaData, unsupported_job};
pub use error::{ErrorCode, JobError, JobResult};
pub use event::JobEvent;
pub use handle::{JobFeed, JobHandle};
