#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! The Ferry worker binary: a mount-table forwarding worker over the local
//! filesystem, driven by a JSON-lines transport on stdio.

mod bootstrap;
mod error;
mod policy;
mod transport;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use policy::MountPolicy;
pub use transport::{OpRequest, StdioChannel, dispatch};
