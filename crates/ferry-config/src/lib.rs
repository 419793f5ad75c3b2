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

//! Typed configuration for a Ferry worker process.
//!
//! Layout: `model.rs` (data carriers), `loader.rs` (file + environment
//! loading), `validate.rs` (invariant checks), `error.rs` (structured
//! failures).

mod error;
mod loader;
mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, load_config, load_from_env};
pub use model::{LogSettings, MountPoint, WorkerConfig};
pub use validate::validate;
