//! Forwarding core: re-issue filesystem operations against rewritten URLs.
//!
//! A [`Forwarder`] implements the worker-side contract for the supported
//! filesystem operations. Each incoming operation passes the rewrite gate
//! (policy-driven URL translation with foreign-scheme passthrough), is issued
//! as a job against the rewritten URL, and is pumped to completion while every
//! job event is translated into the matching client [`Reply`]. Stat and
//! listing records are rewritten back into the requested namespace on the way
//! through; everything else is relayed verbatim.

pub mod error;
pub mod policy;
pub mod reply;
pub mod worker;

pub use error::{ForwardError, ForwardResult};
pub use policy::{RequestContext, RewritePolicy, rewrite_entry};
pub use reply::{ClientChannel, Reply};
pub use worker::Forwarder;
