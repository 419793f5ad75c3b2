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

//! Binary entrypoint for the Ferry worker.

#[tokio::main]
async fn main() {
    if let Err(err) = ferry_app::run_app().await {
        eprintln!("ferry worker failed: {err}");
        std::process::exit(1);
    }
}
