//! Boot sequence for the worker binary.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use ferry_config::WorkerConfig;
use ferry_forward::{ClientChannel, Forwarder};
use ferry_jobs::JobBackend;
use ferry_jobs_local::LocalFsBackend;
use ferry_telemetry::{LogFormat, LoggingConfig};

use crate::error::{AppError, AppResult};
use crate::policy::MountPolicy;
use crate::transport::{StdioChannel, dispatch};

/// Entry point for the worker boot sequence.
///
/// Configuration comes from the first command line argument when given,
/// falling back to the path named by `FERRY_CONFIG`.
///
/// # Errors
///
/// Returns an error when configuration, telemetry, or the transport fails;
/// per-operation failures are reported to the client instead.
pub async fn run_app() -> AppResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ferry_config::load_config(Path::new(&path))
            .map_err(|err| AppError::config("load_config", err))?,
        None => {
            ferry_config::load_from_env().map_err(|err| AppError::config("load_from_env", err))?
        }
    };

    let format = config
        .logging
        .format
        .as_deref()
        .map_or_else(LogFormat::infer, LogFormat::from_name);
    let logging = LoggingConfig {
        level: &config.logging.level,
        format,
        build_id: env!("CARGO_PKG_VERSION"),
    };
    ferry_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("init_logging", err))?;

    info!(
        scheme = %config.scheme,
        mounts = config.mounts.len(),
        build = ferry_telemetry::build_id(),
        "Ferry worker starting"
    );

    let channel = Arc::new(StdioChannel::new());
    let forwarder = build_forwarder(&config, Arc::clone(&channel) as Arc<dyn ClientChannel>);
    serve(&forwarder, &channel).await
}

/// Assemble the forwarder for a configuration, over the local backend.
#[must_use]
pub(crate) fn build_forwarder(
    config: &WorkerConfig,
    channel: Arc<dyn ClientChannel>,
) -> Forwarder {
    let policy = Arc::new(MountPolicy::from_config(config));
    let backend: Arc<dyn JobBackend> = Arc::new(LocalFsBackend::new());
    Forwarder::new(config.scheme.clone(), policy, backend, channel)
}

async fn serve(forwarder: &Forwarder, channel: &StdioChannel) -> AppResult<()> {
    loop {
        let request = channel
            .read_request()
            .await
            .map_err(|err| AppError::transport("read_request", err))?;
        let Some(request) = request else {
            info!("input closed, worker stopping");
            return Ok(());
        };
        dispatch(forwarder, request)
            .await
            .map_err(|err| AppError::forward("dispatch", err))?;
    }
}
