use std::path::PathBuf;
use std::process::ExitCode;
use study_planner::application::bootstrap::bootstrap_workspace;
use study_planner::application::context::PlannerContext;
use study_planner::infrastructure::logging::{LoggingConfig, init_logging};
use tokio::signal;
use tracing::{error, info, warn};

const HOME_ENV: &str = "STUDY_PLANNER_HOME";

fn workspace_root() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(HOME_ENV))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let root = workspace_root();
    let bootstrap = match bootstrap_workspace(&root) {
        Ok(bootstrap) => bootstrap,
        Err(error) => {
            eprintln!("failed to bootstrap workspace {}: {error}", root.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = init_logging(&LoggingConfig::from(&bootstrap.config)) {
        eprintln!("failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }
    info!(
        workspace = %bootstrap.workspace_root.display(),
        config_dir = %bootstrap.config_dir.display(),
        "workspace ready"
    );

    let interval = bootstrap.config.sweep_interval();
    let user_ids = bootstrap.config.sweep_user_ids.clone();
    if user_ids.is_empty() {
        warn!("sweepUserIds is empty; the sweep will not touch any sessions");
    }

    let context = match PlannerContext::from_config(bootstrap.config) {
        Ok(context) => context,
        Err(error) => {
            error!(%error, "failed to create session store client");
            return ExitCode::FAILURE;
        }
    };

    let handle = context.sweeper().spawn(interval, user_ids);
    shutdown_signal().await;
    handle.stop().await;
    info!("sweeper shut down");
    ExitCode::SUCCESS
}
