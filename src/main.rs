use clap::Parser;
use slate::cancel::CancelToken;
use slate::cli::{self, output::OutputMode, Cli};
use slate::config::{AppConfig, LoggingConfig};
use tokio::signal;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_file(&cli.config, cli.config.parent())?;
    init_logging(&config.logging);

    let mode = OutputMode::from_json_flag(cli.json);
    let cancel = CancelToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        })
    };

    // The pipeline is CPU-bound; keep it off the async workers
    let command = cli.command;
    let result = tokio::task::spawn_blocking(move || cli::execute(command, config, mode, &cancel)).await?;

    watcher.abort();
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

/// `RUST_LOG` wins; otherwise the configured level
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(config));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn configured_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(&config.level)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level_is_used_verbatim() {
        let config = LoggingConfig { level: "info".to_string(), json: false };
        assert_eq!(configured_filter(&config).to_string(), "info");
    }
}
