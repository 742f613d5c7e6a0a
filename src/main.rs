mod app;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use app::App;
use tether::model::config::AppConfig;

fn main() -> Result<()> {
    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "tether")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "tether.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info"));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    tracing::info!("tether starting: {}", args.join(" "));

    let config = AppConfig::load()?;
    let mut app = App::new(config);

    let result = app.run(&args);
    if let Err(e) = &result {
        tracing::error!("{e:#}");
        eprintln!("tether error: {e:#}");
    }

    // Flush the log before a non-zero exit skips destructors.
    drop(_guard);
    if result.is_err() {
        std::process::exit(1);
    }

    Ok(())
}
