// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use time::macros::format_description;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{self, EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.as_str());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "https-posture-scanner", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Filter directives: `RUST_LOG` first, then `<CRATE>_LOGLEVEL`, then `default_level`
/// applied to this crate and the HTTP trace layer.
fn filter_directives(default_level: &str) -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.as_str()))
        .unwrap_or_else(|_| format!("{}={default_level},tower_http={default_level}", env!("CARGO_CRATE_NAME")))
}

/// Installs the global tracing subscriber.
///
/// # Arguments
/// * `default_level` - Level used when neither `RUST_LOG` nor `<CRATE>_LOGLEVEL` is set.
/// * `log_to_file` - Also write plain-text logs to the data directory.
pub fn initialize_logging(default_level: &str, log_to_file: bool) -> Result<()> {
    let directives = filter_directives(default_level);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::new(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_target(true)
        .with_filter(EnvFilter::new(&directives));

    let file_layer = if log_to_file {
        let directory = get_data_dir();
        std::fs::create_dir_all(&directory)?;
        let log_file = std::fs::File::create(directory.join(LOG_FILE.as_str()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_target(false)
                .with_ansi(false)
                .with_filter(EnvFilter::new(&directives)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}
