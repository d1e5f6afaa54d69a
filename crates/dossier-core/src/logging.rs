use std::{fs, path::Path};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{errors::Error, Result};

const LOG_FILE_NAME: &str = "app.log";

/// Initialize tracing for the dossier CLI.
///
/// Console output always; with `log_dir` an extra plain-text layer appends to
/// `<log_dir>/app.log`. `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<()> {
    let directive = normalize_level(level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,dossier={directive},dossier_core={directive},dossier_bitrix={directive}"
        ))
    });

    let (file_layer, file_error) = match log_dir.map(open_log_file).transpose() {
        Ok(file) => (
            file.map(|f| fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(f))),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))?;

    if let (Some(dir), Some(e)) = (log_dir, file_error) {
        tracing::warn!(dir = %dir.display(), error = %e, "file logging disabled");
    }
    Ok(())
}

fn open_log_file(dir: &Path) -> Result<fs::File> {
    fs::create_dir_all(dir)?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;
    Ok(file)
}

/// Accept the level names people carry over from other loggers.
fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        "off" => "off",
        _ => "info",
    }
}
