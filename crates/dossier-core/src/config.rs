use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    errors::Error,
    paginator::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_DELAY},
    Result,
};

/// Typed configuration for a dossier run.
///
/// Sources, lowest precedence first: the JSON config file, a `.env` file in the
/// working directory, the process environment. The Bitrix token is only ever read
/// from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Bitrix24
    pub bitrix_url: String,
    pub bitrix_token: String,
    pub request_timeout: Duration,

    // Pagination
    pub max_pages: usize,
    pub page_delay: Duration,

    // Logging
    pub log_level: String,
    pub log_path: Option<PathBuf>,

    /// Keys taken from `.env` because the process environment lacked them.
    pub dotenv_keys: Vec<String>,
}

/// On-disk shape of `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    bitrix_url: Option<String>,
    log_level: Option<String>,
    log_path: Option<PathBuf>,
    max_pages: Option<usize>,
    page_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let dotenv_keys = apply_dotenv(Path::new(".env"));

        if !path.exists() {
            return Err(Error::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path)?;
        let mut cfg = Self::from_sources(&raw, |key| env::var(key).ok())?;
        cfg.dotenv_keys = dotenv_keys;
        Ok(cfg)
    }

    /// Build from config file contents and an environment lookup.
    pub fn from_sources(raw: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("invalid config file: {e}")))?;

        let non_empty = |s: &String| !s.trim().is_empty();

        let bitrix_token = env("BITRIX_TOKEN").filter(non_empty).ok_or_else(|| {
            Error::Config("BITRIX_TOKEN environment variable is required".to_string())
        })?;

        let bitrix_url = env("BITRIX_URL")
            .filter(non_empty)
            .or(file.bitrix_url.filter(non_empty))
            .ok_or_else(|| {
                Error::Config("bitrix_url is required (config file or BITRIX_URL)".to_string())
            })?;

        let max_pages = match env("DOSSIER_MAX_PAGES") {
            Some(v) => v.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!("DOSSIER_MAX_PAGES must be a number, got {v:?}"))
            })?,
            None => file.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
        };

        let log_level = env("DOSSIER_LOG_LEVEL")
            .filter(non_empty)
            .or(file.log_level)
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase();

        Ok(Self {
            bitrix_url: bitrix_url.trim_end_matches('/').to_string(),
            bitrix_token,
            request_timeout: Duration::from_secs(file.request_timeout_secs.unwrap_or(30)),
            max_pages,
            page_delay: file
                .page_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PAGE_DELAY),
            log_level,
            log_path: file.log_path,
            dotenv_keys: Vec::new(),
        })
    }
}

/// Sets `.env` entries the environment does not define yet; returns the keys set.
fn apply_dotenv(path: &Path) -> Vec<String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut applied = Vec::new();
    for (key, value) in dotenv_entries(&contents) {
        if env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, value);
        applied.push(key.to_string());
    }
    applied
}

/// `KEY=value` pairs of a dotenv file. Comments, blank and malformed lines are
/// skipped; an `export ` prefix and matching quotes around the value are dropped.
fn dotenv_entries(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let key = k.trim();
            let key = key.strip_prefix("export ").map_or(key, str::trim);
            (key, unquote(v.trim()))
        })
        .filter(|(k, _)| !k.is_empty())
}

fn unquote(val: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = val
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    val
}
