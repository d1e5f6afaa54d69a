/// Core error type for the dossier pipeline.
///
/// Adapter crates map their specific errors into this type so the aggregator can
/// treat every failed call the same way (abort the run, keep partial data).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{method}: http status {status}: {body}")]
    Http {
        method: String,
        status: u16,
        body: String,
    },

    #[error("{method}: transport error: {reason}")]
    Transport { method: String, reason: String },

    #[error("{method}: api error {code}: {description}")]
    Api {
        method: String,
        code: String,
        description: String,
    },

    #[error("activity #{index}: invalid CREATED value {value:?}: {reason}")]
    TimelineDate {
        index: usize,
        value: String,
        reason: String,
    },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
