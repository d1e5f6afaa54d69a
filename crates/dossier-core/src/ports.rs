use std::path::PathBuf;

use async_trait::async_trait;

use crate::{params::Params, Result};

/// Hexagonal port for the Bitrix24 REST API.
///
/// Implementations issue one GET for `method` and return the decoded response
/// envelope (`{"result": ..., "total": ...}`). Non-2xx statuses, transport failures,
/// undecodable bodies and API error envelopes are all reported as `Err`.
#[async_trait]
pub trait BitrixApi: Send + Sync {
    async fn call(&self, method: &str, params: &Params) -> Result<serde_json::Value>;
}

/// Destination for rendered report files.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Write `contents` under `file_name` and return where it landed.
    async fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf>;
}
