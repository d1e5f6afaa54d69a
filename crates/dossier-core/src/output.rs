use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    ports::ReportSink,
    report::{render_json, render_markdown, Report},
    Result,
};

/// Which report files to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    All,
}

impl ReportFormat {
    fn json(self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::All)
    }

    fn markdown(self) -> bool {
        matches!(self, ReportFormat::Markdown | ReportFormat::All)
    }
}

/// Writes report files into an existing directory.
///
/// Creating the directory is the caller's job.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReportSink for DirectorySink {
    async fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, contents.as_bytes()).await?;
        Ok(path)
    }
}

/// Render `report` in the requested formats and hand each file to `sink`.
pub async fn write_reports(
    report: &Report,
    format: ReportFormat,
    sink: &dyn ReportSink,
) -> Result<Vec<PathBuf>> {
    let base = format!("deal_{}", report.deal_id);
    let mut written = Vec::new();

    if format.json() {
        let path = sink
            .write(&format!("{base}.json"), &render_json(report)?)
            .await?;
        tracing::info!(path = %path.display(), "JSON report saved");
        written.push(path);
    }
    if format.markdown() {
        let path = sink
            .write(&format!("{base}.md"), &render_markdown(report))
            .await?;
        tracing::info!(path = %path.display(), "Markdown report saved");
        written.push(path);
    }

    Ok(written)
}
