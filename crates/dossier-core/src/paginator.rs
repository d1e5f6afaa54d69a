use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::time::sleep;

use crate::{params::Params, ports::BitrixApi};

pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);

/// Walks an offset-paginated Bitrix list method (`start` parameter).
///
/// Pagination is best-effort: a failed page ends the walk and whatever was collected
/// so far is returned. Nothing is propagated to the caller.
#[derive(Clone)]
pub struct Paginator {
    api: Arc<dyn BitrixApi>,
    page_delay: Duration,
}

impl Paginator {
    pub fn new(api: Arc<dyn BitrixApi>) -> Self {
        Self {
            api,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    /// Fixed pause between successful pages (upstream rate limit).
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub async fn fetch_all(&self, method: &str, base: &Params, max_pages: usize) -> Vec<Value> {
        let mut records = Vec::new();
        let mut params = base.clone();
        let mut start: u64 = 0;
        let mut pages = 0usize;

        loop {
            if pages >= max_pages {
                tracing::warn!(method, max_pages, "pagination limit reached");
                break;
            }

            params.put("start", start);
            let envelope = match self.api.call(method, &params).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(method, start, error = %e, "pagination failed");
                    break;
                }
            };

            let page = match envelope.get("result") {
                Some(Value::Array(items)) if !items.is_empty() => items.clone(),
                _ => {
                    tracing::debug!(method, start, received = 0, "pagination page");
                    break;
                }
            };
            tracing::debug!(method, start, received = page.len(), "pagination page");

            start += page.len() as u64;
            pages += 1;
            records.extend(page);

            if let Some(total) = envelope.get("total").and_then(Value::as_u64) {
                if start >= total {
                    break;
                }
            }

            sleep(self.page_delay).await;
        }

        records
    }
}
