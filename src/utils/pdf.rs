// Text layer for extracted documents. Rendering is delegated to `pdf-extract`;
// keep this module a thin wrapper over it.

use anyhow::{anyhow, Context};
use tracing::{debug, warn};

/// Page separator used when joining per-page text.
pub const PAGE_BREAK: char = '\u{0C}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayer {
    pub pages: Vec<String>,
}

impl TextLayer {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// False for image-only documents such as scans.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.trim().is_empty())
    }

    /// All pages joined by form feeds, the way `pdftotext` separates them.
    pub fn joined(&self) -> String {
        let sep = PAGE_BREAK.to_string();
        self.pages.join(&sep)
    }
}

/// Extracts per-page text from a PDF held in memory.
pub fn extract_text_layer(bytes: &[u8]) -> anyhow::Result<TextLayer> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .context("failed to extract text from PDF bytes using pdf-extract")?;
    debug!(target: "pdf", pages = pages.len(), "Text layer extracted");
    Ok(TextLayer { pages })
}

/// Runs [`extract_text_layer`] on the blocking pool. `pdf-extract` can panic on
/// malformed input; that surfaces here as an error instead of taking the
/// server down.
pub async fn extract_text_layer_blocking(bytes: Vec<u8>) -> anyhow::Result<TextLayer> {
    match tokio::task::spawn_blocking(move || extract_text_layer(&bytes)).await {
        Ok(res) => res,
        Err(join_err) => {
            warn!(target: "pdf", "PDF text extraction task failed: {}", join_err);
            Err(anyhow!("PDF text extraction aborted: {}", join_err))
        }
    }
}
