//! Export rendering: the document boundary behind `/export-docx` and
//! `/export-pdf`.
//!
//! Document engines (docx, PDF) are external collaborators, so the endpoints
//! depend only on the [`DocumentRenderer`] capability. The bundled
//! [`PlainTextRenderer`] emits UTF-8 text with the right download headers;
//! a real docx/pdf engine slots in as another trait implementation.
//!
//! Rendered documents are spooled to a process-scoped temp directory
//! ([`ExportSpool`]) so a re-download of the same analysis streams the file
//! instead of re-rendering. The spool dies with the process, like the
//! analysis store it mirrors.

use crate::output::Proposal;
use crate::store::StoredAnalysis;
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

/// Renders a finished analysis into a downloadable document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, url: &str, proposal: &Proposal) -> Vec<u8>;
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
}

/// UTF-8 text rendering: a subject line, the target URL, and the proposal.
pub struct PlainTextRenderer {
    extension: &'static str,
}

impl PlainTextRenderer {
    /// Renderer serving the docx export slot.
    pub fn docx() -> Self {
        Self { extension: "docx.txt" }
    }

    /// Renderer serving the pdf export slot.
    pub fn pdf() -> Self {
        Self { extension: "pdf.txt" }
    }
}

impl DocumentRenderer for PlainTextRenderer {
    fn render(&self, url: &str, proposal: &Proposal) -> Vec<u8> {
        let mut out = String::with_capacity(proposal.text.len() + 128);
        out.push_str("Advertising proposal\n");
        out.push_str("Website: ");
        out.push_str(url);
        out.push_str("\n\n");
        out.push_str(&proposal.text);
        out.push('\n');
        out.into_bytes()
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        self.extension
    }
}

/// Temp-directory cache of rendered exports, keyed by analysis id and
/// extension.
pub struct ExportSpool {
    dir: TempDir,
}

impl ExportSpool {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    fn path_for(&self, id: Uuid, extension: &str) -> PathBuf {
        self.dir.path().join(format!("{id}.{extension}"))
    }

    /// Serve from the spool, rendering and caching on the first request.
    pub async fn fetch(
        &self,
        id: Uuid,
        analysis: &StoredAnalysis,
        renderer: &dyn DocumentRenderer,
    ) -> io::Result<Vec<u8>> {
        let path = self.path_for(id, renderer.file_extension());
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("export spool hit for {id}");
                Ok(bytes)
            }
            Err(_) => {
                let bytes = renderer.render(&analysis.url, &analysis.proposal);
                tokio::fs::write(&path, &bytes).await?;
                debug!("export spool miss for {id}; rendered {} bytes", bytes.len());
                Ok(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Language;

    fn sample() -> StoredAnalysis {
        StoredAnalysis {
            url: "https://example.com/".into(),
            proposal: Proposal {
                text: "Dear owner, your sidebar is free.".into(),
                language: Language::En,
            },
        }
    }

    #[test]
    fn plain_text_rendering_includes_url_and_body() {
        let renderer = PlainTextRenderer::pdf();
        let analysis = sample();
        let bytes = renderer.render(&analysis.url, &analysis.proposal);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("https://example.com/"));
        assert!(text.contains("sidebar is free"));
    }

    #[tokio::test]
    async fn spool_caches_after_first_render() {
        let spool = ExportSpool::new().unwrap();
        let renderer = PlainTextRenderer::docx();
        let id = Uuid::new_v4();
        let analysis = sample();

        let first = spool.fetch(id, &analysis, &renderer).await.unwrap();
        let second = spool.fetch(id, &analysis, &renderer).await.unwrap();
        assert_eq!(first, second);

        let path = spool.path_for(id, renderer.file_extension());
        assert!(path.exists());
    }
}
