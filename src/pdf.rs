use std::path::Path;

use anyhow::Context as _;

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

pub fn is_pdf(path: &Path) -> bool {
    has_extension(path, &["pdf"])
}

pub fn is_text(path: &Path) -> bool {
    has_extension(path, &["txt", "md"])
}

/// Plain text of a résumé document. PDFs go through `pdf-extract`; text and
/// markdown files are read as is.
pub fn read_document(path: &Path) -> anyhow::Result<String> {
    let text = if is_pdf(path) {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        // pdf-extract panics on some malformed files.
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
            .map_err(|_| anyhow::anyhow!("extract text from {}: malformed pdf", path.display()))?
            .map_err(|err| anyhow::anyhow!("extract text from {}: {err}", path.display()))?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    };

    if text.trim().is_empty() {
        anyhow::bail!("no text found in {}", path.display());
    }
    tracing::debug!(path = %path.display(), chars = text.chars().count(), "document text");
    Ok(text)
}
