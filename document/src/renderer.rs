//! The seam for byte-level PDF work.
//!
//! The pipeline never touches PDF internals itself; everything below the
//! page abstraction goes through [`PdfBackend`]. [`StubBackend`] is a
//! deterministic text-format backend used by the test suites.

use db::models::{annotation, feedback_comment};

use crate::error::DocumentError;

pub trait PdfBackend: Send + Sync {
    /// Concatenates source documents into one paginated document.
    fn combine(&self, sources: &[Vec<u8>]) -> Result<Vec<u8>, DocumentError>;

    fn page_count(&self, document: &[u8]) -> Result<usize, DocumentError>;

    /// Renders one page to a PNG for on-screen annotation.
    fn render_page(&self, document: &[u8], page_index: usize) -> Result<Vec<u8>, DocumentError>;

    /// Burns rotation, annotations, and anchored comments into one rendered
    /// page.
    fn apply_markup(
        &self,
        page_image: &[u8],
        rotation_degrees: i32,
        annotations: &[annotation::Model],
        comments: &[feedback_comment::Model],
    ) -> Result<Vec<u8>, DocumentError>;

    /// Renders the trailing comments section. Entries are (zero-based page
    /// index, comment text) pairs used as back-links.
    fn comments_appendix(&self, entries: &[(usize, String)]) -> Result<Vec<u8>, DocumentError>;

    /// Assembles marked-up pages (and the appendix) into the final document.
    fn assemble(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, DocumentError>;
}

const STUB_HEADER: &[u8] = b"%SPDF";
const STUB_PAGE_MARK: &[u8] = b"\n<<PAGE>>\n";

/// Text-format backend: every source document contributes one page, page
/// boundaries are explicit markers, and markup is recorded as a readable
/// prefix. Deterministic, so artifact comparisons in tests are byte-exact.
pub struct StubBackend;

impl StubBackend {
    fn pages_of(document: &[u8]) -> Vec<Vec<u8>> {
        let marker = STUB_PAGE_MARK;
        let mut pages = Vec::new();
        let mut rest = match document.strip_prefix(STUB_HEADER) {
            Some(rest) => rest,
            None => return pages,
        };
        while let Some(start) = find(rest, marker) {
            let after = &rest[start + marker.len()..];
            let end = find(after, marker).unwrap_or(after.len());
            pages.push(after[..end].to_vec());
            rest = &after[end..];
        }
        pages
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

impl PdfBackend for StubBackend {
    fn combine(&self, sources: &[Vec<u8>]) -> Result<Vec<u8>, DocumentError> {
        let mut out = STUB_HEADER.to_vec();
        for source in sources {
            out.extend_from_slice(STUB_PAGE_MARK);
            out.extend_from_slice(source);
        }
        Ok(out)
    }

    fn page_count(&self, document: &[u8]) -> Result<usize, DocumentError> {
        Ok(Self::pages_of(document).len())
    }

    fn render_page(&self, document: &[u8], page_index: usize) -> Result<Vec<u8>, DocumentError> {
        let pages = Self::pages_of(document);
        let page = pages
            .get(page_index)
            .ok_or_else(|| DocumentError::NotFound(format!("page {}", page_index)))?;
        let mut out = b"PNG:".to_vec();
        out.extend_from_slice(page);
        Ok(out)
    }

    fn apply_markup(
        &self,
        page_image: &[u8],
        rotation_degrees: i32,
        annotations: &[annotation::Model],
        comments: &[feedback_comment::Model],
    ) -> Result<Vec<u8>, DocumentError> {
        let mut out = format!(
            "MARKED[r{},a{},c{}]:",
            rotation_degrees,
            annotations.len(),
            comments.len()
        )
        .into_bytes();
        out.extend_from_slice(page_image);
        Ok(out)
    }

    fn comments_appendix(&self, entries: &[(usize, String)]) -> Result<Vec<u8>, DocumentError> {
        let mut out = String::from("APPENDIX\n");
        for (page_index, text) in entries {
            out.push_str(&format!("Page {}: {}\n", page_index + 1, text));
        }
        Ok(out.into_bytes())
    }

    fn assemble(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, DocumentError> {
        self.combine(pages)
    }
}
