//! Page-image naming and ordering.
//!
//! Page images are named `image_page<N>.png` with a zero-based index. The
//! index is recovered from the filename, and display order is by parsed
//! numeric index, never lexical filename order (`image_page10.png` sorts
//! after `image_page9.png`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::StoredFile;

static PAGE_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"page(\d+)\.").unwrap());

pub fn page_image_name(page_index: usize) -> String {
    format!("image_page{}.png", page_index)
}

/// Parses the page index out of a page-image filename.
pub fn page_index(filename: &str) -> Option<usize> {
    PAGE_INDEX
        .captures(filename)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Page images in display order. Files whose name carries no page index are
/// dropped.
pub fn in_page_order(mut files: Vec<StoredFile>) -> Vec<StoredFile> {
    files.retain(|f| page_index(&f.key.filename).is_some());
    files.sort_by_key(|f| page_index(&f.key.filename));
    files
}
