//! Document pipeline: combines heterogeneous submission files into one
//! normalized PDF, renders page images for on-screen annotation, and
//! produces the final annotated feedback document.
//!
//! Byte-level PDF work lives behind [`renderer::PdfBackend`]; this crate
//! owns the orchestration: staleness, blank-placeholder detection, the
//! poll-based conversion boundary, page naming and ordering, and the
//! copy-on-publish snapshot of annotated pages.

pub mod combine;
pub mod converter;
pub mod error;
pub mod feedback;
pub mod pages;
pub mod renderer;
pub mod storage;

pub use error::DocumentError;
