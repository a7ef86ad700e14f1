//! Fetching source documents and extracting their text.
//!
//! * [`fetch`] — HTTP retrieval with a bounded timeout and DOM text
//!   extraction into ordered blocks.

pub mod fetch;

pub use fetch::{Document, extract_document, fetch_document};
