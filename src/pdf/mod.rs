//! PDF metadata module

pub mod metadata;
pub mod xmp;

// Re-export commonly used items
pub use metadata::{apply_metadata, read_info, DocumentMetadata, PdfInfo, CREATOR, PRODUCER};
pub use xmp::build_packet;
