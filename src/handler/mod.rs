//! Request handler module
//!
//! Responsible for request routing dispatch and business logic processing:
//! static file serving for reads and the upload handler for writes.

pub mod listing;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
