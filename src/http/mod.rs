//! HTTP protocol layer module
//!
//! Protocol-level helpers shared by the file responder and the upload
//! handler: cache validators, content types, status bodies, and response
//! builders.

pub mod body;
pub mod cache;
pub mod mime;
pub mod response;
pub mod status;

// Re-export commonly used types
pub use response::{
    build_304_response, build_403_response, build_404_response, build_405_response,
    build_500_response, build_options_response, build_redirect_response, build_upload_response,
};
pub use body::ResponseBody;
pub use status::ApiStatus;
