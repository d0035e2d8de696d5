//! Request and response types exchanged between the host and resources.

pub mod request;
pub mod response;

pub use request::{HeaderVec, ParamVec, Request, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS};
pub use response::{status_reason, Response};
