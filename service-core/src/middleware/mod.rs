pub mod tracing;

pub use tracing::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
