pub mod response;
pub mod service_context;

pub use response::{ApiResponse, ApiResult};
pub use service_context::{service_context_middleware, service_id_for_path};
