mod handler;
mod model;

pub use handler::ingest_client_log;
pub use model::{ClientInfo, ClientLogRequest, ClientLogResponse};
