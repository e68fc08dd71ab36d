mod handler;
mod model;

pub use handler::current_session;
pub use model::SessionResponse;
