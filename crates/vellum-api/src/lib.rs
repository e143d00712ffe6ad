pub mod bootstrap;
pub mod error;
pub mod routes;
pub mod state;
pub mod test_utils;

pub use bootstrap::initialize_app_state;
pub use error::{Error, Result};
pub use state::AppState;
