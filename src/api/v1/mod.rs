mod credentials;
mod error;
mod handler;
mod router;

pub use error::{ApiErrorCode, recover_error};
pub use router::routes;
