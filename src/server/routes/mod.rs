mod health;
mod index;
mod proxy;

pub use health::*;
pub use index::*;
pub use proxy::*;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}
