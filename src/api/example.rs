//! Example endpoint.

use super::{success, ApiResult};
use crate::models::ExampleMessage;

/// GET /api/example - Liveness of the API router itself.
pub async fn get_example() -> ApiResult<ExampleMessage> {
    success(ExampleMessage {
        message: "Example route is working".to_string(),
    })
}
