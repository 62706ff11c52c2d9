//! OpenAPI/Utoipa configuration.

use super::{FLOWS_TAG, MISC_TAG, TEST_TAG, TOKENS_TAG};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hydra Login Bridge",
        version = "0.1.0",
        description = "Login, consent, logout and device verification provider for Ory Hydra."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = FLOWS_TAG, description = "Browser redirects for Hydra challenges"),
        (name = TOKENS_TAG, description = "Device and refresh token relays"),
        (name = TEST_TAG, description = "Test-only helpers, disabled by default")
    )
)]
pub struct ApiDoc;
