//! HTTP routes for the gateway

pub mod gateway;
pub mod health;

pub use gateway::{
    cors_preflight, error_response, full_body, handle_gateway_request, json_response, match_route,
    read_input, BoxError, GatewayRoute,
};
pub use health::{health_check, version_info};
