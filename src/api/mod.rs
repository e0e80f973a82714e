pub mod api_client;
pub mod api_config;
pub mod dashboard;
