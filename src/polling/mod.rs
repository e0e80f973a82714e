pub mod poll_config;
pub mod poll_task;
pub mod poller;
pub mod types;
