pub mod add;
pub mod auth_cmd;
pub mod capabilities;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod get;
pub mod list;
pub mod status;
