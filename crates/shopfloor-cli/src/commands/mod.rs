pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod offline;
pub mod work_order;
