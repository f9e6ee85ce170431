pub mod compact;
pub mod config_cmd;
pub mod context;
pub mod estimate;
