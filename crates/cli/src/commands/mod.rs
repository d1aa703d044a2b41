pub mod config_cmd;
pub mod context;
pub mod ingest;
pub mod lecture;
pub mod search;
pub mod verify;
