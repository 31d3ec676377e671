pub mod app_state;
pub mod backend;
pub mod config;
pub mod error;
pub mod io_struct;
pub mod prompt;
pub mod request;
pub mod response;
pub mod server;
