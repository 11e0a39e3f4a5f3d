pub mod config;
pub mod errors;
pub mod files;
pub mod remote;
pub mod sync;
