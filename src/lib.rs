pub mod app;
pub mod config;
pub mod descriptor;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod process;
pub mod store;
pub mod table;
pub mod transport;
