pub mod canvas;
pub mod config;
