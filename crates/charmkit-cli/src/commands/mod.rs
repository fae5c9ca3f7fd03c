pub mod config;
pub mod unpack;
