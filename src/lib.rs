pub mod app;
pub mod classification;
pub mod config;
pub mod directory;
pub mod epg;
pub mod errors;
pub mod models;
pub mod proxy;
pub mod sources;
pub mod utils;
pub mod web;
