pub mod config;
pub mod crawler;
pub mod generator;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod summarizer;
pub mod utils;
