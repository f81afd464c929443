#![forbid(unsafe_code)]

pub mod assemble;
pub mod blog;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod command;
pub mod config;
pub mod enrich;
pub mod evaluate;
pub mod extract;
pub mod formats;
pub mod github;
pub mod gitlab;
pub mod hosts;
pub mod http;
pub mod llm;
pub mod logging;
pub mod normalize;
pub mod ollama;
pub mod openai;
pub mod pdf;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod sanitize;
pub mod schema;
pub mod score;
pub mod segment;
