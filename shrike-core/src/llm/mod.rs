//! HTTP clients for the model-serving backends

mod client;
mod embed;
mod score;
mod vector;

pub use client::{extract_json, ChatClient};
pub use embed::HttpEmbedder;
pub use score::{HttpRerankScorer, LazyRerankScorer};
pub use vector::QdrantIndex;
