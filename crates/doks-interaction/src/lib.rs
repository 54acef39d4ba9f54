//! Remote service adapters for the DoksAI client.

pub mod rag_api_client;

pub use rag_api_client::RagApiClient;
