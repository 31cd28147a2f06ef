//! WeTransfer API client, service trait and wire types.

pub mod client;
pub mod service;
pub mod types;

pub use client::{ApiClient, ClientConfig, DEFAULT_SERVER};
pub use service::RemoteService;
