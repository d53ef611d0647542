//! Virtual try-on pipeline.
//!
//! Provider adapters over heterogeneous generative backends, the ordered
//! provider chain, blob store clients, the garment fetcher, collaborator
//! traits for the catalog and history stores, and the orchestrator that
//! ties them together into one never-failing run.

pub mod blob;
pub mod chain;
pub mod config;
pub mod error;
pub mod garment;
pub mod orchestrator;
pub mod provider;
pub mod store;

pub use chain::ProviderChain;
pub use error::{ProviderError, ProviderFailure, StorageError, StoreError, TryOnError};
pub use orchestrator::{TryOnOrchestrator, TryOnRequest};
