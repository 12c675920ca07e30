//! Store adapters for the Trellis application ports.

#![forbid(unsafe_code)]

mod in_memory_credential_store;
mod in_memory_identity_backend;
mod in_memory_identity_directory;
mod postgres_identity_backend;

pub use in_memory_credential_store::InMemoryCredentialStore;
pub use in_memory_identity_backend::InMemoryIdentityBackend;
pub use in_memory_identity_directory::InMemoryIdentityDirectory;
pub use postgres_identity_backend::PostgresIdentityBackend;
