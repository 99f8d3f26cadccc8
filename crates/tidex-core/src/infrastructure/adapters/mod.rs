//! Infrastructure adapters implementing domain ports

pub mod generic_store;
pub mod memory_bucket_client;
pub mod memory_document_store;
pub mod permission_policy;
#[cfg(feature = "http-client")]
pub mod remote_bucket_client;
pub mod session_table;

pub use generic_store::InMemoryStore;
pub use memory_bucket_client::MemoryBucketClient;
pub use memory_document_store::MemoryDocumentStore;
pub use permission_policy::PermissionTable;
pub use session_table::SessionTable;
#[cfg(feature = "http-client")]
pub use remote_bucket_client::HttpBucketClient;
