//! Ports - Domain interfaces for external collaborators
//!
//! The export pipeline consumes the primary document store, the remote
//! bucket service, the auxiliary data service and the authorization policy.
//! The HTTP edge adds a session validator. Infrastructure adapters implement these contracts;
//! tests mock them.

pub mod gat;
pub mod requests;

pub use gat::*;
pub use requests::*;

// Re-export GAT traits as main interfaces
pub use gat::{
    AuxDataServiceGat as AuxDataService, DocumentStoreGat as DocumentStore,
    RemoteBucketClientGat as RemoteBucketClient,
};

/// Policy decision point consulted by the authorization gate.
///
/// Evaluated synchronously before any backend I/O. Implementations receive
/// the identifiers extracted up front and must not depend on the request body.
pub trait AuthorizationPolicy: Send + Sync {
    /// Whether `request` may read data of every user in `target_user_ids`
    fn authorize(&self, request: &AuthRequest, target_user_ids: &[String]) -> bool;
}

impl<P: AuthorizationPolicy + ?Sized> AuthorizationPolicy for std::sync::Arc<P> {
    fn authorize(&self, request: &AuthRequest, target_user_ids: &[String]) -> bool {
        (**self).authorize(request, target_user_ids)
    }
}

/// Resolves a session credential to the user it was issued to.
///
/// The only source of [`AuthRequest::caller_id`]: identity headers sent by
/// the client are never trusted on their own.
pub trait SessionValidator: Send + Sync {
    /// Owner of `token`, or `None` when the token is unknown or revoked
    fn resolve(&self, token: &str) -> Option<String>;
}

impl<V: SessionValidator + ?Sized> SessionValidator for std::sync::Arc<V> {
    fn resolve(&self, token: &str) -> Option<String> {
        (**self).resolve(token)
    }
}

/// Time provider port (for testability)
pub trait TimeProvider: Send + Sync {
    /// Current instant
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
