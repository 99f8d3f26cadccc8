//! GAT macro utilities for collaborator port declarations
//!
//! Every external collaborator (document store, remote bucket service,
//! auxiliary data service) is declared as a GAT trait whose methods return an
//! associated future. The `gat_port!` macro turns `async fn` signatures into
//! those declarations.
//!
//! # Example
//!
//! ```ignore
//! gat_port! {
//!     /// Fetches buckets from a remote service
//!     pub trait BucketPort {
//!         /// Fetch one series
//!         async fn fetch(&self, user_id: String) -> Vec<Bucket>;
//!     }
//! }
//! ```
//!
//! Expands to:
//!
//! ```ignore
//! pub trait BucketPort: Send + Sync {
//!     type FetchFuture<'a>: Future<Output = DomainResult<Vec<Bucket>>> + Send + 'a
//!     where Self: 'a;
//!     fn fetch(&self, user_id: String) -> Self::FetchFuture<'_>;
//! }
//! ```
//!
//! Adapters on stable Rust name the future as
//! `futures::future::BoxFuture<'a, DomainResult<T>>`.

/// Declare a GAT-based port with async fn syntax
///
/// For each `async fn method_name(...) -> T` the macro generates:
/// 1. An associated type `MethodNameFuture<'a>` resolving to `DomainResult<T>`
/// 2. A method `fn method_name(...)` returning that future type
///
/// The trait gets `Send + Sync` supertraits and every future is `Send + 'a`,
/// so ports can be shared across spawned fetch tasks behind an `Arc`.
#[macro_export]
macro_rules! gat_port {
    (
        $(#[$trait_meta:meta])*
        $vis:vis trait $trait_name:ident {
            $(
                $(#[$method_meta:meta])*
                async fn $method:ident( $($args:tt)* ) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$trait_meta])*
        $vis trait $trait_name: ::std::marker::Send + ::std::marker::Sync {
            $(
                ::paste::paste! {
                    $(#[$method_meta])*
                    #[doc = ""]
                    #[doc = concat!("Future type for `", stringify!($method), "`")]
                    type [<$method:camel Future>]<'a>: ::std::future::Future<
                        Output = $crate::domain::DomainResult<$ret>
                    > + ::std::marker::Send + 'a
                    where
                        Self: 'a;
                }

                $(#[$method_meta])*
                fn $method( $($args)* ) -> ::paste::paste! { Self::[<$method:camel Future>]<'_> };
            )*
        }
    };
}

pub use gat_port;

#[cfg(test)]
mod tests {
    use crate::domain::{DomainError, DomainResult};
    use futures::future::BoxFuture;

    gat_port! {
        /// Port with a single lookup
        pub trait LookupPort {
            /// Find a value by key
            async fn lookup(&self, key: String) -> Option<u32>;
        }
    }

    gat_port! {
        /// Port with several methods and a failing path
        pub trait CounterPort {
            /// Current value
            async fn current(&self) -> u32;
            /// Fails when `fail` is set
            async fn checked(&self, fail: bool) -> ();
        }
    }

    struct FixedLookup;

    impl LookupPort for FixedLookup {
        type LookupFuture<'a>
            = BoxFuture<'a, DomainResult<Option<u32>>>
        where
            Self: 'a;

        fn lookup(&self, key: String) -> Self::LookupFuture<'_> {
            Box::pin(async move { Ok((key == "known").then_some(7)) })
        }
    }

    struct Counter {
        value: u32,
    }

    impl CounterPort for Counter {
        type CurrentFuture<'a>
            = BoxFuture<'a, DomainResult<u32>>
        where
            Self: 'a;

        type CheckedFuture<'a>
            = BoxFuture<'a, DomainResult<()>>
        where
            Self: 'a;

        fn current(&self) -> Self::CurrentFuture<'_> {
            Box::pin(async move { Ok(self.value) })
        }

        fn checked(&self, fail: bool) -> Self::CheckedFuture<'_> {
            Box::pin(async move {
                if fail {
                    Err(DomainError::query("checked failed"))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_gat_port_lookup() {
        let port = FixedLookup;
        assert_eq!(port.lookup("known".to_string()).await.unwrap(), Some(7));
        assert_eq!(port.lookup("other".to_string()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_gat_port_multiple_methods() {
        let port = Counter { value: 3 };
        assert_eq!(port.current().await.unwrap(), 3);
        assert!(port.checked(false).await.is_ok());
        assert!(matches!(port.checked(true).await, Err(DomainError::Query(_))));
    }

    #[tokio::test]
    async fn test_gat_port_future_is_spawnable() {
        let port = std::sync::Arc::new(Counter { value: 11 });
        let handle = tokio::spawn(async move { port.current().await });
        assert_eq!(handle.await.unwrap().unwrap(), 11);
    }
}
