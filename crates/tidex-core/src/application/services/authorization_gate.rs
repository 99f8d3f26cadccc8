//! Synchronous authorization pre-check

use tracing::{debug, warn};

use crate::{
    application::{ApplicationError, ApplicationResult},
    domain::ports::{AuthRequest, AuthorizationPolicy},
};

/// Thin adapter over the external policy with an ownership shortcut
#[derive(Debug, Clone)]
pub struct AuthorizationGate<P> {
    policy: P,
}

impl<P: AuthorizationPolicy> AuthorizationGate<P> {
    /// Gate backed by `policy`
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Callers reading only their own data are authorized without
    /// consulting the policy.
    pub fn authorize(&self, request: &AuthRequest, target_user_ids: &[String]) -> bool {
        if let ([target], Some(caller)) = (target_user_ids, request.caller_id.as_deref())
            && target == caller
        {
            debug!(trace_id = %request.trace_id, user_id = %caller, "owner access");
            return true;
        }

        self.policy.authorize(request, target_user_ids)
    }

    /// [`authorize`](Self::authorize) as a `Forbidden` error
    pub fn check(&self, request: &AuthRequest, target_user_ids: &[String]) -> ApplicationResult<()> {
        if self.authorize(request, target_user_ids) {
            return Ok(());
        }

        warn!(
            trace_id = %request.trace_id,
            caller = request.caller_id.as_deref().unwrap_or("anonymous"),
            targets = ?target_user_ids,
            "access denied"
        );
        Err(ApplicationError::Forbidden(format!(
            "{} {} is not allowed",
            request.method, request.path
        )))
    }
}
