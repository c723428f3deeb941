use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::Rejection;
use crate::security::{Admission, Claims};

/// The administrator behind an admin console request.
///
/// The route chain already verified the token; this re-checks the role so a
/// console handler cannot be reached through a route policy that forgot
/// `require_admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Admission>()
            .and_then(|admission| admission.principal.clone())
            .ok_or(Rejection::InvalidToken)?;
        if principal.is_admin {
            Ok(AdminUser(principal))
        } else {
            Err(Rejection::InsufficientRole)
        }
    }
}
