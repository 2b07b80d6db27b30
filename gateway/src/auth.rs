// Principal extraction - the upstream identity provider terminates
// authentication and forwards the principal as trusted headers.
// Unauthenticated requests are rejected here, before the ledger.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use deposit_ledger::UserId;

/// Header carrying the opaque authenticated user identity
pub const USER_HEADER: &str = "x-authenticated-user";

/// Header carrying the role claim resolved by the identity provider
pub const ROLE_HEADER: &str = "x-authenticated-role";

/// Role claim on the authenticated principal
///
/// A role attribute resolved from identity-provider claims, not a
/// hardcoded privileged email compared at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Author,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "author" => Some(Role::Author),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Author/admin privileges (operator dashboards, stats)
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Author | Role::Admin)
    }
}

/// The authenticated caller, scoped to every ledger row it touches
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

pub struct AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError)?;

        // Absent or unknown role claim degrades to plain user
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .unwrap_or(Role::User);

        Ok(Principal {
            user_id: UserId::new(user),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Principal, AuthError> {
        let (mut parts, _) = request.into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_user_header_is_rejected() {
        let request = Request::builder().uri("/account").body(()).unwrap();
        assert!(extract(request).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_user_header_is_rejected() {
        let request = Request::builder()
            .uri("/account")
            .header(USER_HEADER, "")
            .body(())
            .unwrap();
        assert!(extract(request).await.is_err());
    }

    #[tokio::test]
    async fn test_principal_defaults_to_user_role() {
        let request = Request::builder()
            .uri("/account")
            .header(USER_HEADER, "collector@example.com")
            .body(())
            .unwrap();

        let principal = extract(request).await.unwrap_or_else(|_| panic!("expected principal"));
        assert_eq!(principal.user_id.as_str(), "collector@example.com");
        assert_eq!(principal.role, Role::User);
    }

    #[tokio::test]
    async fn test_role_claim_is_honored() {
        let request = Request::builder()
            .uri("/admin/stats")
            .header(USER_HEADER, "curator@example.com")
            .header(ROLE_HEADER, "author")
            .body(())
            .unwrap();

        let principal = extract(request).await.unwrap_or_else(|_| panic!("expected principal"));
        assert_eq!(principal.role, Role::Author);
        assert!(principal.role.is_privileged());
    }

    #[tokio::test]
    async fn test_unknown_role_degrades_to_user() {
        let request = Request::builder()
            .uri("/account")
            .header(USER_HEADER, "collector@example.com")
            .header(ROLE_HEADER, "superuser")
            .body(())
            .unwrap();

        let principal = extract(request).await.unwrap_or_else(|_| panic!("expected principal"));
        assert_eq!(principal.role, Role::User);
    }
}
