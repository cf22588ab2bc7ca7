//! Identity middleware. Authentication is an external collaborator: the
//! gateway forwards the verified identity through headers and this is the
//! only place that reads them.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use crate::common::{Caller, UserId, UserRole};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Populate request extensions with the `Caller`, or reject the request when
/// no usable identity was forwarded.
pub async fn identity_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = request.headers();

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| UserId::parse(value).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let name = headers
        .get(USER_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let roles: Vec<UserRole> = headers
        .get(USER_ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').filter_map(UserRole::parse).collect())
        .unwrap_or_default();

    request
        .extensions_mut()
        .insert(Caller::new(user_id, name, roles));

    Ok(next.run(request).await)
}
