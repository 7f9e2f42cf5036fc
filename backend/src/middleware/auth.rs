use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{
    models::user::{CurrentUser, UserRole},
    state::AppState,
    types::UserId,
    utils::jwt::{verify_access_token, Claims},
};

/// Verifies the bearer identity token and attaches the caller as a
/// [`CurrentUser`] extension. `sub` and `role` are trusted as issued.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (claims, user) = authenticate_request(request.headers(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

// Auth + require a staff role for session management routes
pub async fn auth_staff(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    gated(&state, request, next, UserRole::is_staff).await
}

// Auth + require the student role for redemption
pub async fn auth_student(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    gated(&state, request, next, |role| *role == UserRole::Student).await
}

// Auth + require admin role for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    gated(&state, request, next, UserRole::is_admin).await
}

async fn gated(
    state: &AppState,
    mut request: Request,
    next: Next,
    allowed: impl Fn(&UserRole) -> bool,
) -> Result<Response, StatusCode> {
    let (claims, user) = authenticate_request(request.headers(), &state.config.jwt_secret)?;
    if !allowed(&user.role) {
        tracing::debug!(user_id = %user.id, role = user.role.as_str(), "role gate refused");
        return Err(StatusCode::FORBIDDEN);
    }
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = rest.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

fn authenticate_request(
    headers: &HeaderMap,
    secret: &str,
) -> Result<(Claims, CurrentUser), StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_access_token(token, secret).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let user = current_user_from_claims(&claims).ok_or(StatusCode::UNAUTHORIZED)?;
    Ok((claims, user))
}

fn current_user_from_claims(claims: &Claims) -> Option<CurrentUser> {
    let id: UserId = claims.sub.parse().ok()?;
    let role: UserRole = claims.role.parse().ok()?;
    Some(CurrentUser::new(id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::create_access_token;
    use axum::http::HeaderValue;

    #[test]
    fn parse_bearer_token_accepts_any_case_scheme() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER   abc "), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
    }

    #[test]
    fn claims_map_to_current_user() {
        let id = UserId::new();
        let token = create_access_token(id.to_string(), "teacher".into(), "s3cret", 1).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let (_, user) = authenticate_request(&headers, "s3cret").unwrap();
        assert_eq!(user, CurrentUser::new(id, UserRole::Teacher));
        assert_eq!(
            authenticate_request(&headers, "other").unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn unknown_role_or_malformed_subject_is_rejected() {
        let claims = Claims::new("not-a-uuid".into(), "student".into(), 1);
        assert!(current_user_from_claims(&claims).is_none());
        let claims = Claims::new(UserId::new().to_string(), "janitor".into(), 1);
        assert!(current_user_from_claims(&claims).is_none());
    }
}
