use std::sync::Arc;

use axum::{
    extract::State,
    http::{self, Request},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, AuthError},
    model::CurrentUser,
    token::bearer_token,
    AppState,
};

/// Verifies the bearer token, resolves its subject to a stored user and
/// hands the request on with a `CurrentUser` extension.
pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let token = bearer_token(auth_header)?;
    let username = data.tokens.verify(token)?;

    let user = data
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AuthError::MissingSubject)?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
    });

    Ok(next.run(request).await)
}
