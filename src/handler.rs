use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    error::AppError,
    extract::{JsonBody, PathParam},
    model::CurrentUser,
    schema::{
        validate_title, CreateTodoSchema, CredentialsSchema, DetailResponse, RegisterResponse,
        TokenResponse, UpdateTodoSchema,
    },
    token::ACCESS_TOKEN_TTL,
    AppState,
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "Multi-user todo API with Rust, SQLX, SQLite, and Axum";

    let json_response = serde_json::json!({
        "status": "success",
        "message": MESSAGE
    });

    Json(json_response)
}

pub async fn register(
    State(data): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CredentialsSchema>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    // Cheap early exit; the UNIQUE constraint still decides races.
    if data.users.find_by_username(&body.username).await?.is_some() {
        tracing::info!(username = %body.username, "registration rejected: username taken");
        return Err(AppError::DuplicateUser);
    }

    let password_hash = data.hasher.hash_async(body.password).await?;
    let id = data.users.create(&body.username, &password_hash).await?;
    tracing::info!(user_id = id, username = %body.username, "user registered");

    Ok(Json(RegisterResponse {
        id,
        username: body.username,
    }))
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CredentialsSchema>,
) -> Result<impl IntoResponse, AppError> {
    // Unknown user and wrong password produce the same error.
    let Some(user) = data.users.find_by_username(&body.username).await? else {
        tracing::warn!(username = %body.username, "login failed");
        return Err(AppError::InvalidCredentials);
    };

    let valid = data
        .hasher
        .verify_async(body.password, user.password_hash)
        .await?;
    if !valid {
        tracing::warn!(username = %user.username, "login failed");
        return Err(AppError::InvalidCredentials);
    }

    let token = data.tokens.issue(&user.username, ACCESS_TOKEN_TTL)?;
    tracing::info!(user_id = user.id, "login succeeded");

    Ok(Json(TokenResponse::bearer(token)))
}

// Handler for getting all Todo items of the caller
pub async fn get_todos(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let todos = data.todos.list_for_owner(user.id).await?;
    Ok(Json(todos))
}

// Handler for creating a new Todo owned by the caller
pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody<CreateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    validate_title(&body.title)?;

    let todo = data
        .todos
        .create(user.id, &body.title, body.completed)
        .await?;
    tracing::info!(username = %user.username, todo_id = todo.id, "todo created");

    Ok(Json(todo))
}

// Handler for updating a Todo by ID
pub async fn update_todo(
    PathParam(id): PathParam<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody<UpdateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    validate_title(&body.title)?;

    data.todos
        .find_by_id_and_owner(id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    let todo = data
        .todos
        .update(id, user.id, &body.title, body.completed)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = user.id, todo_id = id, "todo updated");

    Ok(Json(todo))
}

// Handler for deleting a Todo by ID
pub async fn delete_todo(
    PathParam(id): PathParam<i64>,
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    data.todos
        .find_by_id_and_owner(id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !data.todos.delete(id, user.id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(user_id = user.id, todo_id = id, "todo deleted");

    Ok(Json(DetailResponse {
        detail: "Todo deleted",
    }))
}
