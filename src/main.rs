mod config;
mod error;
mod extract;
mod handler;
mod middleware;
mod model;
mod password;
mod route;
mod schema;
mod store;
mod token;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    password::PasswordHasher,
    route::{cors_layer, create_router},
    store::{TodoStore, UserStore},
    token::TokenIssuer,
};

// Struct representing the application state
pub struct AppState {
    users: UserStore,
    todos: TodoStore,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
}

// Entry point of the application
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // The signing key is required; refuse to start without it
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(origins = ?config.allowed_origins, "CORS origins configured");

    let pool = match store::connect(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect to the database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = store::init_schema(&pool).await {
        tracing::error!("Failed to create tables: {e}");
        std::process::exit(1);
    }

    let app_state = Arc::new(AppState {
        users: UserStore::new(pool.clone(), config.store_timeout),
        todos: TodoStore::new(pool, config.store_timeout),
        tokens: TokenIssuer::new(config.secret_key.as_bytes()),
        hasher: PasswordHasher::new(config.bcrypt_cost),
    });

    let app = create_router(app_state)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    tracing::info!("listening on {}", config.listen_addr);

    let server = match axum::Server::try_bind(&config.listen_addr) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve(app.into_make_service()).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
