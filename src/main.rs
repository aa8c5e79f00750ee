// Social Media API server

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use social_media_api::{
    app_state::AppState,
    config::Config,
    routes::create_api_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Build main application router
    let app = Router::new()
        .nest("/api", create_api_router(app_state))
        .layer(
            ServiceBuilder::new().layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    println!("🚀 Social Media API starting on http://{}", addr);
    println!("📋 API Documentation:");
    println!("  POST   /api/users                     - Create user");
    println!("  GET    /api/users/{{id}}                - User profile with follow stats");
    println!("  POST   /api/users/{{id}}/follow         - Toggle follow");
    println!("  GET    /api/posts                     - List posts (?author=)");
    println!("  POST   /api/posts                     - Create post");
    println!("  GET    /api/posts/{{id}}                - Post with counts");
    println!("  POST   /api/posts/{{id}}/like           - Toggle like");
    println!("  GET    /api/posts/{{id}}/comments       - List comments");
    println!("  POST   /api/comments                  - Create comment");
    println!("  GET    /api/feed                      - Feed (?ordering=recent|popularity)");
    println!("  GET    /api/notifications             - List notifications");

    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
