use anyhow::Result;
use aws_config::BehaviorVersion;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod jwt;
mod mailer;
mod middleware;
mod models;
mod oauth;
mod repositories;
mod routes;
mod storage;
mod validation;

use sqlx::PgPool;

use crate::{
    jwt::JwtService,
    mailer::Mailer,
    oauth::OAuthClient,
    repositories::{CustomerRepository, LabelRepository, TokenRepository},
    storage::ObjectStorage,
};

/// Application state shared across handlers
///
/// Every service handle is constructed once at startup and injected;
/// nothing lives in module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub customer_repository: CustomerRepository,
    pub label_repository: LabelRepository,
    pub token_repository: TokenRepository,
    pub storage: ObjectStorage,
    pub mailer: Mailer,
    pub oauth_client: OAuthClient,
    pub frontend_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting MoveOut service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Apply pending migrations
    sqlx::migrate!().run(&pool).await?;

    // Initialize the session token service
    let jwt_service = JwtService::new(jwt::JwtConfig::from_env()?);

    // Initialize the object storage gateway
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let storage = ObjectStorage::new(s3_client, storage::StorageConfig::from_env()?);

    // Initialize the mail gateway and OAuth client
    let mailer = Mailer::new(mailer::MailConfig::from_env()?);
    let oauth_client = OAuthClient::new_google(oauth::OAuthConfig::from_env()?)?;

    let frontend_url = std::env::var("FRONTEND_URL")
        .map_err(|_| anyhow::anyhow!("FRONTEND_URL environment variable not set"))?
        .trim_end_matches('/')
        .to_string();

    let customer_repository = CustomerRepository::new(pool.clone());
    let label_repository = LabelRepository::new(pool.clone());
    let token_repository = TokenRepository::new(pool.clone());

    let app_state = AppState {
        db_pool: pool,
        jwt_service,
        customer_repository,
        label_repository,
        token_repository,
        storage,
        mailer,
        oauth_client,
        frontend_url,
    };

    info!("MoveOut service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("MoveOut service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
