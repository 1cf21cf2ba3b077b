use diecast_vault::{AppState, Config, Credentials, MediaStore, Migrator, build_router, seed};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.max_connections(config.max_connections)
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;
    Migrator::up(&db, None).await?;

    if config.seed_data {
        seed::run(&db).await?;
    }

    let credentials = match &config.admin_password_hash {
        Some(hash) => Credentials::from_hash(&config.admin_username, hash)
            .map_err(|err| format!("ADMIN_PASSWORD_HASH is not a valid argon2 hash: {err}"))?,
        None => Credentials::new(&config.admin_username, config.admin_password.as_deref())
            .map_err(|err| format!("could not hash ADMIN_PASSWORD: {err}"))?,
    };
    if !credentials.login_enabled() {
        tracing::warn!("ADMIN_PASSWORD is not set; nobody will be able to log in");
    }

    let media = MediaStore::new(&config.media_root);
    media.ensure_root().await?;
    tracing::info!(media_root = %config.media_root.display(), "Serving uploaded images");

    let app = build_router(AppState::new(db, credentials, media));

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(address = %config.bind_addr, "Diecast Vault listening");
    axum::serve(listener, app).await?;

    Ok(())
}
