use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use team_chat_service::config::Config;
use team_chat_service::redis_client::RedisClient;
use team_chat_service::state::AppState;
use team_chat_service::{db, logging, routes};

fn build_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if allowed_origins.is_empty() {
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().context("load configuration")?;
    let port = config.port;

    let pool = db::init_pool(&config.database_url)
        .await
        .context("initialize database")?;
    let redis = RedisClient::from_url(&config.redis_url)
        .await
        .context("connect to redis")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .context("create upload directory")?;

    let app_state = web::Data::new(AppState::new(pool, redis, config));

    tracing::info!(port, "chat service listening");

    HttpServer::new({
        let app_state = app_state.clone();
        move || {
            App::new()
                .app_data(app_state.clone())
                .wrap(build_cors(&app_state.config.allowed_origins))
                .configure(routes::configure)
        }
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("bind port {port}"))?
    .run()
    .await
    .context("server runtime")
}
