// src/main.rs

use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{http, middleware::Logger, rt, web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

use taskline_assistant::app_state::AppState;
use taskline_assistant::auth::Authentication;
use taskline_assistant::completion::CompletionClient;
use taskline_assistant::config::Config;
use taskline_assistant::kv_store::{KvStore, MongoDB};
use taskline_assistant::notifier::TaskNotifier;
use taskline_assistant::task_hub::TaskHub;
use taskline_assistant::tasks::CLIENT_ID_HEADER;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let kv = match &config.mongo_uri {
        Some(uri) => {
            let mongo = MongoDB::init(uri, &config.database_name)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            KvStore::Mongo(mongo)
        }
        None => {
            warn!("MONGO_URI not set; task lists are kept in memory only");
            KvStore::memory()
        }
    };

    let hub = Arc::new(TaskHub::new(Arc::new(kv)).with_chat_idle(config.chat_idle_ttl));
    let sweeper = hub.clone();
    rt::spawn(async move {
        let mut interval = rt::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweeper.sweep();
        }
    });
    let notifier = TaskNotifier::new().start();
    let completion = CompletionClient::from_config(&config);

    let port = config.port;
    info!("Server running at http://0.0.0.0:{}", port);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .allowed_header(CLIENT_ID_HEADER)
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(AppState {
                hub: hub.clone(),
                notifier: notifier.clone(),
                completion: completion.clone(),
                config: config.clone(),
            }))
            .configure(taskline_assistant::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
