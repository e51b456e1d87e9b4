use std::{path::Path, time::Duration};

use actix_web::{
    dev::Server,
    guard,
    http::KeepAlive,
    middleware::{DefaultHeaders, Logger},
    web,
    App,
    HttpServer,
};
use log::*;
use open_banking_engine::{
    events::{audit_channel, AuditEvent, EventProducer},
    BankingApi,
    ConsentApi,
    OAuthApi,
    SqliteDatabase,
    TppApi,
};

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::{form_error_handler, json_error_handler, path_error_handler, query_error_handler, ServerError},
    helpers::INTERACTION_ID_HEADER,
    middleware::InteractionTracerFactory,
    routes::{
        health,
        not_found,
        openapi_json,
        preflight,
        AccountDetailRoute,
        AccountsRoute,
        AuthoriseConsentRoute,
        AuthorizeRoute,
        BalancesRoute,
        CreateConsentRoute,
        FundsConfirmationRoute,
        GetConsentRoute,
        InitiatePaymentRoute,
        PaymentRoute,
        PaymentStatusRoute,
        RegisterTppRoute,
        RevokeConsentRoute,
        TokenRoute,
        TransactionsRoute,
    },
};

/// How long the audit queue is given to drain once the server has stopped.
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    prepare_database_dir(&config.database_url)?;
    let db = SqliteDatabase::new_with_timeout(&config.database_url, config.db_max_connections, config.db_timeout)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database ready at {}", config.database_url);

    let (audit_handler, audit_producer) = audit_channel(db.clone(), config.audit_buffer_size);
    let audit_task = tokio::spawn(audit_handler.start_handler());
    info!("🧾️ Audit queue started (capacity {})", config.audit_buffer_size);

    let srv = create_server_instance(config, db, audit_producer)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));

    // The server has dropped every producer by now, so the handler finishes once the queue is empty
    match tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_task).await {
        Ok(Ok(())) => info!("🧾️ Audit queue drained"),
        Ok(Err(e)) => error!("🧾️ The audit task failed. {e}"),
        Err(_) => warn!("🧾️ Gave up waiting for the audit queue to drain. Some records may be lost."),
    }
    result
}

/// SQLite creates the database file on demand, but not the directory it lives in.
fn prepare_database_dir(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    audit: EventProducer<AuditEvent>,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let options = ServerOptions::from_config(&config);
        App::new()
            .configure(|cfg| configure_gateway(cfg, db.clone(), &config))
            .wrap(InteractionTracerFactory::new(audit.clone(), options))
            .wrap(cors_headers())
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %r").log_target("obg::access_log"))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers the APIs, extractor configuration and every route of the gateway on `cfg`.
///
/// Split out from [`create_server_instance`] so that tests can mount exactly the same application.
pub fn configure_gateway(cfg: &mut web::ServiceConfig, db: SqliteDatabase, config: &ServerConfig) {
    let tpp_api = TppApi::new(db.clone()).with_default_rate_limit(config.default_rate_limit);
    let consent_api = ConsentApi::new(db.clone());
    let oauth_api = OAuthApi::new(db.clone()).with_code_ttl(config.auth_code_ttl);
    let banking_api = BankingApi::new(db);
    let token_issuer = TokenIssuer::new(&config.auth);
    cfg.app_data(web::Data::new(tpp_api))
        .app_data(web::Data::new(consent_api))
        .app_data(web::Data::new(oauth_api))
        .app_data(web::Data::new(banking_api))
        .app_data(web::Data::new(token_issuer))
        .app_data(web::PayloadConfig::new(config.max_body_bytes))
        .app_data(web::JsonConfig::default().limit(config.max_body_bytes).error_handler(json_error_handler))
        .app_data(web::FormConfig::default().limit(config.max_body_bytes).error_handler(form_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(health)
        .service(web::resource(vec!["/openapi.json", "/spec"]).route(web::get().to(openapi_json)))
        .service(RegisterTppRoute::<SqliteDatabase>::new())
        .service(AuthorizeRoute::<SqliteDatabase, SqliteDatabase>::new())
        .service(TokenRoute::<SqliteDatabase, SqliteDatabase>::new())
        .service(AccountsRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(AccountDetailRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(TransactionsRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(BalancesRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(InitiatePaymentRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(PaymentRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(PaymentStatusRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
        .service(FundsConfirmationRoute::<SqliteDatabase, SqliteDatabase>::new())
        .service(CreateConsentRoute::<SqliteDatabase>::new())
        .service(GetConsentRoute::<SqliteDatabase>::new())
        .service(RevokeConsentRoute::<SqliteDatabase>::new())
        .service(AuthoriseConsentRoute::<SqliteDatabase>::new())
        .service(web::resource("/{tail:.*}").guard(guard::Options()).to(preflight))
        .default_service(web::to(not_found));
}

/// Fully open CORS, with the interaction id readable by browser clients.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Expose-Headers", INTERACTION_ID_HEADER))
}
