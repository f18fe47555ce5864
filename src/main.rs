use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::middleware::TrailingSlash;
use actix_web::{web::Data, web::FormConfig, App, HttpServer};
use anyhow::Context as AnyhowContext;
use rand::{distributions, Rng};
use std::env;
use std::io::Write;
use storefront::{api, control};

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let secret_key = match envmnt::get_parse("SESSION_KEY") {
        Ok(v) => v,
        Err(envmnt::errors::EnvmntError::Missing(_)) => {
            let key = rand::thread_rng()
                .sample_iter(distributions::Alphanumeric)
                .take(64)
                .map(char::from)
                .collect::<String>();
            let mut f = std::fs::File::options().append(true).open(".env")?;
            f.write_all(format!("SESSION_KEY={key}").as_bytes())?;
            key
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to read secret key: {err}"));
        }
    };

    let admin_password: Option<String> = envmnt::get_parse("ADMIN_PASSWORD").ok();
    if admin_password.as_deref().unwrap_or("").is_empty() {
        log::warn!("ADMIN_PASSWORD is not configured, product management login is disabled");
    }

    let base_url = envmnt::get_or("UPSTREAM_API_URL", api::DEFAULT_BASE_URL);
    log::info!("Using product API at {base_url}");
    let api_client = api::ApiClient::new(&base_url)?;

    let secret_key = Key::from(secret_key.as_bytes());
    HttpServer::new(move || {
        App::new()
            .app_data(FormConfig::default().limit(256 * 1024))
            .wrap(control::SessionMiddlewareFactory {})
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_http_only(false)
                    .cookie_secure(false)
                    .build(),
            )
            .wrap(actix_web::middleware::NormalizePath::new(
                TrailingSlash::Trim,
            ))
            .app_data(Data::new(api_client.clone()))
            .service(control::index)
            .service(control::access::login_page)
            .service(control::access::log_in)
            .service(control::access::log_out)
            .service(control::products::list)
            .service(control::products::add_page)
            .service(control::products::add_submit)
            .service(control::products::update_page)
            .service(control::products::update_submit)
            .service(control::products::delete_page)
            .service(control::products::delete_submit)
            .service(control::products::detail)
            .default_service(actix_web::web::route().to(control::not_found))
    })
    .bind(("0.0.0.0", 8080))
    .context("Failed to bind server to 0.0.0.0:8080. Is the port already in use?")?
    .run()
    .await?;
    Ok(())
}
