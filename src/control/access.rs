use crate::control::{render_template, see_other, take_flash, Flash, Response};
use actix_session::Session;
use actix_web::{
    get, post,
    web::{Form, Query},
};
use anyhow::Context as AnyhowContext;
use askama::Template;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct LoginDto {
    pub login: String,
    pub password: String,
}

#[post("/login")]
async fn log_in(form: Form<LoginDto>, session: Session) -> Response {
    let expected_login = envmnt::get_or("ADMIN_LOGIN", "admin");
    let expected_password = envmnt::get_or("ADMIN_PASSWORD", "");
    if expected_password.is_empty() {
        log::warn!("ADMIN_PASSWORD is not configured, login is disabled");
        return Ok(see_other("/login?invalid"));
    }
    if form.login == expected_login && form.password == expected_password {
        session
            .insert("login", &form.login)
            .context("Unable to insert login into session")?;
        Ok(see_other("/products"))
    } else {
        log::info!("Rejected login attempt for {}", form.login);
        Ok(see_other("/login?invalid"))
    }
}

#[get("/logout")]
async fn log_out(session: Session) -> Response {
    session.clear();
    Ok(see_other("/login"))
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage {
    err: bool,
    user: Option<String>,
    flash: Vec<Flash>,
}

#[derive(Deserialize)]
struct LoginQuery {
    invalid: Option<String>,
}

#[get("/login")]
async fn login_page(q: Query<LoginQuery>, session: Session) -> Response {
    render_template(LoginPage {
        err: q.invalid.is_some(),
        user: None,
        flash: take_flash(&session),
    })
}
