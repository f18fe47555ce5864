use actix_session::Session;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    get,
    http::header::ContentType,
    FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use anyhow::anyhow;
use askama::Template;
use derive_more::{Display, Error};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use log_error::LogError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod access;
pub mod products;

pub type Response = Result<HttpResponse, ControllerError>;

const FLASH_KEY: &str = "flash";

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    NotFound,
    Unauthorized,
    #[error(ignore)]
    InternalServerError(anyhow::Error),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl actix_web::error::ResponseError for ControllerError {
    fn error_response(&self) -> HttpResponse {
        log::warn!("{self:?}\n");
        use ControllerError::*;
        match self {
            NotFound => NotFoundPage {
                user: None,
                flash: Vec::new(),
            }
            .render()
            .log_error("Unable to render error template")
            .map(|res| {
                HttpResponse::NotFound()
                    .content_type(ContentType::html())
                    .body(res)
            })
            .unwrap_or_else(|| HttpResponse::NotFound().body(())),
            Unauthorized => HttpResponse::SeeOther()
                .insert_header(("Location", "/login"))
                .body(()),
            InternalServerError(err) => InternalServerErrorPage {
                error: format!("{err:?}"),
                user: None,
                flash: Vec::new(),
            }
            .render()
            .log_error("Unable to render error template")
            .map(|res| {
                HttpResponse::InternalServerError()
                    .content_type(ContentType::html())
                    .body(res)
            })
            .unwrap_or_else(|| HttpResponse::InternalServerError().body(err.to_string())),
        }
    }
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundPage {
    user: Option<String>,
    flash: Vec<Flash>,
}

#[derive(Template)]
#[template(path = "500.html")]
pub struct InternalServerErrorPage {
    error: String,
    user: Option<String>,
    flash: Vec<Flash>,
}

/// The session-installed login of the current user. Extracting it from
/// a handler makes that route require an authenticated session.
#[derive(Clone)]
pub struct Identity {
    pub login: String,
}

impl FromRequest for Identity {
    type Error = ControllerError;
    type Future = Ready<Result<Self, Self::Error>>;

    #[inline]
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Identity>()
                .cloned()
                .ok_or(ControllerError::Unauthorized),
        )
    }
}

pub struct SessionMiddlewareFactory {}

impl<S, B: 'static> Transform<S, ServiceRequest> for SessionMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = SessionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddleware {
            service: Arc::new(service),
        }))
    }
}

pub struct SessionMiddleware<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        Box::pin(async move {
            let session = req.extract::<Session>().await?;
            match session.get::<String>("login") {
                Ok(Some(login)) => {
                    req.extensions_mut().insert(Identity { login });
                }
                Err(err) => {
                    log::error!("Unable to extract login from session:\n{err:?}");
                }
                _ => (),
            }
            let res = service.call(req).await?;
            Ok(res)
        })
    }
}

/// One-shot user feedback, stored in the session and drained on the
/// next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
}

impl FlashLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        }
    }
}

// Feedback is best-effort: a session write failure must never fail the
// action that produced the message.
pub fn push_flash(session: &Session, level: FlashLevel, text: impl Into<String>) {
    let mut queue = session
        .get::<Vec<Flash>>(FLASH_KEY)
        .log_error("Unable to read flash messages from session")
        .flatten()
        .unwrap_or_default();
    queue.push(Flash {
        level,
        text: text.into(),
    });
    if let Err(err) = session.insert(FLASH_KEY, queue) {
        log::warn!("Unable to store flash message: {err}");
    }
}

pub fn take_flash(session: &Session) -> Vec<Flash> {
    match session.remove_as::<Vec<Flash>>(FLASH_KEY) {
        Some(Ok(flash)) => flash,
        Some(Err(_)) => {
            log::warn!("Discarding undecodable flash messages");
            Vec::new()
        }
        None => Vec::new(),
    }
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .json(())
}

pub fn render_template(t: impl Template) -> Result<HttpResponse, ControllerError> {
    let result = t
        .render()
        .map_err(|x| ControllerError::InternalServerError(anyhow!(x)))?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(result))
}

#[get("/")]
pub async fn index() -> Response {
    Ok(see_other("/products"))
}

pub async fn not_found(user: Option<Identity>, session: Session) -> Response {
    render_template(NotFoundPage {
        user: user.map(|u| u.login),
        flash: take_flash(&session),
    })
}
