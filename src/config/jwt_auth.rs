use crate::service::Actor;
use crate::util::token;
use crate::AppState;
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::{dev::Payload, web, Error as ActixWebError};
use actix_web::{http, FromRequest, HttpRequest};
use log::error;
use serde::Serialize;
use std::fmt;
use std::fmt::Formatter;
use std::future::{ready, Ready};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    status: String,
    message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(f, "{}", self.message),
        }
    }
}

fn unauthorized(message: impl Into<String>) -> ActixWebError {
    ErrorUnauthorized(ErrorResponse {
        status: "failed".to_string(),
        message: message.into(),
    })
}

/// Identity of the caller, taken from the `access_token` cookie or a bearer
/// `Authorization` header.
pub struct JwtMiddleware {
    pub actor: Actor,
}

impl FromRequest for JwtMiddleware {
    type Error = ActixWebError;
    type Future = Ready<Result<Self, Self::Error>>;
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Some(data) = req.app_data::<web::Data<AppState>>() else {
            error!("Application state is missing from the request");
            return ready(Err(ErrorInternalServerError(ErrorResponse {
                status: "error".to_string(),
                message: "Server is misconfigured".to_string(),
            })));
        };

        let access_token = req
            .cookie("access_token")
            .map(|c| c.value().to_string())
            .or_else(|| {
                req.headers()
                    .get(http::header::AUTHORIZATION)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .map(str::to_string)
            });

        let Some(access_token) = access_token else {
            return ready(Err(unauthorized("You are not logged in, please provide token")));
        };

        match token::verify_jwt_token(&data.config.jwt_secret, &access_token) {
            Ok(user_id) => ready(Ok(JwtMiddleware {
                actor: Actor {
                    user_id,
                    is_admin: data.config.is_admin(user_id),
                },
            })),
            Err(e) => ready(Err(unauthorized(e.to_string()))),
        }
    }
}
