use actix_web::{dev::Payload, Error, FromRequest, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};

use crate::utils::jwt;

/// Admin authentifié, extrait du bearer token.
/// Présent en paramètre d'une route = route protégée; le lookup public
/// (/subscriptions/check) et /auth/login ne le demandent pas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub roll_number: String,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Extraire le header Authorization
        let auth_header = match req.headers().get("Authorization") {
            Some(header) => header,
            None => {
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Missing Authorization header"
                }));
                return ready(Err(actix_web::error::InternalError::from_response(
                    "",
                    response,
                ).into()));
            }
        };

        let auth_str = match auth_header.to_str() {
            Ok(s) => s,
            Err(_) => {
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Invalid Authorization header"
                }));
                return ready(Err(actix_web::error::InternalError::from_response(
                    "",
                    response,
                ).into()));
            }
        };

        // 2. Extraire le token (format: "Bearer <token>")
        let token = match auth_str.strip_prefix("Bearer ") {
            Some(token) => token,
            None => {
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Invalid Authorization format (expected: Bearer <token>)"
                }));
                return ready(Err(actix_web::error::InternalError::from_response(
                    "",
                    response,
                ).into()));
            }
        };

        // 3. Vérifier le token JWT (signature + expiration)
        let claims = match jwt::verify_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": format!("Invalid token: {}", e)
                }));
                return ready(Err(actix_web::error::InternalError::from_response(
                    "",
                    response,
                ).into()));
            }
        };

        ready(Ok(AuthUser {
            user_id: claims.sub,
            roll_number: claims.roll_number,
        }))
    }
}
