use actix_web::{post, get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait};
use serde::{Deserialize, Serialize};

use crate::models::users::{Entity as Users, Column as UserColumn};
use crate::utils::{password, jwt};
use crate::middleware::AuthUser;

// DTO pour la connexion admin
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Réponse après login
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
    pub name: String,
}

// Réponse pour /auth/me
#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: i32,
    pub roll_number: String,
}

/// POST /api/auth/login - Connexion admin (PUBLIC)
/// Seul un compte role=admin actif peut obtenir un token.
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.email.is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Email and password are required"
        }));
    }

    // 1. Trouver l'utilisateur par email
    let user = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await;

    let user = match user {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid credentials"
            }));
        }
        Err(e) => {
            log::error!("POST /api/auth/login: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // 2. Vérifier le rôle admin et l'activation du compte
    // Même message que pour un mauvais mot de passe: ne pas révéler
    // l'existence du compte.
    if user.role != "admin" || !user.is_active {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid credentials"
        }));
    }

    // 3. Vérifier le mot de passe
    let is_valid = match password::verify_password(&body.password, &user.password) {
        Ok(valid) => valid,
        Err(e) => {
            log::error!("POST /api/auth/login: password verification error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    if !is_valid {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid credentials"
        }));
    }

    // 4. Générer le JWT
    let token = match jwt::generate_token(user.id, &user.roll_number) {
        Ok(token) => token,
        Err(e) => {
            log::error!("POST /api/auth/login: token generation failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: user.id,
        name: user.name,
    })
}

/// GET /api/auth/me - Vérifier le token (PROTÉGÉE)
#[get("/me")]
pub async fn me(auth_user: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(MeResponse {
        user_id: auth_user.user_id,
        roll_number: auth_user.roll_number,
    })
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(login)
            .service(me)
    );
}
