use actix_web::{get, post, put, delete, web, HttpResponse};
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, QueryOrder,
    Set, ActiveModelTrait, ModelTrait, PaginatorTrait, TransactionTrait, SqlErr, DbErr,
};
use serde::Deserialize;
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::models::users::{Entity as Users, Column as UserColumn, ActiveModel as UserActiveModel};
use crate::models::subscriptions::{Entity as Subscriptions, ActiveModel as SubscriptionActiveModel};
use crate::models::plans::Entity as Plans;
use crate::models::dto::{PageQuery, PaginationInfo};
use crate::services::subscription_service::SubscriptionService;
use crate::utils::password;
use crate::middleware::AuthUser;

const ROLES: [&str; 3] = ["admin", "user", "trainer"];

// Premier abonnement optionnel, créé avec le membre dans la même transaction
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSubscriptionRequest {
    pub plan_id: i32,
    pub start_date: DateTime<Utc>,
    pub payment_status: Option<String>, // défaut: "unpaid"
}

// DTO pour créer un membre
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Roll number is required"))]
    pub roll_number: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<String>, // défaut: "user"
    pub is_active: Option<bool>, // défaut: true
    pub subscription: Option<InlineSubscriptionRequest>,
}

// DTO pour la mise à jour partielle d'un membre
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1))]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub roll_number: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn duplicate_user_response() -> HttpResponse {
    HttpResponse::Conflict().json(serde_json::json!({
        "error": "User with this email or roll number already exists"
    }))
}

/// GET /api/users - Liste paginée des membres (PROTÉGÉE)
#[get("")]
pub async fn get_users(
    _auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let page = query.page();
    let limit = query.limit();

    let paginator = Users::find()
        .order_by_asc(UserColumn::Id)
        .paginate(db.get_ref(), limit);

    let total = match paginator.num_items().await {
        Ok(total) => total,
        Err(e) => {
            log::error!("GET /api/users: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match paginator.fetch_page(page - 1).await {
        Ok(users) => HttpResponse::Ok().json(serde_json::json!({
            "users": users,
            "pagination": PaginationInfo::new(page, limit, total),
        })),
        Err(e) => {
            log::error!("GET /api/users: database error: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// GET /api/users/{rollNumber} - Un membre et ses abonnements (PROTÉGÉE)
#[get("/{roll_number}")]
pub async fn get_user(
    _auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let roll_number = path.into_inner();

    let user = match Users::find()
        .filter(UserColumn::RollNumber.eq(&roll_number))
        .one(db.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            log::error!("GET /api/users/{}: database error: {}", roll_number, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    let subscriptions = match user.find_related(Subscriptions).all(db.get_ref()).await {
        Ok(subs) => subs,
        Err(e) => {
            log::error!("GET /api/users/{}: database error: {}", roll_number, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "user": user,
        "subscriptions": subscriptions,
    }))
}

/// POST /api/users - Créer un membre (PROTÉGÉE)
/// Si un abonnement initial est fourni, il est créé dans la même transaction:
/// un plan inexistant annule aussi la création du membre.
#[post("")]
pub async fn create_user(
    _auth_user: AuthUser,
    body: web::Json<CreateUserRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    let role = body.role.clone().unwrap_or_else(|| "user".to_string());
    if !ROLES.contains(&role.as_str()) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Role must be one of: admin, user, trainer"
        }));
    }

    if let Some(ref subscription) = body.subscription {
        if let Some(ref status) = subscription.payment_status {
            if !SubscriptionService::is_valid_payment_status(status) {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Payment status must be one of: paid, unpaid"
                }));
            }
        }
    }

    // 1. Hash du mot de passe
    let password_hash = match password::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("POST /api/users: password hashing failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // 2. Transaction: membre + premier abonnement éventuel
    let txn = match db.get_ref().begin().await {
        Ok(txn) => txn,
        Err(e) => {
            log::error!("POST /api/users: transaction begin failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    let new_user = UserActiveModel {
        name: Set(body.name.clone()),
        email: Set(body.email.clone()),
        phone: Set(body.phone.clone()),
        roll_number: Set(body.roll_number.clone()),
        password: Set(password_hash),
        role: Set(role),
        is_active: Set(body.is_active.unwrap_or(true)),
        ..Default::default()
    };

    let user = match new_user.insert(&txn).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => return duplicate_user_response(),
        Err(e) => {
            log::error!("POST /api/users: insert failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    let mut created_subscription = None;
    if let Some(ref subscription) = body.subscription {
        // Dérivation de la date de fin depuis la durée du plan référencé
        let plan = match Plans::find_by_id(subscription.plan_id).one(&txn).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                return HttpResponse::NotFound().json(serde_json::json!({
                    "error": "Plan not found"
                }));
            }
            Err(e) => {
                log::error!("POST /api/users: database error: {}", e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }));
            }
        };

        let end_date = match SubscriptionService::derive_end_date(subscription.start_date, plan.duration) {
            Some(end_date) => end_date,
            None => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Start date and plan duration produce an out-of-range end date"
                }));
            }
        };
        let payment_status = subscription
            .payment_status
            .clone()
            .unwrap_or_else(|| "unpaid".to_string());

        let new_subscription = SubscriptionActiveModel {
            user_id: Set(user.id),
            plan_id: Set(subscription.plan_id),
            start_date: Set(subscription.start_date),
            end_date: Set(end_date),
            payment_status: Set(payment_status),
            ..Default::default()
        };

        match new_subscription.insert(&txn).await {
            Ok(sub) => created_subscription = Some(sub),
            Err(e) => {
                log::error!("POST /api/users: subscription insert failed: {}", e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }));
            }
        }
    }

    if let Err(e) = txn.commit().await {
        log::error!("POST /api/users: commit failed: {}", e);
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Internal server error"
        }));
    }

    HttpResponse::Created().json(serde_json::json!({
        "message": "User created successfully",
        "user": user,
        "subscription": created_subscription,
    }))
}

/// PUT /api/users/{rollNumber} - Mise à jour partielle d'un membre (PROTÉGÉE)
#[put("/{roll_number}")]
pub async fn update_user(
    _auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let roll_number = path.into_inner();

    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    if let Some(ref role) = body.role {
        if !ROLES.contains(&role.as_str()) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Role must be one of: admin, user, trainer"
            }));
        }
    }

    let user = match Users::find()
        .filter(UserColumn::RollNumber.eq(&roll_number))
        .one(db.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            log::error!("PUT /api/users/{}: database error: {}", roll_number, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // Seuls les champs fournis sont modifiés
    let mut active_model: UserActiveModel = user.into();
    if let Some(ref name) = body.name {
        active_model.name = Set(name.clone());
    }
    if let Some(ref email) = body.email {
        active_model.email = Set(email.clone());
    }
    if let Some(ref phone) = body.phone {
        active_model.phone = Set(phone.clone());
    }
    if let Some(ref new_roll) = body.roll_number {
        active_model.roll_number = Set(new_roll.clone());
    }
    if let Some(ref role) = body.role {
        active_model.role = Set(role.clone());
    }
    if let Some(is_active) = body.is_active {
        active_model.is_active = Set(is_active);
    }
    if let Some(ref new_password) = body.password {
        match password::hash_password(new_password) {
            Ok(hash) => active_model.password = Set(hash),
            Err(e) => {
                log::error!("PUT /api/users/{}: password hashing failed: {}", roll_number, e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }));
            }
        }
    }

    match active_model.update(db.get_ref()).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "message": "User updated successfully",
            "user": user,
        })),
        Err(e) if is_unique_violation(&e) => duplicate_user_response(),
        Err(e) => {
            log::error!("PUT /api/users/{}: update failed: {}", roll_number, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// DELETE /api/users/{rollNumber} - Supprimer un membre (PROTÉGÉE)
#[delete("/{roll_number}")]
pub async fn delete_user(
    _auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let roll_number = path.into_inner();

    let user = match Users::find()
        .filter(UserColumn::RollNumber.eq(&roll_number))
        .one(db.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            log::error!("DELETE /api/users/{}: database error: {}", roll_number, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match user.delete(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "User deleted successfully",
            "rollNumber": roll_number,
        })),
        Err(e) => {
            log::error!("DELETE /api/users/{}: delete failed: {}", roll_number, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(get_users)
            .service(create_user)
            .service(get_user)
            .service(update_user)
            .service(delete_user)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_request_rejects_bad_email() {
        let request = CreateUserRequest {
            name: "Jane".to_string(),
            email: "not-an-email".to_string(),
            phone: "555-0100".to_string(),
            roll_number: "GYM-0002".to_string(),
            password: "longenough".to_string(),
            role: None,
            is_active: None,
            subscription: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_user_request_rejects_short_password() {
        let request = CreateUserRequest {
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            phone: "555-0100".to_string(),
            roll_number: "GYM-0002".to_string(),
            password: "short".to_string(),
            role: None,
            is_active: None,
            subscription: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_request_allows_all_fields_absent() {
        let request = UpdateUserRequest {
            name: None,
            email: None,
            phone: None,
            roll_number: None,
            password: None,
            role: None,
            is_active: None,
        };
        assert!(request.validate().is_ok());
    }
}
