use actix_web::{get, post, put, delete, web, HttpResponse};
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, QueryOrder,
    ActiveModelTrait, ModelTrait, PaginatorTrait,
};
use serde::Deserialize;
use chrono::Utc;
use validator::Validate;

use crate::models::users::{Entity as Users, Column as UserColumn};
use crate::models::plans::Entity as Plans;
use crate::models::subscriptions::{Entity as Subscriptions, Column as SubscriptionColumn};
use crate::models::dto::{CreateSubscriptionRequest, UpdateSubscriptionRequest, PageQuery, PaginationInfo};
use crate::services::subscription_service::{SubscriptionService, SubscriptionStatus, CreateSubscriptionError};
use crate::middleware::AuthUser;

#[derive(Deserialize)]
pub struct CheckQuery {
    pub roll: String,
}

/// GET /api/subscriptions/check?roll=ROLL - Statut d'abonnement d'un membre (PUBLIC)
/// Seule route publique avec /auth/login et /health: affichée sur la borne
/// d'accueil, elle ne demande pas de token.
#[get("/check")]
pub async fn check_subscription(
    query: web::Query<CheckQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let roll = query.roll.trim();
    if roll.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Roll number is required"
        }));
    }

    // 1. Trouver le membre par son roll number
    let user = match Users::find()
        .filter(UserColumn::RollNumber.eq(roll))
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
            log::error!("GET /api/subscriptions/check: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    let user_json = serde_json::json!({
        "name": user.name,
        "rollNumber": user.roll_number,
        "email": user.email,
    });

    // 2. Récupérer ses abonnements
    let subscriptions = match user.find_related(Subscriptions).all(db.get_ref()).await {
        Ok(subs) => subs,
        Err(e) => {
            log::error!("GET /api/subscriptions/check: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // 3. Membre sans abonnement: payload distinct, pas une erreur
    let latest = match SubscriptionService::latest_subscription(&subscriptions) {
        Some(latest) => latest,
        None => {
            return HttpResponse::Ok().json(serde_json::json!({
                "user": user_json,
                "subscription": serde_json::Value::Null,
                "status": SubscriptionStatus::NoSubscription,
            }));
        }
    };

    // 4. Statut calculé sur l'abonnement à la date de fin la plus tardive
    let status = SubscriptionService::compute_status(latest.end_date, Utc::now());

    let mut subscription_json = match serde_json::to_value(latest) {
        Ok(value) => value,
        Err(e) => {
            log::error!("GET /api/subscriptions/check: serialization error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };
    if let Some(object) = subscription_json.as_object_mut() {
        object.insert("status".to_string(), serde_json::json!(status));
    }

    HttpResponse::Ok().json(serde_json::json!({
        "user": user_json,
        "subscription": subscription_json,
        "status": status,
    }))
}

/// GET /api/subscriptions - Liste paginée, plus récents d'abord (PROTÉGÉE)
#[get("")]
pub async fn get_subscriptions(
    _auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let page = query.page();
    let limit = query.limit();

    let paginator = Subscriptions::find()
        .order_by_desc(SubscriptionColumn::Id)
        .paginate(db.get_ref(), limit);

    let total = match paginator.num_items().await {
        Ok(total) => total,
        Err(e) => {
            log::error!("GET /api/subscriptions: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match paginator.fetch_page(page - 1).await {
        Ok(subscriptions) => HttpResponse::Ok().json(serde_json::json!({
            "subscriptions": subscriptions,
            "pagination": PaginationInfo::new(page, limit, total),
        })),
        Err(e) => {
            log::error!("GET /api/subscriptions: database error: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// POST /api/subscriptions - Créer un abonnement (PROTÉGÉE)
/// Références vérifiées et insertion dans une seule transaction;
/// la date de fin est dérivée de la durée du plan, jamais du client.
#[post("")]
pub async fn create_subscription(
    _auth_user: AuthUser,
    body: web::Json<CreateSubscriptionRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    if !SubscriptionService::is_valid_payment_status(&body.payment_status) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Payment status must be one of: paid, unpaid"
        }));
    }

    match SubscriptionService::create_subscription(db.get_ref(), body.into_inner()).await {
        Ok(subscription) => HttpResponse::Created().json(subscription),
        Err(e @ CreateSubscriptionError::UserNotFound(_)) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e @ CreateSubscriptionError::PlanNotFound(_)) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e @ CreateSubscriptionError::EndDateOutOfRange) => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(CreateSubscriptionError::Db(e)) => {
            log::error!("POST /api/subscriptions: database error: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// GET /api/subscriptions/{id} - Un abonnement par id (PROTÉGÉE)
#[get("/{id}")]
pub async fn get_subscription(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    match Subscriptions::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(subscription)) => HttpResponse::Ok().json(subscription),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Subscription not found"
        })),
        Err(e) => {
            log::error!("GET /api/subscriptions/{}: database error: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// PUT /api/subscriptions/{id} - Mise à jour partielle (PROTÉGÉE)
/// Les champs absents gardent leur valeur, dates comprises.
#[put("/{id}")]
pub async fn update_subscription(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateSubscriptionRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    if let Some(ref status) = body.payment_status {
        if !SubscriptionService::is_valid_payment_status(status) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Payment status must be one of: paid, unpaid"
            }));
        }
    }

    let subscription = match Subscriptions::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Subscription not found"
            }));
        }
        Err(e) => {
            log::error!("PUT /api/subscriptions/{}: database error: {}", id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    // 1. Re-vérifier les références si elles changent
    if let Some(user_id) = body.user_id {
        match Users::find_by_id(user_id).one(db.get_ref()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HttpResponse::NotFound().json(serde_json::json!({
                    "error": "User not found"
                }));
            }
            Err(e) => {
                log::error!("PUT /api/subscriptions/{}: database error: {}", id, e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }));
            }
        }
    }
    if let Some(plan_id) = body.plan_id {
        match Plans::find_by_id(plan_id).one(db.get_ref()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HttpResponse::NotFound().json(serde_json::json!({
                    "error": "Plan not found"
                }));
            }
            Err(e) => {
                log::error!("PUT /api/subscriptions/{}: database error: {}", id, e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }));
            }
        }
    }

    // 2. Appliquer uniquement les champs fournis, avec re-vérification
    //    de l'invariant de dates sur le résultat du patch
    let active_model = match SubscriptionService::apply_update(subscription, &body) {
        Ok(active_model) => active_model,
        Err(message) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": message
            }));
        }
    };

    match active_model.update(db.get_ref()).await {
        Ok(subscription) => HttpResponse::Ok().json(subscription),
        Err(e) => {
            log::error!("PUT /api/subscriptions/{}: update failed: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// DELETE /api/subscriptions/{id} - Suppression inconditionnelle par id (PROTÉGÉE)
#[delete("/{id}")]
pub async fn delete_subscription(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    let subscription = match Subscriptions::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Subscription not found"
            }));
        }
        Err(e) => {
            log::error!("DELETE /api/subscriptions/{}: database error: {}", id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match subscription.delete(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Subscription deleted successfully",
            "id": id,
        })),
        Err(e) => {
            log::error!("DELETE /api/subscriptions/{}: delete failed: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// GET /api/subscriptions/user/{userId} - Abonnements d'un membre (PROTÉGÉE)
#[get("/user/{user_id}")]
pub async fn get_subscriptions_by_user(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();

    match Subscriptions::find()
        .filter(SubscriptionColumn::UserId.eq(user_id))
        .order_by_desc(SubscriptionColumn::EndDate)
        .all(db.get_ref())
        .await
    {
        Ok(subscriptions) if subscriptions.is_empty() => {
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "No subscriptions found for this user"
            }))
        }
        Ok(subscriptions) => HttpResponse::Ok().json(subscriptions),
        Err(e) => {
            log::error!("GET /api/subscriptions/user/{}: database error: {}", user_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// GET /api/subscriptions/plan/{planId} - Abonnements d'un plan (PROTÉGÉE)
#[get("/plan/{plan_id}")]
pub async fn get_subscriptions_by_plan(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let plan_id = path.into_inner();

    match Subscriptions::find()
        .filter(SubscriptionColumn::PlanId.eq(plan_id))
        .order_by_desc(SubscriptionColumn::EndDate)
        .all(db.get_ref())
        .await
    {
        Ok(subscriptions) if subscriptions.is_empty() => {
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "No subscriptions found for this plan"
            }))
        }
        Ok(subscriptions) => HttpResponse::Ok().json(subscriptions),
        Err(e) => {
            log::error!("GET /api/subscriptions/plan/{}: database error: {}", plan_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

pub fn subscription_routes(cfg: &mut web::ServiceConfig) {
    // /check et les routes littérales avant /{id}
    cfg.service(
        web::scope("/subscriptions")
            .service(check_subscription)
            .service(get_subscriptions)
            .service(create_subscription)
            .service(get_subscriptions_by_user)
            .service(get_subscriptions_by_plan)
            .service(get_subscription)
            .service(update_subscription)
            .service(delete_subscription)
    );
}
