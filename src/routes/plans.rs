use actix_web::{get, post, put, delete, web, HttpResponse};
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryOrder, Set, ActiveModelTrait,
    ModelTrait, PaginatorTrait,
};
use serde::Deserialize;
use rust_decimal::Decimal;
use validator::Validate;

use crate::models::plans::{Entity as Plans, Column as PlanColumn, ActiveModel as PlanActiveModel};
use crate::models::dto::{PageQuery, PaginationInfo};
use crate::middleware::AuthUser;

// DTO pour créer un plan
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 36500, message = "Duration must be between 1 and 36500 days"))]
    pub duration: i32,
    pub price: Decimal,
}

// DTO pour la mise à jour partielle d'un plan
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 36500))]
    pub duration: Option<i32>,
    pub price: Option<Decimal>,
}

/// GET /api/plans - Liste paginée des plans (PROTÉGÉE)
#[get("")]
pub async fn get_plans(
    _auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let page = query.page();
    let limit = query.limit();

    let paginator = Plans::find()
        .order_by_asc(PlanColumn::Id)
        .paginate(db.get_ref(), limit);

    let total = match paginator.num_items().await {
        Ok(total) => total,
        Err(e) => {
            log::error!("GET /api/plans: database error: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match paginator.fetch_page(page - 1).await {
        Ok(plans) => HttpResponse::Ok().json(serde_json::json!({
            "plans": plans,
            "pagination": PaginationInfo::new(page, limit, total),
        })),
        Err(e) => {
            log::error!("GET /api/plans: database error: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// GET /api/plans/{id} - Un plan par id (PROTÉGÉE)
#[get("/{id}")]
pub async fn get_plan(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    match Plans::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(plan)) => HttpResponse::Ok().json(plan),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Plan not found"
        })),
        Err(e) => {
            log::error!("GET /api/plans/{}: database error: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// POST /api/plans - Créer un plan (PROTÉGÉE)
#[post("")]
pub async fn create_plan(
    _auth_user: AuthUser,
    body: web::Json<CreatePlanRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    // Le prix n'est pas couvert par validator (Decimal): vérification manuelle
    if body.price < Decimal::ZERO {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Price must not be negative"
        }));
    }

    let new_plan = PlanActiveModel {
        name: Set(body.name.clone()),
        duration: Set(body.duration),
        price: Set(body.price),
        ..Default::default()
    };

    match new_plan.insert(db.get_ref()).await {
        Ok(plan) => HttpResponse::Created().json(plan),
        Err(e) => {
            log::error!("POST /api/plans: insert failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// PUT /api/plans/{id} - Mise à jour partielle d'un plan (PROTÉGÉE)
#[put("/{id}")]
pub async fn update_plan(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdatePlanRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    if let Some(price) = body.price {
        if price < Decimal::ZERO {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Price must not be negative"
            }));
        }
    }

    let plan = match Plans::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(plan)) => plan,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Plan not found"
            }));
        }
        Err(e) => {
            log::error!("PUT /api/plans/{}: database error: {}", id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    let mut active_model: PlanActiveModel = plan.into();
    if let Some(ref name) = body.name {
        active_model.name = Set(name.clone());
    }
    if let Some(duration) = body.duration {
        active_model.duration = Set(duration);
    }
    if let Some(price) = body.price {
        active_model.price = Set(price);
    }

    match active_model.update(db.get_ref()).await {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => {
            log::error!("PUT /api/plans/{}: update failed: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// DELETE /api/plans/{id} - Supprimer un plan (PROTÉGÉE)
#[delete("/{id}")]
pub async fn delete_plan(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    let plan = match Plans::find_by_id(id).one(db.get_ref()).await {
        Ok(Some(plan)) => plan,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Plan not found"
            }));
        }
        Err(e) => {
            log::error!("DELETE /api/plans/{}: database error: {}", id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        }
    };

    match plan.delete(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Plan deleted successfully",
            "id": id,
        })),
        Err(e) => {
            log::error!("DELETE /api/plans/{}: delete failed: {}", id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

pub fn plan_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/plans")
            .service(get_plans)
            .service(create_plan)
            .service(get_plan)
            .service(update_plan)
            .service(delete_plan)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_plan_rejects_zero_duration() {
        let request = CreatePlanRequest {
            name: "Monthly".to_string(),
            duration: 0,
            price: Decimal::new(2999, 2),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_plan_rejects_absurd_duration() {
        // Une durée démesurée doit échouer en validation, pas plus loin
        let request = CreatePlanRequest {
            name: "Forever".to_string(),
            duration: i32::MAX,
            price: Decimal::ZERO,
        };
        assert!(request.validate().is_err());

        let update = UpdatePlanRequest {
            name: None,
            duration: Some(40000),
            price: None,
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_create_plan_accepts_one_day() {
        let request = CreatePlanRequest {
            name: "Day pass".to_string(),
            duration: 1,
            price: Decimal::ZERO,
        };
        assert!(request.validate().is_ok());
    }
}
