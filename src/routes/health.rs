use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;
use chrono::Utc;

use crate::models::health::HealthResponse;

#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let status = match db.get_ref().ping().await {
        Ok(_) => "ok",
        Err(e) => {
            log::error!("Health check: database unreachable: {}", e);
            "degraded"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
    })
}
