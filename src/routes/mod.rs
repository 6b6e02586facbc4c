pub mod health;
pub mod auth;
pub mod users;
pub mod plans;
pub mod subscriptions;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(users::user_routes)
            .configure(plans::plan_routes)
            .configure(subscriptions::subscription_routes)
    );
}
