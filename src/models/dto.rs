// DTOs partagés entre les routes (requêtes validées + pagination)
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

/// Requête de création d'abonnement.
/// endDate est accepté pour compatibilité avec les anciens clients mais le
/// serveur reste la seule autorité: la date de fin est dérivée de la durée
/// du plan référencé.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub user_id: i32,
    pub plan_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "Payment status is required"))]
    pub payment_status: String,
}

/// Mise à jour partielle: seuls les champs fournis sont modifiés,
/// les dates absentes ne sont jamais écrasées.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub user_id: Option<i32>,
    pub plan_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub payment_status: Option<String>,
}

// Paramètres de pagination communs aux listes (défauts: page=1, limit=10)
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl PaginationInfo {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        PaginationInfo {
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let query = PageQuery { page: None, limit: None };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 10);
    }

    #[test]
    fn test_page_query_clamps_limit() {
        let query = PageQuery { page: Some(0), limit: Some(5000) };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
    }

    #[test]
    fn test_pagination_pages_rounds_up() {
        let info = PaginationInfo::new(1, 10, 31);
        assert_eq!(info.pages, 4);

        let info = PaginationInfo::new(1, 10, 30);
        assert_eq!(info.pages, 3);
    }
}
