use sea_orm::*;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{users, plans, subscriptions};
use crate::models::dto::{CreateSubscriptionRequest, UpdateSubscriptionRequest};

/// Fenêtre "expire bientôt": 7 jours inclus avant la date de fin
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 7;

/// Statuts de paiement acceptés (distinct du statut de cycle de vie calculé)
pub const PAYMENT_STATUSES: [&str; 2] = ["paid", "unpaid"];

/// Statut de cycle de vie d'un abonnement, toujours calculé, jamais stocké
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    ExpiringSoon,
    Expired,
    NoSubscription,
}

#[derive(Debug, Error)]
pub enum CreateSubscriptionError {
    #[error("User with id {0} not found")]
    UserNotFound(i32),

    #[error("Plan with id {0} not found")]
    PlanNotFound(i32),

    #[error("Start date and plan duration produce an out-of-range end date")]
    EndDateOutOfRange,

    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

pub struct SubscriptionService;

impl SubscriptionService {
    /// Calcule le statut d'un abonnement à partir de sa date de fin.
    /// - expired : la date de fin est strictement passée
    /// - expiring_soon : il reste entre 0 et 7 jours inclus
    /// - active : il reste plus de 7 jours
    pub fn compute_status(end_date: DateTime<Utc>, now: DateTime<Utc>) -> SubscriptionStatus {
        if end_date < now {
            return SubscriptionStatus::Expired;
        }

        if end_date - now <= Duration::days(EXPIRING_SOON_WINDOW_DAYS) {
            SubscriptionStatus::ExpiringSoon
        } else {
            SubscriptionStatus::Active
        }
    }

    /// Dérive la date de fin depuis la durée du plan, en comptage inclusif:
    /// un plan de 30 jours commencé le 1er janvier se termine le 30 janvier.
    /// Retourne None si le résultat sort de la plage représentable par chrono.
    pub fn derive_end_date(start_date: DateTime<Utc>, duration_days: i32) -> Option<DateTime<Utc>> {
        start_date.checked_add_signed(Duration::days(i64::from(duration_days) - 1))
    }

    /// Sélectionne l'abonnement avec la date de fin la plus tardive.
    /// Le lookup public ne rapporte que celui-là, sans agréger les autres.
    pub fn latest_subscription(subs: &[subscriptions::Model]) -> Option<&subscriptions::Model> {
        subs.iter().max_by_key(|s| s.end_date)
    }

    pub fn is_valid_payment_status(status: &str) -> bool {
        PAYMENT_STATUSES.contains(&status)
    }

    /// Applique une mise à jour partielle: seuls les champs fournis passent
    /// en Set, les champs absents (dates comprises) gardent leur valeur
    /// stockée. L'invariant end_date >= start_date est re-vérifié sur les
    /// valeurs résultant du patch.
    pub fn apply_update(
        subscription: subscriptions::Model,
        request: &UpdateSubscriptionRequest,
    ) -> Result<subscriptions::ActiveModel, String> {
        let start_date = request.start_date.unwrap_or(subscription.start_date);
        let end_date = request.end_date.unwrap_or(subscription.end_date);
        if end_date < start_date {
            return Err("endDate must not be before startDate".to_string());
        }

        let mut active_model: subscriptions::ActiveModel = subscription.into();
        if let Some(user_id) = request.user_id {
            active_model.user_id = Set(user_id);
        }
        if let Some(plan_id) = request.plan_id {
            active_model.plan_id = Set(plan_id);
        }
        if let Some(start_date) = request.start_date {
            active_model.start_date = Set(start_date);
        }
        if let Some(end_date) = request.end_date {
            active_model.end_date = Set(end_date);
        }
        if let Some(ref status) = request.payment_status {
            active_model.payment_status = Set(status.clone());
        }

        Ok(active_model)
    }

    /// Crée un abonnement après vérification des références.
    /// Les vérifications d'existence et l'insertion se font dans une seule
    /// transaction: un User ou un Plan supprimé entre les deux ne peut pas
    /// laisser une ligne orpheline.
    pub async fn create_subscription(
        db: &DatabaseConnection,
        request: CreateSubscriptionRequest,
    ) -> Result<subscriptions::Model, CreateSubscriptionError> {
        let txn = db.begin().await?;

        // 1. Vérifier que l'utilisateur référencé existe
        let user = users::Entity::find_by_id(request.user_id)
            .one(&txn)
            .await?;
        if user.is_none() {
            return Err(CreateSubscriptionError::UserNotFound(request.user_id));
        }

        // 2. Vérifier que le plan référencé existe
        let plan = plans::Entity::find_by_id(request.plan_id)
            .one(&txn)
            .await?
            .ok_or(CreateSubscriptionError::PlanNotFound(request.plan_id))?;

        // 3. Dériver la date de fin côté serveur (seule source de vérité)
        let end_date = Self::derive_end_date(request.start_date, plan.duration)
            .ok_or(CreateSubscriptionError::EndDateOutOfRange)?;
        if let Some(client_end) = request.end_date {
            if client_end != end_date {
                log::warn!(
                    "Client-supplied endDate {} ignored, derived {} from plan {} ({} days)",
                    client_end, end_date, plan.id, plan.duration
                );
            }
        }

        // 4. Insérer puis committer
        let new_subscription = subscriptions::ActiveModel {
            user_id: Set(request.user_id),
            plan_id: Set(request.plan_id),
            start_date: Set(request.start_date),
            end_date: Set(end_date),
            payment_status: Set(request.payment_status),
            ..Default::default()
        };

        let created = new_subscription.insert(&txn).await?;
        txn.commit().await?;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sub(id: i32, end_date: DateTime<Utc>) -> subscriptions::Model {
        subscriptions::Model {
            id,
            user_id: 1,
            plan_id: 1,
            start_date: end_date - Duration::days(30),
            end_date,
            payment_status: "paid".to_string(),
        }
    }

    #[test]
    fn test_status_expired_one_second_past() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let status = SubscriptionService::compute_status(now - Duration::seconds(1), now);
        assert_eq!(status, SubscriptionStatus::Expired);
    }

    #[test]
    fn test_status_expiring_soon_at_exact_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        // Exactement 7 * 86400 secondes: encore "expiring_soon"
        let status = SubscriptionService::compute_status(now + Duration::days(7), now);
        assert_eq!(status, SubscriptionStatus::ExpiringSoon);
    }

    #[test]
    fn test_status_active_one_second_beyond_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let end = now + Duration::days(7) + Duration::seconds(1);
        let status = SubscriptionService::compute_status(end, now);
        assert_eq!(status, SubscriptionStatus::Active);
    }

    #[test]
    fn test_status_expiring_soon_ending_now() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let status = SubscriptionService::compute_status(now, now);
        assert_eq!(status, SubscriptionStatus::ExpiringSoon);
    }

    #[test]
    fn test_derive_end_date_inclusive() {
        // Plan de 30 jours commencé le 1er juillet -> fin le 30 juillet
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let end = SubscriptionService::derive_end_date(start, 30).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 7, 30, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_derive_end_date_single_day_plan() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = SubscriptionService::derive_end_date(start, 1).unwrap();
        assert_eq!(end, start);
    }

    #[test]
    fn test_derive_end_date_out_of_range_is_none() {
        // Une durée absurde ne doit pas paniquer mais retourner None
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        assert!(SubscriptionService::derive_end_date(start, i32::MAX).is_none());
    }

    #[test]
    fn test_latest_subscription_picks_max_end_date() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap();
        let subs = vec![
            sub(1, now + Duration::days(3)),
            sub(2, now + Duration::days(60)),
            sub(3, now - Duration::days(10)),
        ];

        let latest = SubscriptionService::latest_subscription(&subs).unwrap();
        assert_eq!(latest.id, 2);
    }

    #[test]
    fn test_latest_subscription_empty() {
        assert!(SubscriptionService::latest_subscription(&[]).is_none());
    }

    #[test]
    fn test_apply_update_only_payment_status_keeps_other_fields() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap();
        let stored = sub(1, now + Duration::days(30));
        let start = stored.start_date;
        let end = stored.end_date;

        let request = UpdateSubscriptionRequest {
            user_id: None,
            plan_id: None,
            start_date: None,
            end_date: None,
            payment_status: Some("paid".to_string()),
        };

        let model = SubscriptionService::apply_update(stored, &request).unwrap();
        assert!(matches!(model.payment_status, ActiveValue::Set(ref s) if s == "paid"));
        // Les champs non fournis ne doivent pas être réécrits
        assert!(matches!(model.user_id, ActiveValue::Unchanged(1)));
        assert!(matches!(model.plan_id, ActiveValue::Unchanged(1)));
        assert!(matches!(model.start_date, ActiveValue::Unchanged(d) if d == start));
        assert!(matches!(model.end_date, ActiveValue::Unchanged(d) if d == end));
    }

    #[test]
    fn test_apply_update_rejects_end_before_start() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap();
        let stored = sub(1, now + Duration::days(30));

        let request = UpdateSubscriptionRequest {
            user_id: None,
            plan_id: None,
            start_date: None,
            end_date: Some(stored.start_date - Duration::days(1)),
            payment_status: None,
        };

        assert!(SubscriptionService::apply_update(stored, &request).is_err());
    }

    #[test]
    fn test_apply_update_checks_dates_after_patch() {
        // Nouvelle start_date fournie seule: comparée à la end_date stockée
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap();
        let stored = sub(1, now);

        let request = UpdateSubscriptionRequest {
            user_id: None,
            plan_id: None,
            start_date: Some(now + Duration::days(5)),
            end_date: None,
            payment_status: None,
        };

        assert!(SubscriptionService::apply_update(stored, &request).is_err());
    }

    #[test]
    fn test_payment_status_set() {
        assert!(SubscriptionService::is_valid_payment_status("paid"));
        assert!(SubscriptionService::is_valid_payment_status("unpaid"));
        assert!(!SubscriptionService::is_valid_payment_status("pending"));
        assert!(!SubscriptionService::is_valid_payment_status("active"));
        assert!(!SubscriptionService::is_valid_payment_status(""));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::ExpiringSoon).unwrap();
        assert_eq!(json, "\"expiring_soon\"");
        let json = serde_json::to_string(&SubscriptionStatus::NoSubscription).unwrap();
        assert_eq!(json, "\"no_subscription\"");
    }
}
