// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Membres du gym + admins (rollNumber unique pour le lookup public)
//   - plans : Plans d'abonnement (durée en jours, prix)
//   - subscriptions : Abonnements (user + plan + dates + statut de paiement)
//   - dto : Data Transfer Objects pour les requêtes/réponses API
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les relations entre tables sont définies dans chaque modèle
//   - Le JSON exposé est en camelCase (contrat API côté client)
//
// ============================================================================

pub mod health;
pub mod users;
pub mod plans;
pub mod subscriptions;
pub mod dto;
