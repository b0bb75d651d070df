use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::workflow::machines::ClientStatus;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: i64,
    pub nom: String,
    pub prenom: Option<String>,
    pub email: String,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub nom_entreprise: Option<String>,
    pub situation_geographique: Option<String>,
    pub status: ClientStatus,
    pub rejection_reason: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
