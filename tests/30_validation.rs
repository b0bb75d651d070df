// Input validation runs before any database access, so these pass with or
// without a database.

mod common;

use anyhow::Result;
use easyconnect_api::auth::Role;
use reqwest::StatusCode;
use serde_json::json;

use common::Api;

#[tokio::test]
async fn purchase_order_without_items_needs_positive_total() -> Result<()> {
    let api = Api::as_user(2, Role::Commercial).await?;
    let (status, body) = api
        .post(
            "/api/purchase-orders",
            json!({ "fournisseur_id": 1, "date_commande": "2024-03-01", "montant_total": 0 }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["montant_total"].is_string());
    Ok(())
}

#[tokio::test]
async fn supplier_requires_contact_fields() -> Result<()> {
    let api = Api::as_user(3, Role::Comptable).await?;
    let (status, body) = api.post("/api/suppliers", json!({ "nom": "Sénégal Fournitures" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    for field in ["email", "telephone", "adresse"] {
        assert!(body["errors"][field].is_string(), "missing error for {}", field);
    }
    Ok(())
}

#[tokio::test]
async fn expense_amount_must_be_positive() -> Result<()> {
    let api = Api::as_user(3, Role::Comptable).await?;
    let (status, body) = api
        .post(
            "/api/expenses",
            json!({
                "category": "transport",
                "title": "Taxi",
                "amount": -5,
                "expense_date": "2024-03-01"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["amount"].is_string());
    Ok(())
}

#[tokio::test]
async fn leave_reason_has_a_minimum_length() -> Result<()> {
    let api = Api::as_user(9, Role::Technicien).await?;
    let (status, body) = api
        .post(
            "/api/leave-requests",
            json!({
                "employee_id": 1,
                "leave_type": "annual",
                "start_date": "2024-07-01",
                "end_date": "2024-07-05",
                "reason": "short"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["reason"].is_string());
    Ok(())
}

#[tokio::test]
async fn evaluation_scores_are_bounded() -> Result<()> {
    let api = Api::as_user(4, Role::Rh).await?;
    let (status, body) = api
        .post(
            "/api/evaluations",
            json!({
                "employee_id": 12,
                "evaluation_type": "annual",
                "period_start": "2024-01-01",
                "period_end": "2024-12-31",
                "criteria": { "ponctualite": 25, "qualite": 14 }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["criteria.ponctualite"].is_string());
    assert!(body["errors"]["criteria.qualite"].is_null());
    Ok(())
}

#[tokio::test]
async fn dashboard_rejects_inverted_period() -> Result<()> {
    let api = Api::as_user(6, Role::Patron).await?;
    let (status, body) = api
        .get("/api/reporting/dashboard?date_debut=2024-06-01&date_fin=2024-01-01")
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["date_fin"].is_string());
    Ok(())
}
