// End-to-end workflow scenarios. They need a PostgreSQL database in
// DATABASE_URL and return early without one.

mod common;

use anyhow::{Context, Result};
use easyconnect_api::auth::Role;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{create_user, unique, Api};

/// Decimals serialize as strings
fn num(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        other => other.as_f64().unwrap_or(f64::NAN),
    }
}

async fn unread(api: &Api) -> Result<i64> {
    let (status, body) = api.get("/api/notifications/unread-count").await?;
    anyhow::ensure!(status == StatusCode::OK, "unread count failed: {}", body);
    body["data"]["unread"].as_i64().context("unread missing")
}

async fn create_supplier(api: &Api) -> Result<i64> {
    let (status, body) = api
        .post(
            "/api/suppliers",
            json!({
                "nom": "Dakar Bureautique",
                "email": format!("{}@fournisseur.sn", unique("supplier")),
                "telephone": "+221 33 800 00 00",
                "adresse": "Rue 10, Point E",
                "ville": "Dakar",
                "pays": "Sénégal"
            }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "supplier creation failed: {}", body);
    body["data"]["id"].as_i64().context("supplier id missing")
}

#[tokio::test]
async fn purchase_order_lifecycle() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let commercial_id = create_user(Role::Commercial).await?;
    let patron_id = create_user(Role::Patron).await?;
    let comptable_id = create_user(Role::Comptable).await?;
    let commercial = Api::as_user(commercial_id, Role::Commercial).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;
    let comptable = Api::as_user(comptable_id, Role::Comptable).await?;

    let supplier_id = create_supplier(&comptable).await?;
    let patron_unread = unread(&patron).await?;

    let (status, body) = commercial
        .post(
            "/api/purchase-orders",
            json!({
                "fournisseur_id": supplier_id,
                "numero_commande": unique("BC"),
                "date_commande": "2024-03-01",
                "delai_livraison": 7,
                "items": [
                    { "ref": "A4", "designation": "Ramette A4", "quantite": 10, "prix_unitaire": 3500 },
                    { "designation": "Toner", "quantite": 2, "prix_unitaire": "45000.50" }
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let order = &body["data"];
    let id = order["id"].as_i64().context("order id")?;
    assert_eq!(order["status"], "en_attente");
    assert_eq!(num(&order["montant_total"]), 125_001.0);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
    assert!(unread(&patron).await? > patron_unread);

    // Only approvers validate
    let (status, _) = commercial.post(&format!("/api/purchase-orders/{}/validate", id), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Another commercial cannot see it
    let other_id = create_user(Role::Commercial).await?;
    let other = Api::as_user(other_id, Role::Commercial).await?;
    let (status, _) = other.get(&format!("/api/purchase-orders/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Illegal transition from en_attente
    let (status, body) = patron.post(&format!("/api/purchase-orders/{}/deliver", id), json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = patron.post(&format!("/api/purchase-orders/{}/validate", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "valide");
    assert_eq!(body["data"]["validated_by"].as_i64(), Some(patron_id));
    assert!(unread(&commercial).await? >= 1);

    // Validated orders are no longer editable
    let (status, _) = commercial
        .put(&format!("/api/purchase-orders/{}", id), json!({ "description": "late edit" }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    for action in ["start", "deliver"] {
        let (status, body) = commercial
            .post(&format!("/api/purchase-orders/{}/{}", id, action), json!({}))
            .await?;
        assert_eq!(status, StatusCode::OK, "{}: {}", action, body);
    }
    let (status, body) = commercial.get(&format!("/api/purchase-orders/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "livre");
    assert_eq!(body["data"]["allowed_actions"], json!([]));

    Ok(())
}

#[tokio::test]
async fn rejection_requires_a_reason() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let comptable_id = create_user(Role::Comptable).await?;
    let patron_id = create_user(Role::Patron).await?;
    let comptable = Api::as_user(comptable_id, Role::Comptable).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;
    let supplier_id = create_supplier(&comptable).await?;

    let (status, body) = patron.post(&format!("/api/suppliers/{}/reject", supplier_id), json!({})).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["reason"].is_string());

    let (status, body) = patron
        .post(
            &format!("/api/suppliers/{}/reject", supplier_id),
            json!({ "reason": "Documents administratifs incomplets" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "rejete");

    let (status, body) = comptable.get("/api/notifications?unread_only=true").await?;
    assert_eq!(status, StatusCode::OK);
    let notes = body["data"].as_array().context("notifications")?;
    let rejection = notes
        .iter()
        .find(|n| n["entity_id"].as_i64() == Some(supplier_id))
        .context("rejection notification missing")?;
    assert_eq!(rejection["metadata"]["reason"], "Documents administratifs incomplets");

    let id = rejection["id"].as_i64().context("notification id")?;
    let (status, body) = comptable.post(&format!("/api/notifications/{}/read", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_read"], true);

    // Someone else's notification reads as missing
    let (status, _) = patron.post(&format!("/api/notifications/{}/read", id), json!({})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn stock_movements_keep_quantity_consistent() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let comptable_id = create_user(Role::Comptable).await?;
    let comptable = Api::as_user(comptable_id, Role::Comptable).await?;

    let (status, body) = comptable
        .post(
            "/api/stocks",
            json!({
                "name": "Câble RJ45",
                "sku": unique("RJ45"),
                "category": "reseau",
                "quantity": 10,
                "min_quantity": 5,
                "unit_cost": 1500
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().context("stock id")?;

    let (status, _) = comptable.post(&format!("/api/stocks/{}/remove", id), json!({ "quantity": 15 })).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = comptable
        .post(&format!("/api/stocks/{}/remove", id), json!({ "quantity": 6, "reason": "sale" }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(num(&body["data"]["quantity"]), 4.0);

    let (status, body) = comptable.get("/api/stocks/low").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().context("low")?.iter().any(|s| s["id"].as_i64() == Some(id)));

    let (status, body) = comptable
        .post(&format!("/api/stocks/{}/adjust", id), json!({ "new_quantity": 12 }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(num(&body["data"]["quantity"]), 12.0);

    let (status, body) = comptable.get(&format!("/api/stocks/{}/movements", id)).await?;
    assert_eq!(status, StatusCode::OK);
    let movements = body["data"].as_array().context("movements")?;
    assert_eq!(movements.len(), 3);
    // Newest first: adjustment +8, out -6, initial in +10
    let deltas: Vec<f64> = movements.iter().map(|m| num(&m["quantity"])).collect();
    assert_eq!(deltas, vec![8.0, -6.0, 10.0]);
    assert_eq!(body["pagination"]["total"], 3);
    Ok(())
}

#[tokio::test]
async fn leave_requests_detect_overlaps() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let rh_id = create_user(Role::Rh).await?;
    let rh = Api::as_user(rh_id, Role::Rh).await?;

    let (status, body) = rh
        .post(
            "/api/employees",
            json!({
                "first_name": "Awa",
                "last_name": "Ndiaye",
                "email": format!("{}@easyconnect.sn", unique("employee")),
                "department": "Support",
                "position": "Technicienne",
                "hire_date": "2022-01-10"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let employee_id = body["data"]["id"].as_i64().context("employee id")?;

    let leave = |start: &str, end: &str| {
        json!({
            "employee_id": employee_id,
            "leave_type": "annual",
            "start_date": start,
            "end_date": end,
            "reason": "Congés annuels en famille"
        })
    };

    // Monday 1 July to Friday 12 July 2024
    let (status, body) = rh.post("/api/leave-requests", leave("2024-07-01", "2024-07-12")).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["total_days"], 10);
    assert_eq!(body["data"]["status"], "pending");
    let first = body["data"]["id"].as_i64().context("leave id")?;

    let (status, body) = rh.post(&format!("/api/leave-requests/{}/approve", first), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "approved");

    let (status, body) = rh
        .post(
            "/api/leave-requests/check-conflicts",
            json!({ "employee_id": employee_id, "start_date": "2024-07-10", "end_date": "2024-07-20" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["has_conflicts"], true);

    let (status, body) = rh.post("/api/leave-requests", leave("2024-07-10", "2024-07-20")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["conflicts"].as_array().map(Vec::len), Some(1));
    Ok(())
}
