// Business rules that only show up against a real database: coded statuses,
// reference numbering, payroll, leave allowances and HR ownership checks.
// They need a PostgreSQL database in DATABASE_URL and return early without one.

mod common;

use anyhow::{Context, Result};
use easyconnect_api::auth::Role;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{create_user, reference_number, unique, Api};

fn num(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        other => other.as_f64().unwrap_or(f64::NAN),
    }
}

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["id"].as_i64()).collect())
        .unwrap_or_default()
}

async fn create_client(api: &Api) -> Result<i64> {
    let (status, body) = api
        .post(
            "/api/clients",
            json!({
                "nom": "Sonatel",
                "email": format!("{}@client.sn", unique("client")),
                "ville": "Dakar"
            }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "client creation failed: {}", body);
    body["data"]["id"].as_i64().context("client id missing")
}

async fn create_employee(rh: &Api, user_id: Option<i64>) -> Result<i64> {
    let (status, body) = rh
        .post(
            "/api/employees",
            json!({
                "first_name": "Moussa",
                "last_name": "Diop",
                "email": format!("{}@easyconnect.sn", unique("employee")),
                "department": "Comptabilité",
                "position": "Assistant",
                "hire_date": "2021-09-01",
                "user_id": user_id
            }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "employee creation failed: {}", body);
    body["data"]["id"].as_i64().context("employee id missing")
}

#[tokio::test]
async fn quotes_move_through_coded_statuses() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let commercial_id = create_user(Role::Commercial).await?;
    let patron_id = create_user(Role::Patron).await?;
    let commercial = Api::as_user(commercial_id, Role::Commercial).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;
    let client_id = create_client(&commercial).await?;

    let (status, body) = commercial
        .post(
            "/api/quotes",
            json!({
                "client_id": client_id,
                "tva": 18,
                "items": [{ "designation": "Licence annuelle", "quantite": 2, "prix_unitaire": 100000 }]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().context("quote id")?;
    assert_eq!(body["data"]["status"], "brouillon");
    assert_eq!(num(&body["data"]["totals"]["total_ttc"]), 236_000.0);

    // Accepting needs a sent quote
    let (status, _) = patron.post(&format!("/api/quotes/{}/accept", id), json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = commercial.post(&format!("/api/quotes/{}/send", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "envoye");

    let (status, body) = commercial.get("/api/quotes?status=envoye&per_page=100").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(ids(&body).contains(&id));

    let (status, _) = commercial.post(&format!("/api/quotes/{}/accept", id), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = patron.post(&format!("/api/quotes/{}/accept", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "accepte");
    assert_eq!(body["data"]["accepted_by"].as_i64(), Some(patron_id));

    // Only drafts are editable
    let (status, _) = commercial.put(&format!("/api/quotes/{}", id), json!({ "notes": "late" })).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn enterprise_orders_are_invoiced_once_after_delivery() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let commercial_id = create_user(Role::Commercial).await?;
    let patron_id = create_user(Role::Patron).await?;
    let commercial = Api::as_user(commercial_id, Role::Commercial).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;
    let client_id = create_client(&commercial).await?;

    let (status, body) = commercial
        .post(
            "/api/enterprise-orders",
            json!({
                "client_id": client_id,
                "items": [{ "designation": "Routeur", "quantite": 3, "prix_unitaire": 85000 }]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().context("order id")?;
    assert_eq!(body["data"]["status"], "soumis");
    let invoice = format!("/api/enterprise-orders/{}/invoice", id);

    let (status, _) = commercial.post(&invoice, json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = patron.post(&format!("/api/enterprise-orders/{}/validate", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (status, body) = commercial.post(&format!("/api/enterprise-orders/{}/deliver", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "livre");

    let (status, body) = commercial.get("/api/enterprise-orders?status=livre&is_invoiced=false&per_page=100").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(ids(&body).contains(&id));

    let (status, body) = commercial.post(&invoice, json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["is_invoiced"], true);

    let (status, body) = commercial.post(&invoice, json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    Ok(())
}

#[tokio::test]
async fn references_are_sequential_under_concurrent_creation() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let commercial_id = create_user(Role::Commercial).await?;
    let commercial = Api::as_user(commercial_id, Role::Commercial).await?;
    let client_id = create_client(&commercial).await?;

    let quote = json!({ "client_id": client_id, "date_creation": "2031-05-17" });
    let (a, b, c) = tokio::join!(
        commercial.post("/api/quotes", quote.clone()),
        commercial.post("/api/quotes", quote.clone()),
        commercial.post("/api/quotes", quote.clone()),
    );

    let mut numbers = Vec::new();
    for (status, body) in [a?, b?, c?] {
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let reference = body["data"]["reference"].as_str().context("reference")?;
        assert!(reference.starts_with("DV-20310517-"), "{}", reference);
        numbers.push(reference_number(reference).context("numeric suffix")?);
    }
    numbers.sort_unstable();
    assert_eq!(numbers[1], numbers[0] + 1);
    assert_eq!(numbers[2], numbers[0] + 2);
    Ok(())
}

#[tokio::test]
async fn salaries_get_a_payslip_when_approved_from_draft() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let rh_id = create_user(Role::Rh).await?;
    let comptable_id = create_user(Role::Comptable).await?;
    let patron_id = create_user(Role::Patron).await?;
    let rh = Api::as_user(rh_id, Role::Rh).await?;
    let comptable = Api::as_user(comptable_id, Role::Comptable).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;
    let employee_id = create_employee(&rh, None).await?;

    let salary = |base: i64, allowances: i64, deductions: i64| {
        json!({
            "employee_id": employee_id,
            "period": "2024-05",
            "base_salary": base,
            "allowances": allowances,
            "deductions": deductions
        })
    };

    let (status, body) = comptable.post("/api/salaries", salary(500_000, 50_000, 0)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().context("salary id")?;

    // Nothing to pay before approval
    let (status, _) = comptable.post(&format!("/api/salaries/{}/pay", id), json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = patron.post(&format!("/api/salaries/{}/approve", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let approved = &body["data"];
    assert_eq!(approved["status"], "approved");
    assert_eq!(num(&approved["gross_salary"]), 550_000.0);
    assert_eq!(num(&approved["tax_amount"]), 110_000.0);
    assert_eq!(num(&approved["social_security"]), 82_500.0);
    assert_eq!(num(&approved["net_salary"]), 357_500.0);

    let (status, body) = comptable.post(&format!("/api/salaries/{}/pay", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "paid");

    // Deductions above the gross leave nothing to approve
    let (status, body) = comptable.post("/api/salaries", salary(1_000, 0, 5_000)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let empty = body["data"]["id"].as_i64().context("salary id")?;
    let (status, body) = patron.post(&format!("/api/salaries/{}/approve", empty), json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = comptable.post("/api/salaries", salary(300_000, 0, 0)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let calculated = body["data"]["id"].as_i64().context("salary id")?;
    let (status, body) = comptable.post(&format!("/api/salaries/{}/calculate", calculated), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "calculated");
    assert_eq!(num(&body["data"]["net_salary"]), 195_000.0);

    let (status, body) = comptable.get("/api/salaries/stats").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["by_status"]["paid"].as_i64() >= Some(1));
    Ok(())
}

#[tokio::test]
async fn leave_updates_and_approvals_respect_existing_leave() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let rh_id = create_user(Role::Rh).await?;
    let rh = Api::as_user(rh_id, Role::Rh).await?;
    let employee_id = create_employee(&rh, None).await?;

    let leave = |start: &str, end: &str| {
        json!({
            "employee_id": employee_id,
            "leave_type": "annual",
            "start_date": start,
            "end_date": end,
            "reason": "Congés annuels au village"
        })
    };

    // Monday 1 July to Friday 12 July 2024, ten working days
    let (status, body) = rh.post("/api/leave-requests", leave("2024-07-01", "2024-07-12")).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let approved = body["data"]["id"].as_i64().context("leave id")?;
    let (status, body) = rh.post(&format!("/api/leave-requests/{}/approve", approved), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = rh.post("/api/leave-requests", leave("2024-08-05", "2024-08-09")).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let pending = body["data"]["id"].as_i64().context("leave id")?;

    // Moving onto the approved leave is refused
    let (status, body) = rh
        .put(
            &format!("/api/leave-requests/{}", pending),
            json!({ "start_date": "2024-07-10", "end_date": "2024-07-16" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    let conflicts = body["data"]["conflicts"].as_array().context("conflicts")?;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["id"].as_i64(), Some(approved));

    // Overlapping its own previous dates is fine
    let (status, body) = rh
        .put(
            &format!("/api/leave-requests/{}", pending),
            json!({ "start_date": "2024-08-06", "end_date": "2024-08-09" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total_days"], 4);

    let (status, body) = rh.get(&format!("/api/leave-requests/balance/{}?year=2024", employee_id)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let annual = body["data"]["balances"]
        .as_array()
        .and_then(|lines| lines.iter().find(|l| l["leave_type"] == "annual"))
        .context("annual balance")?;
    assert_eq!(annual["used"], 10);
    assert_eq!(annual["remaining"], 15);

    // Six weeks is more than what is left this year
    let (status, body) = rh.post("/api/leave-requests", leave("2024-09-02", "2024-10-11")).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let long = body["data"]["id"].as_i64().context("leave id")?;
    let (status, body) = rh.post(&format!("/api/leave-requests/{}/approve", long), json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = rh.get(&format!("/api/leave-requests/stats?employee_id={}", employee_id)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["by_status"]["approved"], 1);
    assert_eq!(body["data"]["approved_days"], 10);

    // Someone outside HR with no employee record sees nothing
    let tech_id = create_user(Role::Technicien).await?;
    let tech = Api::as_user(tech_id, Role::Technicien).await?;
    let (status, _) = tech.get(&format!("/api/leave-requests/balance/{}", employee_id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn applications_need_a_published_open_request() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let rh_id = create_user(Role::Rh).await?;
    let rh = Api::as_user(rh_id, Role::Rh).await?;

    let (status, body) = rh
        .post(
            "/api/recruitment-requests",
            json!({
                "title": "Technicien réseau",
                "department": "Support",
                "position": "Technicien",
                "description": "Installation et maintenance des équipements clients",
                "employment_type": "full_time"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let request_id = body["data"]["id"].as_i64().context("request id")?;

    let application = || {
        json!({
            "recruitment_request_id": request_id,
            "candidate_name": "Fatou Sow",
            "candidate_email": format!("{}@candidat.sn", unique("candidate"))
        })
    };

    let (status, body) = rh.post("/api/recruitment-applications", application()).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = rh.post(&format!("/api/recruitment-requests/{}/publish", request_id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "published");

    let (status, body) = rh.post("/api/recruitment-applications", application()).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["recruitment_request_id"].as_i64(), Some(request_id));

    // A deadline in the past cannot be set through the API
    let pool = common::pool().await?;
    sqlx::query("UPDATE recruitment_requests SET application_deadline = CURRENT_DATE - 1 WHERE id = $1")
        .bind(request_id)
        .execute(&pool)
        .await?;

    let (status, body) = rh.post("/api/recruitment-applications", application()).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    Ok(())
}

#[tokio::test]
async fn only_the_evaluated_employee_signs() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let rh_id = create_user(Role::Rh).await?;
    let evaluated_id = create_user(Role::Technicien).await?;
    let colleague_id = create_user(Role::Technicien).await?;
    let rh = Api::as_user(rh_id, Role::Rh).await?;
    let evaluated = Api::as_user(evaluated_id, Role::Technicien).await?;
    let colleague = Api::as_user(colleague_id, Role::Technicien).await?;

    let (status, body) = rh
        .post(
            "/api/evaluations",
            json!({
                "employee_id": evaluated_id,
                "evaluation_type": "annual",
                "period_start": "2024-01-01",
                "period_end": "2024-12-31",
                "criteria": { "qualite": 16, "ponctualite": 14 }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().context("evaluation id")?;
    assert_eq!(num(&body["data"]["note_globale"]), 15.0);
    let sign = format!("/api/evaluations/{}/sign_employee", id);

    let (status, body) = colleague.post(&sign, json!({ "comments": "not mine" })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, body) = evaluated.post(&sign, json!({ "comments": "D'accord" })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "en_cours");
    assert!(body["data"]["signed_by_employee_at"].is_string());

    let (status, _) = evaluated.post(&sign, json!({})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // The colleague cannot read it either
    let (status, _) = colleague.get(&format!("/api/evaluations/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = evaluated.post(&format!("/api/evaluations/{}/finalize", id), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = rh.post(&format!("/api/evaluations/{}/finalize", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "finalisee");
    Ok(())
}

#[tokio::test]
async fn a_single_day_dashboard_is_accepted() -> Result<()> {
    if common::database_url().is_none() {
        return Ok(());
    }

    let patron_id = create_user(Role::Patron).await?;
    let patron = Api::as_user(patron_id, Role::Patron).await?;

    let (status, body) = patron
        .get("/api/reporting/dashboard?date_debut=2024-03-01&date_fin=2024-03-01")
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = patron
        .get("/api/reporting/dashboard?date_debut=2024-03-02&date_fin=2024-03-01")
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    assert!(body["errors"]["date_fin"].is_string());
    Ok(())
}
