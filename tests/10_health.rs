mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let api = common::Api::anonymous().await?;
    let (status, body) = api.get("/health").await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );
    assert_eq!(body["success"].as_bool(), Some(status == StatusCode::OK));
    assert!(body["data"]["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_reports_degraded_without_database() -> Result<()> {
    if common::database_url().is_some() {
        return Ok(());
    }
    let api = common::Api::anonymous().await?;
    let (status, body) = api.get("/health").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["data"]["status"], "degraded");
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let api = common::Api::anonymous().await?;
    let (status, body) = api.get("/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "EasyConnect API");
    assert!(body["data"]["version"].is_string());
    assert!(body["data"]["endpoints"]["reporting"].is_string());
    Ok(())
}
