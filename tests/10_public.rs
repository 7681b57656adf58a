mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let (status, body) = common::send(common::app()?, Method::GET, "/", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "CrewPlan API");
    assert!(body["data"]["endpoints"]["warehouse"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let (status, body) = common::send(common::app()?, Method::GET, "/health", None).await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );
    if status == StatusCode::SERVICE_UNAVAILABLE {
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    } else {
        assert_eq!(body["data"]["database"], "ok");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let (status, _) = common::send(common::app()?, Method::GET, "/nope", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
