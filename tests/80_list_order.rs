mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use crewplan_api::types::Role;

#[tokio::test]
async fn unknown_sort_column_is_a_bad_request() -> Result<()> {
    let Some(db) = common::database().await else { return Ok(()) };
    let admin = common::seed_user(&db, Role::Admin, &[], &[]).await?;
    let token = common::token_for(admin.id)?;

    for uri in ["/api/events?order=bogus_column", "/api/offers?order=bogus_column%20desc"] {
        let (status, body) = common::send(common::app()?, Method::GET, uri, Some(&token)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    let (status, _) =
        common::send(common::app()?, Method::GET, "/api/offers?order=total_gross%20desc", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
