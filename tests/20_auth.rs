mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use uuid::Uuid;

const PROTECTED: &[(Method, &str)] = &[
    (Method::GET, "/api/events"),
    (Method::GET, "/api/users/me"),
    (Method::GET, "/api/assignments/mine"),
    (Method::GET, "/api/warehouse/items"),
    (Method::GET, "/api/offers"),
    (Method::POST, "/api/calendar/sync"),
    (Method::POST, "/api/users"),
];

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    for (method, uri) in PROTECTED {
        let (status, body) = common::send(common::app()?, method.clone(), uri, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_unauthorized() -> Result<()> {
    let (status, body) =
        common::send(common::app()?, Method::GET, "/api/events", Some("not.a.jwt")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn expired_token_is_unauthorized() -> Result<()> {
    let token = common::expired_token()?;
    let (status, _) =
        common::send(common::app()?, Method::GET, "/api/offers", Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_signed_with_another_secret_is_unauthorized() -> Result<()> {
    let claims = crewplan_api::auth::Claims::new(Uuid::new_v4(), None);
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"someone-else"),
    )?;
    let (status, _) =
        common::send(common::app()?, Method::GET, "/api/warehouse/items", Some(&forged)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn minted_tokens_validate() -> Result<()> {
    let id = Uuid::new_v4();
    let token = common::token_for(id)?;
    let claims = crewplan_api::auth::validate_jwt(&token)?;
    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, crewplan_api::auth::AUTHENTICATED_ROLE);
    Ok(())
}
