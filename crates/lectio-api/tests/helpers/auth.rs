use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use lectio_api::auth::JwtClaims;
use uuid::Uuid;

/// Secret shared by the test app and the tokens minted here.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// A caller with a valid bearer token.
pub struct TestUser {
    pub user_id: Uuid,
    pub token: String,
}

pub fn token_for(user_id: Uuid, expires_in_secs: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id,
        exp: now + expires_in_secs,
        iat: Some(now),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test token")
}

pub fn test_user() -> TestUser {
    let user_id = Uuid::new_v4();
    TestUser {
        user_id,
        token: token_for(user_id, 3600, TEST_JWT_SECRET),
    }
}
