//! Fixtures shared by the cells' test suites: a config pointing at a mock
//! PostgREST server, users in each role, and HS256 tokens signed the way
//! the auth provider signs them.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, DEFAULT_PORT};
use shared_models::auth::User;

const TEST_JWT_SECRET: &str = "scheduling-test-secret-at-least-32-bytes";
const TEST_ANON_KEY: &str = "test-anon-key";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::with_supabase_url("http://localhost:54321")
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: url.to_string(),
            supabase_anon_key: TEST_ANON_KEY.to_string(),
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            port: DEFAULT_PORT,
            slot_conflict_match_end_time: false,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A caller with a fresh random id in one of the platform roles.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }

    fn claims(&self, lifetime: Duration) -> Value {
        let issued = Utc::now();
        json!({
            "sub": self.id,
            "email": self.email,
            "role": self.role,
            "iat": issued.timestamp(),
            "exp": (issued + lifetime).timestamp(),
        })
    }
}

fn sign_hs256(claims: &Value, secret: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header, payload);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("any key length is valid for HMAC");
    mac.update(signing_input.as_bytes());

    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// Token valid for `exp_hours` (24 when `None`). Negative hours yield an
    /// already expired token.
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        sign_hs256(&user.claims(Duration::hours(exp_hours.unwrap_or(24))), secret)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "not-the-configured-secret", None)
    }

    /// Ready-made `Authorization` header value.
    pub fn bearer(user: &TestUser, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(user, secret, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;

    #[test]
    fn config_points_at_given_server() {
        let config = TestConfig::with_supabase_url("http://127.0.0.1:9999").to_app_config();

        assert_eq!(config.supabase_url, "http://127.0.0.1:9999");
        assert!(config.is_configured());
        assert!(config.is_auth_configured());
    }

    #[test]
    fn signed_token_validates_back_to_the_user() {
        let config = TestConfig::default();
        let doctor = TestUser::doctor("doc@example.com");

        let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
        let user = validate_token(&token, &config.jwt_secret).unwrap();

        assert_eq!(user.id, doctor.id);
        assert!(user.has_role("doctor"));
        assert!(JwtTestUtils::bearer(&doctor, &config.jwt_secret).starts_with("Bearer "));
    }
}
