use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::ApiResponse;
use crate::config::Config;

pub mod multipart;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Vendor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

pub fn generate_token(
    subject: Uuid,
    role: Role,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration().as_secs() as i64)).timestamp();

    let claims = Claims {
        sub: subject.to_string(),
        role,
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Lowercase, collapse every run of non-alphanumerics into one `-`, trim dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Random numeric code of `digits` length, leading zeros kept.
pub fn generate_numeric_code(digits: u32) -> String {
    let upper = 10u64.pow(digits);
    let n = rand::rng().random_range(0..upper);
    format!("{:0width$}", n, width = digits as usize)
}

pub fn round_money(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Percentage off the actual price. Zero when the actual price is not positive.
pub fn discount_percentage(actual: Decimal, selling: Decimal, dp: u32) -> Decimal {
    if actual <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money((actual - selling) / actual * Decimal::ONE_HUNDRED, dp)
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    success_with_message("success", data)
}

pub fn success_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: true,
        code: error_codes::SUCCESS,
        message: message.into(),
        data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, message: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: false,
        code,
        message,
        data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const ALREADY_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: "unit-test-secret".into(),
            jwt_expiration_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            api_base_uri: "/".into(),
            allowed_origins: vec![],
            storage: Default::default(),
            smtp: None,
            google_api_key: None,
        }
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify("Laptops & Computers"), "laptops-computers");
        assert_eq!(slugify("  --Gaming   Mice!! "), "gaming-mice");
        assert_eq!(slugify("4K TVs"), "4k-tvs");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn numeric_code_has_fixed_width() {
        for _ in 0..50 {
            let code = generate_numeric_code(4);
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(generate_numeric_code(10).len(), 10);
    }

    #[test]
    fn discount_is_rounded() {
        let d = discount_percentage(Decimal::new(3000, 0), Decimal::new(2000, 0), 0);
        assert_eq!(d, Decimal::new(33, 0));
        let d = discount_percentage(Decimal::new(3000, 0), Decimal::new(2000, 0), 2);
        assert_eq!(d, Decimal::new(3333, 2));
        assert_eq!(
            discount_percentage(Decimal::ZERO, Decimal::new(10, 0), 2),
            Decimal::ZERO
        );
    }

    #[test]
    fn token_round_trip_keeps_role() {
        let config = test_config();
        let id = Uuid::new_v4();
        let (token, exp) = generate_token(id, Role::Vendor, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Vendor);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let (token, _) = generate_token(Uuid::new_v4(), Role::User, &config).unwrap();
        let mut other = test_config();
        other.jwt_secret = "another-secret".into();
        assert!(verify_token(&token, &other).is_err());
    }
}
