use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

pub const MAX_ADDRESSES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    Home,
    Work,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 128, message = "full_name is required"))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20, message = "phone must be 7-20 characters"))]
    pub phone: String,
    #[validate(length(min = 3, max = 12, message = "pincode is required"))]
    pub pincode: String,
    #[validate(length(min = 1, max = 512, message = "address is required"))]
    pub address: String,
    pub landmark: Option<String>,
    #[validate(length(min = 1, max = 128, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 128, message = "state is required"))]
    pub state: String,
    pub address_type: AddressType,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(json)]
    pub addresses: Vec<Address>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 64, message = "first_name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64, message = "last_name is required"))]
    pub last_name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 6, max = 72, message = "password must be 6-72 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub last_name: Option<String>,
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 72, message = "password must be 6-72 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 72, message = "new_password must be 6-72 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAddressRequest {
    #[validate(nested)]
    pub address: Address,
}

/// Append an address, keeping at most one default.
pub fn add_address(addresses: &mut Vec<Address>, mut address: Address) -> Result<(), AppError> {
    if addresses.len() >= MAX_ADDRESSES {
        return Err(AppError::BadRequest(format!(
            "A user can save at most {MAX_ADDRESSES} addresses"
        )));
    }
    if addresses.iter().any(|a| a.id == address.id) {
        address.id = Uuid::new_v4();
    }
    if addresses.is_empty() {
        address.is_default = true;
    }
    if address.is_default {
        addresses.iter_mut().for_each(|a| a.is_default = false);
    }
    addresses.push(address);
    Ok(())
}

/// Replace the address with the same id.
pub fn merge_address(addresses: &mut [Address], address: Address) -> Result<(), AppError> {
    let make_default = address.is_default;
    let id = address.id;
    let slot = addresses
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| AppError::not_found("Address"))?;
    *slot = address;
    if make_default {
        addresses
            .iter_mut()
            .filter(|a| a.id != id)
            .for_each(|a| a.is_default = false);
    }
    Ok(())
}

pub fn remove_address(addresses: &mut Vec<Address>, id: Uuid) -> Result<(), AppError> {
    let before = addresses.len();
    addresses.retain(|a| a.id != id);
    if addresses.len() == before {
        return Err(AppError::not_found("Address"));
    }
    if !addresses.is_empty() && !addresses.iter().any(|a| a.is_default) {
        addresses[0].is_default = true;
    }
    Ok(())
}

impl User {
    pub async fn create(
        pool: &PgPool,
        req: &SignupRequest,
        password_hash: String,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(password_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn update_profile<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        req: &UpdateUserRequest,
        addresses: &[Address],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                addresses = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.first_name.as_deref().map(str::trim))
        .bind(req.last_name.as_deref().map(str::trim))
        .bind(req.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(Json(addresses))
        .fetch_one(executor)
        .await
    }

    pub async fn save_addresses<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        addresses: &[Address],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET addresses = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(addresses))
        .fetch_one(executor)
        .await
    }

    /// Edit the address list under a row lock so concurrent edits serialize.
    /// Profile fields in `profile` are written in the same statement.
    pub async fn edit_addresses<F>(
        pool: &PgPool,
        id: Uuid,
        profile: Option<&UpdateUserRequest>,
        edit: F,
    ) -> Result<Self, AppError>
    where
        F: FnOnce(&mut Vec<Address>) -> Result<(), AppError>,
    {
        let mut tx = pool.begin().await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let mut addresses = user.addresses;
        edit(&mut addresses)?;

        let user = match profile {
            Some(req) => User::update_profile(&mut *tx, id, req, &addresses).await?,
            None => User::save_addresses(&mut *tx, id, &addresses).await?,
        };
        tx.commit().await?;
        Ok(user)
    }

    pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: String) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn address(&self, id: Uuid) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(default: bool) -> Address {
        Address {
            id: Uuid::new_v4(),
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            pincode: "560001".into(),
            address: "12 MG Road".into(),
            landmark: None,
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            address_type: AddressType::Home,
            is_default: default,
        }
    }

    #[test]
    fn first_address_becomes_default() {
        let mut list = vec![];
        add_address(&mut list, address(false)).unwrap();
        assert!(list[0].is_default);
    }

    #[test]
    fn address_limit_is_enforced() {
        let mut list = vec![];
        for _ in 0..MAX_ADDRESSES {
            add_address(&mut list, address(false)).unwrap();
        }
        assert!(matches!(
            add_address(&mut list, address(false)),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(list.len(), MAX_ADDRESSES);
    }

    #[test]
    fn only_one_default_after_merge() {
        let mut list = vec![];
        add_address(&mut list, address(false)).unwrap();
        add_address(&mut list, address(false)).unwrap();
        let mut second = list[1].clone();
        second.is_default = true;
        second.city = "Mysuru".into();
        merge_address(&mut list, second).unwrap();
        assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);
        assert!(list[1].is_default);
        assert_eq!(list[1].city, "Mysuru");
    }

    #[test]
    fn merge_unknown_address_is_not_found() {
        let mut list = vec![address(true)];
        assert!(matches!(
            merge_address(&mut list, address(false)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn removing_default_promotes_next() {
        let mut list = vec![];
        add_address(&mut list, address(false)).unwrap();
        add_address(&mut list, address(false)).unwrap();
        let first = list[0].id;
        remove_address(&mut list, first).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_default);
    }

    #[test]
    fn address_requires_fields() {
        let mut a = address(false);
        a.city.clear();
        assert!(a.validate().is_err());
    }
}
