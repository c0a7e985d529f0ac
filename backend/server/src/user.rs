//! # Users
//!
//! One identity record per phone number. Registering again with a known phone
//! overwrites the name in place, `createdAt` and `_id` are kept.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    database::Store,
    error::AppError::{self, Validation},
    utils::{filled, text},
};

pub const REGISTER_REQUIRED: &str = "Name and phone required";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields stay untyped until validation so that falsy input always gets the
/// fixed message, whatever its JSON type.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<Value>,
    pub phone: Option<Value>,
}

/// Validated registration, the only input the store accepts for users.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub phone: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let (Some(name), Some(phone)) = (filled(self.name), filled(self.phone)) else {
            return Err(Validation(REGISTER_REQUIRED));
        };

        Ok(NewUser {
            name: text("name", name)?,
            phone: text("phone", phone)?,
        })
    }
}

pub async fn register(store: &dyn Store, request: RegisterRequest) -> Result<User, AppError> {
    let new_user = request.validate()?;

    Ok(store.upsert_user(new_user).await?)
}

pub async fn list_users(store: &dyn Store) -> Result<Vec<User>, AppError> {
    Ok(store.list_users().await?)
}
