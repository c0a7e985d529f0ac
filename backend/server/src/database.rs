//! # Redis
//!
//! Document store for users and payment proofs.
//!
//! ## Requirements
//!
//! - One user per phone number, even under concurrent registrations
//! - Payment proofs are append-only and immutable
//! - Both collections list newest first
//! - Proof screenshots are base64 text, up to ~15 MB per document
//!
//! ## Implementation
//!
//! - Every key lives under the configured namespace (`tvt_db` by default)
//! - Users: one hash per phone at `{ns}:users:{phone}`
//! - Users index: sorted set `{ns}:users`, score is `createdAt` in ms, member is the phone
//! - Upsert is a single MULTI/EXEC: `HSETNX` keeps `_id` and `createdAt` from the first
//!   registration, `HSET` overwrites name and `updatedAt`, `ZADD NX` indexes once,
//!   `HGETALL` reads back the post-write state inside the same transaction
//! - Payments: one JSON document per submission at `{ns}:payments:{id}`
//! - Payments index: sorted set `{ns}:payments`, score is `createdAt` in ms
//! - Listing: `ZREVRANGE` for the order, then one pipelined round trip for the documents
//! - Same-millisecond ties: `ZREVRANGE` falls back to the member, descending. Payment ids are
//!   UUID v7, so ties keep creation order. Users tie on phone, which carries no time order.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use uuid::Uuid;

use crate::{
    error::StoreError,
    payment::{NewPayment, Payment},
    user::{NewUser, User},
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment, StoreError>;

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Timestamps are kept at millisecond precision so that what is stored, what
/// is returned and the index score all agree.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// UUID v7 in simple form. Ids sort by creation time, including ids minted
/// within the same millisecond by this process.
pub fn new_id() -> String {
    Uuid::now_v7().simple().to_string()
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    namespace: String,
}

pub async fn init_redis(redis_url: &str, namespace: &str) -> Result<RedisStore, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_secs(5));

    let client = Client::open(redis_url)?;
    let connection = client.get_connection_manager_with_config(config).await?;

    Ok(RedisStore {
        connection,
        namespace: namespace.to_string(),
    })
}

impl RedisStore {
    fn users_index(&self) -> String {
        format!("{}:users", self.namespace)
    }

    fn user_key(&self, phone: &str) -> String {
        format!("{}:users:{phone}", self.namespace)
    }

    fn payments_index(&self) -> String {
        format!("{}:payments", self.namespace)
    }

    fn payment_key(&self, id: &str) -> String {
        format!("{}:payments:{id}", self.namespace)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn upsert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut connection = self.connection.clone();

        let key = self.user_key(&new_user.phone);
        let now = now();
        let stamp = format_timestamp(&now);

        let (fields,): (HashMap<String, String>,) = redis::pipe()
            .atomic()
            .hset_nx(&key, "_id", new_id())
            .ignore()
            .hset_nx(&key, "createdAt", &stamp)
            .ignore()
            .hset_multiple(
                &key,
                &[
                    ("name", new_user.name.as_str()),
                    ("phone", new_user.phone.as_str()),
                    ("updatedAt", stamp.as_str()),
                ],
            )
            .ignore()
            .cmd("ZADD")
            .arg(self.users_index())
            .arg("NX")
            .arg(now.timestamp_millis())
            .arg(&new_user.phone)
            .ignore()
            .hgetall(&key)
            .query_async(&mut connection)
            .await?;

        user_from_hash(&key, fields)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut connection = self.connection.clone();

        let phones: Vec<String> = connection.zrevrange(self.users_index(), 0, -1).await?;
        if phones.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = phones.iter().map(|phone| self.user_key(phone)).collect();

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.hgetall(key);
        }
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut connection).await?;

        keys.into_iter()
            .zip(hashes)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(key, fields)| user_from_hash(&key, fields))
            .collect()
    }

    async fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment, StoreError> {
        let mut connection = self.connection.clone();

        let now = now();
        let payment = Payment {
            id: new_id(),
            name: new_payment.name,
            phone: new_payment.phone,
            plan_title: new_payment.plan_title,
            amount: new_payment.amount,
            screenshot_base64: new_payment.screenshot_base64,
            issue_type: new_payment.issue_type,
            created_at: now,
            updated_at: now,
        };

        let key = self.payment_key(&payment.id);
        let document = serde_json::to_string(&payment).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let () = redis::pipe()
            .atomic()
            .set(&key, document)
            .ignore()
            .zadd(self.payments_index(), &payment.id, now.timestamp_millis())
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(payment)
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError> {
        let mut connection = self.connection.clone();

        let ids: Vec<String> = connection.zrevrange(self.payments_index(), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.payment_key(id)).collect();
        let documents: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut connection)
            .await?;

        keys.into_iter()
            .zip(documents)
            .filter_map(|(key, document)| document.map(|document| (key, document)))
            .map(|(key, document)| {
                serde_json::from_str(&document).map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(())
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn user_from_hash(key: &str, mut fields: HashMap<String, String>) -> Result<User, StoreError> {
    let mut take = |field: &str| {
        fields.remove(field).ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("missing {field}"),
        })
    };

    let id = take("_id")?;
    let name = take("name")?;
    let phone = take("phone")?;
    let created_at = take("createdAt")?;
    let updated_at = take("updatedAt")?;

    Ok(User {
        id,
        name,
        phone,
        created_at: parse_timestamp(key, &created_at)?,
        updated_at: parse_timestamp(key, &updated_at)?,
    })
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("bad timestamp {value}: {e}"),
        })
}
