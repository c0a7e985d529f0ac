use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    database::{Store, new_id, now},
    error::StoreError,
    payment::{NewPayment, Payment},
    user::{NewUser, User},
};

/// In-process store for tests. Records are kept in creation order, so a stable
/// sort on `createdAt` breaks same-millisecond ties by insertion.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    payments: Mutex<Vec<Payment>>,
}

fn newest_first<T: Clone>(records: &[T], created_at: impl Fn(&T) -> i64) -> Vec<T> {
    let mut records: Vec<T> = records.iter().rev().cloned().collect();
    records.sort_by_key(|record| std::cmp::Reverse(created_at(record)));
    records
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        let now = now();

        if let Some(user) = users.iter_mut().find(|user| user.phone == new_user.phone) {
            user.name = new_user.name;
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: new_id(),
            name: new_user.name,
            phone: new_user.phone,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock().unwrap();

        Ok(newest_first(users.as_slice(), |user| user.created_at.timestamp_millis()))
    }

    async fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment, StoreError> {
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
        self.payments.lock().unwrap().push(payment.clone());

        Ok(payment)
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError> {
        let payments = self.payments.lock().unwrap();

        Ok(newest_first(payments.as_slice(), |payment| {
            payment.created_at.timestamp_millis()
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
