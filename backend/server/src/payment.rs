//! # Payment Proofs
//!
//! Append-only log of payment-proof submissions. Each submission carries the
//! proof screenshot as base64 text, which is stored as-is.
//!
//! ## Validation
//! - `name`, `phone`, `planTitle`: present, not null, not empty
//! - `screenshotBase64`: present, not null, not empty, no format check
//! - `amount`: present, not null, not empty, **zero is a valid amount**
//! - `issueType`: optional free-form text
//!
//! Presence is checked before types. Numbers and booleans sent for text fields are kept
//! as their text form, numeric strings sent for `amount` are read as numbers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::info;

use crate::{
    database::Store,
    error::AppError::{self, Validation},
    utils::{filled, number, present, text},
};

pub const PAYMENT_REQUIRED: &str = "name, phone, planTitle, amount, screenshotBase64 required";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub phone: String,
    pub plan_title: String,
    pub amount: Number,
    pub screenshot_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProofRequest {
    pub name: Option<Value>,
    pub phone: Option<Value>,
    pub plan_title: Option<Value>,
    pub amount: Option<Value>,
    pub screenshot_base64: Option<Value>,
    pub issue_type: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPayment {
    pub name: String,
    pub phone: String,
    pub plan_title: String,
    pub amount: Number,
    pub screenshot_base64: String,
    pub issue_type: Option<String>,
}

impl PaymentProofRequest {
    pub fn validate(self) -> Result<NewPayment, AppError> {
        let (Some(name), Some(phone), Some(plan_title), Some(screenshot_base64), Some(amount)) = (
            filled(self.name),
            filled(self.phone),
            filled(self.plan_title),
            present(self.screenshot_base64),
            present(self.amount),
        ) else {
            return Err(Validation(PAYMENT_REQUIRED));
        };

        Ok(NewPayment {
            name: text("name", name)?,
            phone: text("phone", phone)?,
            plan_title: text("planTitle", plan_title)?,
            amount: number("amount", amount)?,
            screenshot_base64: text("screenshotBase64", screenshot_base64)?,
            issue_type: self
                .issue_type
                .map(|issue_type| text("issueType", issue_type))
                .transpose()?,
        })
    }
}

pub async fn submit(store: &dyn Store, request: PaymentProofRequest) -> Result<Payment, AppError> {
    let new_payment = request.validate()?;
    let payment = store.insert_payment(new_payment).await?;

    info!(id = %payment.id, plan = %payment.plan_title, "Payment stored");

    Ok(payment)
}

pub async fn list_payments(store: &dyn Store) -> Result<Vec<Payment>, AppError> {
    Ok(store.list_payments().await?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryStore;

    fn request(body: serde_json::Value) -> PaymentProofRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid() -> serde_json::Value {
        json!({
            "name": "A",
            "phone": "1",
            "planTitle": "Basic",
            "amount": 499,
            "screenshotBase64": "abc",
        })
    }

    fn with(field: &str, value: serde_json::Value) -> serde_json::Value {
        let mut body = valid();
        body[field] = value;
        body
    }

    fn without(field: &str) -> serde_json::Value {
        let mut body = valid();
        body.as_object_mut().unwrap().remove(field);
        body
    }

    #[tokio::test]
    async fn test_zero_amount_is_accepted() {
        let store = MemoryStore::default();

        let payment = submit(&store, request(with("amount", json!(0))))
            .await
            .unwrap();

        assert_eq!(payment.amount, Number::from(0));
        assert_eq!(list_payments(&store).await.unwrap(), vec![payment]);
    }

    #[test]
    fn test_missing_or_null_amount_is_rejected() {
        for body in [without("amount"), with("amount", json!(null))] {
            assert!(matches!(
                request(body).validate(),
                Err(Validation(PAYMENT_REQUIRED))
            ));
        }
    }

    #[test]
    fn test_loose_types_are_cast() {
        let mut body = with("amount", json!("12"));
        body["phone"] = json!(5551234);
        body["issueType"] = json!(7);

        let new_payment = request(body).validate().unwrap();

        assert_eq!(new_payment.amount, Number::from(12));
        assert_eq!(new_payment.phone, "5551234");
        assert_eq!(new_payment.issue_type.as_deref(), Some("7"));
    }

    #[test]
    fn test_empty_or_unreadable_amount() {
        assert!(matches!(
            request(with("amount", json!(""))).validate(),
            Err(Validation(PAYMENT_REQUIRED))
        ));
        assert!(matches!(
            request(with("amount", json!("ten"))).validate(),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_empty_screenshot_is_rejected() {
        for body in [
            with("screenshotBase64", json!("")),
            with("screenshotBase64", json!(null)),
            without("screenshotBase64"),
        ] {
            assert!(matches!(
                request(body).validate(),
                Err(Validation(PAYMENT_REQUIRED))
            ));
        }
    }

    #[test]
    fn test_empty_text_fields_are_rejected() {
        for field in ["name", "phone", "planTitle"] {
            assert!(request(with(field, json!(""))).validate().is_err());
            assert!(request(without(field)).validate().is_err());
        }
    }

    #[tokio::test]
    async fn test_issue_type_is_optional() {
        let store = MemoryStore::default();

        let payment = submit(&store, request(valid())).await.unwrap();
        assert_eq!(payment.issue_type, None);

        let value = serde_json::to_value(&payment).unwrap();
        assert!(value.get("issueType").is_none());
        assert_eq!(value["planTitle"], "Basic");
        assert_eq!(value["amount"], 499);

        let payment = submit(&store, request(with("issueType", json!("wrong amount"))))
            .await
            .unwrap();
        assert_eq!(payment.issue_type.as_deref(), Some("wrong amount"));
    }

    #[tokio::test]
    async fn test_submissions_are_never_merged() {
        let store = MemoryStore::default();

        let first = submit(&store, request(valid())).await.unwrap();
        let second = submit(&store, request(valid())).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(list_payments(&store).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_payments_newest_first() {
        let store = MemoryStore::default();

        for plan in ["t1", "t2", "t3"] {
            submit(&store, request(with("planTitle", json!(plan))))
                .await
                .unwrap();
        }

        let plans: Vec<String> = list_payments(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|payment| payment.plan_title)
            .collect();

        assert_eq!(plans, ["t3", "t2", "t1"]);
    }
}
