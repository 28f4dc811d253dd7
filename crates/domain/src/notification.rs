//! # 通知
//!
//! ユーザーまたはストアに宛てたアプリ内通知ドキュメントを定義する。
//!
//! 1 件の通知は複数の受信者（`recipients[]`）を持ち、既読状態は受信者ごとに管理する。
//! 受信者が削除された場合は、その受信者エントリだけを取り除き、通知自体は残す。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::IntoStaticStr;

use crate::{DomainError, entity::DocumentId};

/// 受信者の種別
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientModel {
    User,
    Store,
}

/// 通知の受信者エントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub recipient_id:    DocumentId,
    pub recipient_model: RecipientModel,
    #[serde(default)]
    pub is_read:         bool,
}

impl Recipient {
    pub fn user(recipient_id: DocumentId) -> Self {
        Self {
            recipient_id,
            recipient_model: RecipientModel::User,
            is_read: false,
        }
    }

    pub fn store(recipient_id: DocumentId) -> Self {
        Self {
            recipient_id,
            recipient_model: RecipientModel::Store,
            is_read: false,
        }
    }
}

/// 通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    title:          String,
    description:    String,
    #[serde(rename = "type")]
    recipient_type: RecipientModel,
    #[serde(default)]
    recipients:     Vec<Recipient>,
}

impl Notification {
    /// 通知を作成する
    ///
    /// タイトルと本文は trim 後に空であってはならない。
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        recipient_type: RecipientModel,
        recipients: Vec<Recipient>,
    ) -> Result<Self, DomainError> {
        let title = title.into().trim().to_string();
        let description = description.into().trim().to_string();
        if title.is_empty() {
            return Err(DomainError::Validation("通知タイトルは必須です".to_string()));
        }
        if description.is_empty() {
            return Err(DomainError::Validation("通知本文は必須です".to_string()));
        }
        Ok(Self {
            title,
            description,
            recipient_type,
            recipients,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn to_document(&self) -> Result<JsonValue, DomainError> {
        serde_json::to_value(self).map_err(|e| DomainError::Validation(e.to_string()))
    }

    pub fn from_document(body: JsonValue) -> Result<Self, DomainError> {
        serde_json::from_value(body).map_err(|e| DomainError::Validation(e.to_string()))
    }
}
