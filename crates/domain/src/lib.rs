//! # Ichiba ドメイン層
//!
//! マーケットプレイスのドメインモデルと、親エンティティ削除時の
//! 参照整理ルールを定義する。
//!
//! ## 依存関係の方向
//!
//! ```text
//! apps → infra → domain
//!          ↘
//!           shared
//! ```
//!
//! ドメイン層はインフラ層（DB、外部サービス）に一切依存しない。
//! 参照ルール表もここで定義し、永続化層はそれを解釈して実行するだけにする。
//!
//! ## モジュール構成
//!
//! - [`entity`] - エンティティ種別とドキュメント ID
//! - [`reference`] - 参照ルール表と起動時検証
//! - [`cart`] - カートと派生フィールド（合計点数）
//! - [`notification`] - 受信者つき通知
//! - [`error`] - ドメイン層エラー
//!
//! ## 使用例
//!
//! ```rust
//! use ichiba_domain::{entity::EntityKind, reference::RuleTable};
//!
//! let table = RuleTable::marketplace();
//! table.ensure_valid().unwrap();
//!
//! // ルールを持たない種別は空スライス（整理対象なし）
//! assert!(table.rules_for(EntityKind::Review).is_empty());
//! ```

pub mod cart;
pub mod entity;
pub mod error;
pub mod notification;
pub mod reference;

pub use error::DomainError;
