//! # Ichiba インフラ層
//!
//! ドキュメントの永続化と、親エンティティ削除時の参照整理を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **ドキュメントコレクション**: `id UUID` + `body JSONB` テーブルの操作
//! - **参照整理**: ドメイン層の参照ルール表を解釈し、子コレクションを削除・更新する
//! - **削除フック**: 親の物理削除の前に参照整理を必ず実行する
//!
//! ## 依存関係
//!
//! ```text
//! apps → infra → domain
//!          ↘
//!           shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - ドキュメントコレクションと削除フック
//! - [`deletion`] - 参照整理エンジン
//! - `mock` - インメモリコレクション（`test-utils` feature）

pub mod db;
pub mod deletion;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
