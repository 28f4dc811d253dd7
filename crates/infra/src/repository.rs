//! # リポジトリ実装
//!
//! ドキュメントコレクションの抽象と、その PostgreSQL 実装、
//! 参照整理を組み込んだ削除フックを提供する。
//!
//! ## 設計方針
//!
//! - **ケイパビリティの注入**: 参照整理エンジンは [`DocumentCollection`] トレイトだけに依存する
//! - **データベース抽象化**: sqlx を使用し、PostgreSQL 固有の処理をカプセル化
//! - **テスタビリティ**: トレイト経由でインメモリ実装に差し替え可能

pub mod cascading_repository;
pub mod document_collection;
pub mod postgres_collection;

pub use cascading_repository::CascadingRepository;
pub use document_collection::{DocumentCollection, DocumentFilter, element_pattern, json_contains};
pub use postgres_collection::PostgresDocumentCollection;
