//! # 参照整理基盤
//!
//! 親エンティティの削除時に、他のコレクションに残る参照を整理する。
//!
//! ## 概要
//!
//! 種別ごとの [`DocumentCollection`](crate::repository::DocumentCollection) 実装を
//! [`CollectionRegistry`] に登録し、参照ルール表とあわせて [`ReferenceCleaner`] に渡す。
//! 削除口からは [`CascadingRepository`](crate::repository::CascadingRepository) を通して
//! 呼び出す。
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use ichiba_domain::{entity::EntityKind, reference::RuleTable};
//! use ichiba_infra::{
//!     deletion::{CollectionRegistry, ReferenceCleaner},
//!     repository::CascadingRepository,
//! };
//!
//! let cleaner = Arc::new(ReferenceCleaner::new(
//!     RuleTable::marketplace(),
//!     CollectionRegistry::with_postgres(pool),
//! )?);
//! let stores = CascadingRepository::for_kind(cleaner, EntityKind::Store)?;
//! stores.delete_by_id(&store_id).await?;
//! ```

mod cleaner;
mod registry;

pub use cleaner::ReferenceCleaner;
pub use registry::CollectionRegistry;
