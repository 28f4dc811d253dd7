//! # CollectionRegistry
//!
//! エンティティ種別ごとの `DocumentCollection` を集約し、参照整理エンジンに注入する。

use std::{collections::HashMap, sync::Arc};

use ichiba_domain::{entity::EntityKind, reference::RuleTable};
use sqlx::PgPool;
use strum::IntoEnumIterator;

use crate::{
    error::InfraError,
    repository::{DocumentCollection, PostgresDocumentCollection},
};

/// ドキュメントコレクションのレジストリ
///
/// 種別ごとに 1 つのコレクションを保持する。
#[derive(Clone, Default)]
pub struct CollectionRegistry {
    collections: HashMap<EntityKind, Arc<dyn DocumentCollection>>,
}

impl CollectionRegistry {
    /// 空のレジストリを生成する
    pub fn new() -> Self {
        Self::default()
    }

    /// コレクションを登録する
    ///
    /// 同じ種別が登録済みの場合は置き換え、以前のコレクションを返す。
    pub fn register(
        &mut self,
        collection: Arc<dyn DocumentCollection>,
    ) -> Option<Arc<dyn DocumentCollection>> {
        self.collections.insert(collection.kind(), collection)
    }

    /// 全種別の PostgreSQL コレクションを登録済みのレジストリを生成する
    pub fn with_postgres(pool: PgPool) -> Self {
        let mut registry = Self::new();
        for kind in EntityKind::iter() {
            registry.register(Arc::new(PostgresDocumentCollection::new(pool.clone(), kind)));
        }
        registry
    }

    /// 種別のコレクションを取得する
    pub fn get(&self, kind: EntityKind) -> Result<&Arc<dyn DocumentCollection>, InfraError> {
        self.collections
            .get(&kind)
            .ok_or_else(|| InfraError::unregistered_collection(kind))
    }

    /// 登録済みの種別一覧を返す
    pub fn registered_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.collections.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// ルール表が参照しているのに登録されていない種別の一覧を返す（配線漏れ検出用）
    pub fn missing_kinds(&self, rules: &RuleTable) -> Vec<EntityKind> {
        rules
            .referenced_kinds()
            .into_iter()
            .filter(|kind| !self.collections.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("kinds", &self.registered_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::InfraErrorKind, mock::InMemoryCollection};

    #[test]
    fn test_空のレジストリは全種別が不足している() {
        let registry = CollectionRegistry::new();

        assert!(registry.registered_kinds().is_empty());
        assert_eq!(
            registry.missing_kinds(&RuleTable::marketplace()),
            RuleTable::marketplace().referenced_kinds()
        );
    }

    #[test]
    fn test_登録した種別はregistered_kindsに並ぶ() {
        let mut registry = CollectionRegistry::new();
        registry.register(Arc::new(InMemoryCollection::new(EntityKind::Review)));
        registry.register(Arc::new(InMemoryCollection::new(EntityKind::Cart)));

        assert_eq!(
            registry.registered_kinds(),
            vec![EntityKind::Cart, EntityKind::Review]
        );
    }

    #[test]
    fn test_同じ種別の再登録は置き換える() {
        let mut registry = CollectionRegistry::new();
        let first = registry.register(Arc::new(InMemoryCollection::new(EntityKind::Cart)));
        let second = registry.register(Arc::new(InMemoryCollection::new(EntityKind::Cart)));

        assert!(first.is_none());
        assert!(second.is_some());
        assert_eq!(registry.registered_kinds().len(), 1);
    }

    #[test]
    fn test_未登録の種別の取得はエラー() {
        let registry = CollectionRegistry::new();

        let Err(err) = registry.get(EntityKind::Wishlist) else {
            panic!("未登録の種別は取得できないこと");
        };
        assert!(matches!(
            err.kind(),
            InfraErrorKind::UnregisteredCollection(EntityKind::Wishlist)
        ));
    }

    #[test]
    fn test_全種別を登録するとmissing_kindsは空() {
        let mut registry = CollectionRegistry::new();
        for kind in EntityKind::iter() {
            registry.register(Arc::new(InMemoryCollection::new(kind)));
        }

        assert!(registry.missing_kinds(&RuleTable::marketplace()).is_empty());
    }
}
