//! テスト共通フィクスチャ
//!
//! 全種別のインメモリコレクションを登録したマーケットプレイスと、
//! ドキュメント生成ヘルパー。Rust の統合テスト規約に従い `tests/common/mod.rs`
//! に配置。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use ichiba_domain::{
    entity::{DocumentId, EntityKind},
    reference::RuleTable,
};
use ichiba_infra::{
    deletion::{CollectionRegistry, ReferenceCleaner},
    mock::InMemoryCollection,
};
use serde_json::{Value as JsonValue, json};
use strum::IntoEnumIterator;

/// 全種別のインメモリコレクションと参照整理エンジン
pub struct Marketplace {
    pub cleaner: Arc<ReferenceCleaner>,
    collections: HashMap<EntityKind, InMemoryCollection>,
}

impl Marketplace {
    /// マーケットプレイス標準のルール表で構築する
    pub fn new() -> Self {
        let (registry, collections) = in_memory_registry();
        let cleaner = ReferenceCleaner::new(RuleTable::marketplace(), registry)
            .expect("標準のルール表で構築できること");
        Self {
            cleaner: Arc::new(cleaner),
            collections,
        }
    }

    /// 検証を行わずに任意のルール表で構築する
    pub fn with_rules_unchecked(rules: RuleTable) -> Self {
        let (registry, collections) = in_memory_registry();
        Self {
            cleaner: Arc::new(ReferenceCleaner::new_unchecked(rules, registry)),
            collections,
        }
    }

    pub fn collection(&self, kind: EntityKind) -> &InMemoryCollection {
        &self.collections[&kind]
    }

    /// ドキュメントを追加して ID を返す
    pub fn seed(&self, kind: EntityKind, body: JsonValue) -> DocumentId {
        let id = DocumentId::new();
        self.collection(kind).seed(id, body);
        id
    }

    pub fn body(&self, kind: EntityKind, id: &DocumentId) -> Option<JsonValue> {
        self.collection(kind).get(id)
    }

    pub fn exists(&self, kind: EntityKind, id: &DocumentId) -> bool {
        self.collection(kind).contains(id)
    }

    /// 全コレクションに発行された操作の総数
    pub fn total_operations(&self) -> usize {
        self.collections
            .values()
            .map(|c| c.operations().len())
            .sum()
    }

    pub fn clear_operations(&self) {
        for collection in self.collections.values() {
            collection.clear_operations();
        }
    }

    /// 全コレクションのスナップショット
    pub fn snapshot(&self) -> Vec<(EntityKind, Vec<(DocumentId, JsonValue)>)> {
        EntityKind::iter()
            .map(|kind| (kind, self.collection(kind).documents()))
            .collect()
    }
}

fn in_memory_registry() -> (CollectionRegistry, HashMap<EntityKind, InMemoryCollection>) {
    let mut registry = CollectionRegistry::new();
    let mut collections = HashMap::new();
    for kind in EntityKind::iter() {
        let collection = InMemoryCollection::new(kind);
        registry.register(Arc::new(collection.clone()));
        collections.insert(kind, collection);
    }
    (registry, collections)
}

// ===== ドキュメント生成ヘルパー =====

pub fn cart_item(store_product: &DocumentId, quantity: u32) -> JsonValue {
    json!({"storeProduct": store_product.to_string(), "quantity": quantity})
}

pub fn cart(user: &DocumentId, items: Vec<JsonValue>, total_items: u64) -> JsonValue {
    json!({"userId": user.to_string(), "items": items, "totalItems": total_items})
}

pub fn recipient(id: &DocumentId, model: &str) -> JsonValue {
    json!({"recipientId": id.to_string(), "recipientModel": model, "isRead": false})
}

pub fn notification(title: &str, recipients: Vec<JsonValue>) -> JsonValue {
    json!({"title": title, "description": "", "type": "user", "recipients": recipients})
}
