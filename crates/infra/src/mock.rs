//! # テスト用インメモリコレクション
//!
//! 参照整理のテストで使用するインメモリの [`DocumentCollection`] 実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! ichiba-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! - 照合は PostgreSQL 実装と同じ JSONB 包含の規則に従う
//! - 各操作の前に `tokio::task::yield_now()` で制御を返し、並行に起動された
//!   ルールの処理が実際に交互に進むようにする
//! - 発行された操作を記録し、指定した操作を失敗させられる

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ichiba_domain::{
    cart::DerivedTotal,
    entity::{DocumentId, EntityKind},
    reference::PullScope,
};
use serde_json::Value as JsonValue;

use crate::{
    error::InfraError,
    repository::{DocumentCollection, DocumentFilter, element_pattern, json_contains},
};

/// コレクションに発行された操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Find,
    FindBody,
    Insert,
    RecomputeTotal,
    Delete,
    UpdatePull,
    UpdateUnset,
}

/// 記録された操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    /// ID を指定した操作の対象
    pub id:   Option<DocumentId>,
}

#[derive(Default)]
struct State {
    documents:  BTreeMap<DocumentId, JsonValue>,
    operations: Vec<Operation>,
    failing:    HashSet<OperationKind>,
}

/// インメモリのドキュメントコレクション
///
/// `Clone` は同じ状態を共有する。
#[derive(Clone)]
pub struct InMemoryCollection {
    kind:  EntityKind,
    state: Arc<Mutex<State>>,
}

impl InMemoryCollection {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// ドキュメントを直接追加する（操作ログには記録しない）
    pub fn seed(&self, id: DocumentId, body: JsonValue) {
        self.state.lock().unwrap().documents.insert(id, body);
    }

    /// ドキュメント本文を直接取得する（操作ログには記録しない）
    pub fn get(&self, id: &DocumentId) -> Option<JsonValue> {
        self.state.lock().unwrap().documents.get(id).cloned()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.state.lock().unwrap().documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全ドキュメントのスナップショット（ID 順）
    pub fn documents(&self) -> Vec<(DocumentId, JsonValue)> {
        self.state
            .lock()
            .unwrap()
            .documents
            .iter()
            .map(|(id, body)| (*id, body.clone()))
            .collect()
    }

    /// 発行された操作の一覧
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// 指定した種類の操作が発行された回数
    pub fn count_operations(&self, kind: OperationKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| op.kind == kind)
            .count()
    }

    pub fn clear_operations(&self) {
        self.state.lock().unwrap().operations.clear();
    }

    /// 指定した種類の操作を以後すべて失敗させる
    pub fn fail_on(&self, kind: OperationKind) {
        self.state.lock().unwrap().failing.insert(kind);
    }

    /// 操作を記録し、失敗が指定されていればエラーを返す
    async fn begin(&self, kind: OperationKind, id: Option<DocumentId>) -> Result<(), InfraError> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation { kind, id });
        if state.failing.contains(&kind) {
            let message = format!("{}: {kind} の失敗を注入", self.kind.collection_name());
            return Err(sqlx::Error::Protocol(message).into());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for InMemoryCollection {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn find_ids(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>, InfraError> {
        self.begin(OperationKind::Find, None).await?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .iter()
            .filter(|(_, body)| filter.matches(body))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn find_body(&self, id: &DocumentId) -> Result<Option<JsonValue>, InfraError> {
        self.begin(OperationKind::FindBody, Some(*id)).await?;
        Ok(self.get(id))
    }

    async fn insert(&self, id: &DocumentId, body: &JsonValue) -> Result<(), InfraError> {
        self.begin(OperationKind::Insert, Some(*id)).await?;

        let mut state = self.state.lock().unwrap();
        if state.documents.contains_key(id) {
            return Err(InfraError::invalid_input(format!(
                "{}(id={id}) は既に存在します",
                self.kind
            )));
        }
        state.documents.insert(*id, body.clone());
        Ok(())
    }

    async fn recompute_total(
        &self,
        id: &DocumentId,
        total: DerivedTotal,
    ) -> Result<Option<u64>, InfraError> {
        self.begin(OperationKind::RecomputeTotal, Some(*id)).await?;

        let mut state = self.state.lock().unwrap();
        let Some(body) = state.documents.get_mut(id) else {
            return Ok(None);
        };
        let written = total.apply(body).map_err(|e| {
            InfraError::unexpected(format!(
                "{}(id={id}) の派生合計を再計算できません: {e}",
                self.kind
            ))
        })?;
        Ok(Some(written))
    }

    async fn delete_by_id(&self, id: &DocumentId) -> Result<bool, InfraError> {
        self.begin(OperationKind::Delete, Some(*id)).await?;
        Ok(self.state.lock().unwrap().documents.remove(id).is_some())
    }

    async fn update_many_pull(
        &self,
        array_field: &str,
        nested_field: &str,
        id: &DocumentId,
        scope: PullScope,
    ) -> Result<Vec<DocumentId>, InfraError> {
        self.begin(OperationKind::UpdatePull, None).await?;

        let pattern = element_pattern(nested_field, id);
        let filter = DocumentFilter::field(array_field, JsonValue::Array(vec![pattern.clone()]));

        let mut state = self.state.lock().unwrap();
        let mut affected = Vec::new();
        for (document_id, body) in state.documents.iter_mut() {
            if scope == PullScope::Matching && !filter.matches(body) {
                continue;
            }
            let Some(elements) = body.get_mut(array_field).and_then(JsonValue::as_array_mut)
            else {
                continue;
            };
            let before = elements.len();
            elements.retain(|element| !json_contains(element, &pattern));
            if elements.len() != before {
                affected.push(*document_id);
            }
        }
        Ok(affected)
    }

    async fn update_many_unset(&self, field: &str, id: &DocumentId) -> Result<u64, InfraError> {
        self.begin(OperationKind::UpdateUnset, None).await?;

        let filter = DocumentFilter::field(field, id.to_json());
        let mut state = self.state.lock().unwrap();
        let mut modified = 0;
        for body in state.documents.values_mut() {
            if !filter.matches(body) {
                continue;
            }
            if let Some(object) = body.as_object_mut() {
                object.remove(field);
                modified += 1;
            }
        }
        Ok(modified)
    }
}
