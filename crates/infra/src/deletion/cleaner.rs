//! # ReferenceCleaner
//!
//! 親エンティティの削除に合わせて、参照ルール表に従い子コレクションを整理する。
//!
//! ## 処理の流れ
//!
//! 1. 親種別のルール一覧を引く（ルールが無ければ何もしない）
//! 2. ルールごとに整理処理を並行に起動し、すべての完了を待つ
//! 3. 失敗したルールが 1 つならそのエラーを、複数なら
//!    [`InfraErrorKind::CleanupFailed`](crate::error::InfraErrorKind::CleanupFailed)
//!    を返す
//!
//! カスケードするルールでは、子ドキュメント自身の整理を終えてから子を削除する。
//!
//! ## 循環の検出
//!
//! 1 回の呼び出しの中で `(種別, ID)` の訪問を記録する。
//!
//! - 祖先と同じ `(種別, ID)` へカスケードしようとした場合は
//!   [`InfraErrorKind::CascadeCycle`](crate::error::InfraErrorKind::CascadeCycle)
//! - 別の枝で処理済みの `(種別, ID)` は整理も削除も再発行しない

use std::collections::{BTreeMap, HashSet};

use futures::future::{BoxFuture, join_all};
use ichiba_domain::{
    entity::{DocumentId, EntityKind},
    reference::{PullScope, ReferenceRule, RuleTable},
};
use ichiba_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use tokio::sync::Mutex;

use super::CollectionRegistry;
use crate::{
    error::{InfraError, InfraErrorKind},
    repository::DocumentCollection,
};

/// 訪問済みの `(種別, ID)`
type Visit = (EntityKind, DocumentId);

/// 1 回の参照整理で共有する訪問記録
#[derive(Default)]
struct Traversal {
    visited: Mutex<HashSet<Visit>>,
}

impl Traversal {
    /// 未訪問なら記録して `true` を返す
    async fn claim(&self, visit: Visit) -> bool {
        self.visited.lock().await.insert(visit)
    }
}

/// ルール 1 件の適用結果
#[derive(Debug, Default, Clone, Copy)]
struct RuleOutcome {
    deleted:  u64,
    modified: u64,
}

/// 参照整理エンジン
///
/// 参照ルール表とコレクションのレジストリを保持する。
/// 呼び出しごとの状態は持たないため、`Arc` で共有して並行に呼び出してよい。
#[derive(Debug)]
pub struct ReferenceCleaner {
    rules:       RuleTable,
    collections: CollectionRegistry,
}

impl ReferenceCleaner {
    /// 参照整理エンジンを構築する
    ///
    /// ルール表の検証に失敗した場合や、ルール表が参照する種別の
    /// コレクションが登録されていない場合は設定エラーを返す。
    pub fn new(rules: RuleTable, collections: CollectionRegistry) -> Result<Self, InfraError> {
        if let Err(e) = rules.ensure_valid() {
            tracing::error!(
                error.category = log_error::category::CONFIGURATION,
                error.kind = log_error::kind::RULE_TABLE,
                error = %e,
                "参照ルール表が不正です"
            );
            return Err(InfraError::configuration(e.to_string()));
        }

        let missing = collections.missing_kinds(&rules);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            let names = names.join(", ");
            tracing::error!(
                error.category = log_error::category::CONFIGURATION,
                error.kind = log_error::kind::UNREGISTERED_COLLECTION,
                missing = %names,
                "コレクションが登録されていない種別があります"
            );
            return Err(InfraError::configuration(format!(
                "コレクションが登録されていない種別があります: {names}"
            )));
        }

        Ok(Self { rules, collections })
    }

    /// 検証を行わずに構築する
    ///
    /// 実行時の循環検出や未登録コレクションのエラーを確認するテスト用。
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_unchecked(rules: RuleTable, collections: CollectionRegistry) -> Self {
        Self { rules, collections }
    }

    /// 参照ルール表
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// コレクションのレジストリ
    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    /// 親エンティティへの参照を整理する
    ///
    /// 親ドキュメント自体は削除しない。削除フックから、親の物理削除より前に呼び出す。
    /// ルールを持たない種別では何もせずに `Ok(())` を返す。
    ///
    /// # エラー
    ///
    /// 失敗したルールがあればエラーを返す。成功したルールの変更は取り消されない。
    #[tracing::instrument(skip_all, level = "debug", fields(%kind, %id))]
    pub async fn cleanup_references(
        &self,
        kind: EntityKind,
        id: DocumentId,
    ) -> Result<(), InfraError> {
        let traversal = Traversal::default();
        traversal.claim((kind, id)).await;

        if let Err(error) = self.cleanup_node(kind, id, Vec::new(), &traversal).await {
            log_business_event!(
                event.category = event::category::CLEANUP,
                event.action = event::action::REFERENCES_CLEANED,
                event.entity_type = %kind,
                event.entity_id = %id,
                event.result = event::result::FAILURE,
                failures = error.cleanup_failures().len(),
                "参照整理が途中で失敗"
            );
            return Err(error);
        }

        log_business_event!(
            event.category = event::category::CLEANUP,
            event.action = event::action::REFERENCES_CLEANED,
            event.entity_type = %kind,
            event.entity_id = %id,
            event.result = event::result::SUCCESS,
            "参照整理が完了"
        );
        Ok(())
    }

    /// 運用者が手動で参照整理を実行する
    ///
    /// [`cleanup_references`](Self::cleanup_references) と同じ処理を行う。
    /// 親がすでに削除された後に残った参照の掃除や、一括メンテナンスに使う。
    pub async fn manual_cascade_delete(
        &self,
        kind: EntityKind,
        id: DocumentId,
    ) -> Result<(), InfraError> {
        tracing::info!(%kind, %id, "手動の参照整理を開始");
        self.cleanup_references(kind, id).await
    }

    /// 親エンティティを現在参照しているドキュメント数をルールごとに返す
    ///
    /// 読み取りのみで、カスケード先は数えない。キーはルールの表示名。
    #[tracing::instrument(skip_all, level = "debug", fields(%kind, %id))]
    pub async fn count_references(
        &self,
        kind: EntityKind,
        id: DocumentId,
    ) -> Result<BTreeMap<String, u64>, InfraError> {
        let mut counts = BTreeMap::new();
        for rule in self.rules.rules_for(kind) {
            let collection = self.collections.get(rule.child())?;
            let ids = collection.find_ids_by_field(rule.field_match(), &id).await?;
            counts.insert(rule.label(), ids.len() as u64);
        }
        Ok(counts)
    }

    /// 1 つの親について全ルールを並行に適用する
    ///
    /// `path` は呼び出し元までの祖先。再帰するため戻り値を Box 化している。
    fn cleanup_node<'a>(
        &'a self,
        kind: EntityKind,
        id: DocumentId,
        mut path: Vec<Visit>,
        traversal: &'a Traversal,
    ) -> BoxFuture<'a, Result<(), InfraError>> {
        Box::pin(async move {
            let rules = self.rules.rules_for(kind);
            if rules.is_empty() {
                return Ok(());
            }
            path.push((kind, id));

            let results = join_all(
                rules
                    .iter()
                    .map(|rule| self.apply_rule(*rule, id, &path, traversal)),
            )
            .await;

            let mut failures = Vec::new();
            for (rule, result) in rules.iter().zip(results) {
                match result {
                    Ok(outcome) => tracing::debug!(
                        parent_type = %kind,
                        parent_id = %id,
                        rule = %rule.label(),
                        deleted = outcome.deleted,
                        modified = outcome.modified,
                        "参照ルールを適用"
                    ),
                    Err(error) => {
                        tracing::error!(
                            error.category = log_error::category::INFRASTRUCTURE,
                            error.kind = error_kind_label(&error),
                            parent_type = %kind,
                            parent_id = %id,
                            rule = %rule.label(),
                            error = %error,
                            "参照ルールの適用に失敗"
                        );
                        failures.push(error);
                    }
                }
            }

            if failures.len() > 1 {
                return Err(InfraError::cleanup_failed(kind, id, failures));
            }
            match failures.pop() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }

    async fn apply_rule(
        &self,
        rule: ReferenceRule,
        id: DocumentId,
        path: &[Visit],
        traversal: &Traversal,
    ) -> Result<RuleOutcome, InfraError> {
        let collection: &dyn DocumentCollection = self.collections.get(rule.child())?.as_ref();

        match rule {
            ReferenceRule::DeleteChild { .. } | ReferenceRule::DeleteChildArrayMatch { .. } => {
                self.delete_children(collection, rule, id, path, traversal)
                    .await
            }
            ReferenceRule::UnsetField { field, .. } => {
                let modified = collection.update_many_unset(field, &id).await?;
                Ok(RuleOutcome {
                    deleted: 0,
                    modified,
                })
            }
            ReferenceRule::PullFromArray {
                array_field,
                nested_field,
                ..
            } => {
                pull_and_recompute(
                    collection,
                    array_field,
                    nested_field,
                    id,
                    PullScope::Matching,
                )
                .await
            }
            ReferenceRule::PullFromRootArray {
                array_field,
                key_field,
                ..
            } => {
                pull_and_recompute(
                    collection,
                    array_field,
                    key_field,
                    id,
                    PullScope::AllDocuments,
                )
                .await
            }
        }
    }

    /// 親を参照している子ドキュメントを削除する（カスケード指定なら先に子を整理する）
    async fn delete_children(
        &self,
        collection: &dyn DocumentCollection,
        rule: ReferenceRule,
        id: DocumentId,
        path: &[Visit],
        traversal: &Traversal,
    ) -> Result<RuleOutcome, InfraError> {
        let child_kind = rule.child();
        let child_ids = collection
            .find_ids_by_field(rule.field_match(), &id)
            .await?;

        let mut outcome = RuleOutcome::default();
        for child_id in child_ids {
            let visit = (child_kind, child_id);
            if path.contains(&visit) {
                if rule.cascades() {
                    return Err(InfraError::cascade_cycle(child_kind, child_id));
                }
                // 祖先はそれ自身の削除で消える
                continue;
            }
            if !traversal.claim(visit).await {
                continue;
            }

            if rule.cascades() {
                self.cleanup_node(child_kind, child_id, path.to_vec(), traversal)
                    .await?;
            }

            if collection.delete_by_id(&child_id).await? {
                outcome.deleted += 1;
                log_business_event!(
                    event.category = event::category::CLEANUP,
                    event.action = event::action::CHILD_DELETED,
                    event.entity_type = %child_kind,
                    event.entity_id = %child_id,
                    event.result = event::result::SUCCESS,
                    parent_id = %id,
                    rule = %rule.label(),
                    "参照元ドキュメントを削除"
                );
            }
        }
        Ok(outcome)
    }
}

/// 配列から参照を取り除き、派生合計を持つコレクションなら再計算する
async fn pull_and_recompute(
    collection: &dyn DocumentCollection,
    array_field: &str,
    nested_field: &str,
    id: DocumentId,
    scope: PullScope,
) -> Result<RuleOutcome, InfraError> {
    let affected = collection
        .update_many_pull(array_field, nested_field, &id, scope)
        .await?;

    if let Some(total) = collection.kind().derived_total() {
        for document_id in &affected {
            // 取り除きと再計算の間に削除されていれば None
            collection.recompute_total(document_id, total).await?;
        }
    }

    Ok(RuleOutcome {
        deleted:  0,
        modified: affected.len() as u64,
    })
}

fn error_kind_label(error: &InfraError) -> &'static str {
    match error.kind() {
        InfraErrorKind::Database(_) => log_error::kind::DATABASE,
        InfraErrorKind::CascadeCycle { .. } => log_error::kind::CASCADE_CYCLE,
        InfraErrorKind::CleanupFailed { .. } => log_error::kind::PARTIAL_CLEANUP,
        InfraErrorKind::UnregisteredCollection(_) => log_error::kind::UNREGISTERED_COLLECTION,
        _ => log_error::kind::INTERNAL,
    }
}
