//! # CascadingRepository
//!
//! 親エンティティの削除口（フィルタ指定の 1 件削除、ID 指定削除、一括削除、
//! 旧来の `remove`）をまとめ、物理削除の前に必ず参照整理を実行する。
//!
//! 参照整理が失敗した場合、親ドキュメントは削除しない。
//! ただし整理済みのルールの変更は残る（トランザクションで囲まない）。

use std::sync::Arc;

use ichiba_domain::entity::{DocumentId, EntityKind};
use ichiba_shared::{event_log::event, log_business_event};
use serde_json::Value as JsonValue;

use super::{DocumentCollection, DocumentFilter};
use crate::{deletion::ReferenceCleaner, error::InfraError};

/// 削除フックつきリポジトリ
///
/// 1 つのエンティティ種別について、参照整理と物理削除の順序を保証する。
#[derive(Clone)]
pub struct CascadingRepository {
    cleaner:    Arc<ReferenceCleaner>,
    collection: Arc<dyn DocumentCollection>,
}

impl CascadingRepository {
    /// 参照整理エンジンのレジストリから種別のコレクションを取り出して作成する
    pub fn for_kind(cleaner: Arc<ReferenceCleaner>, kind: EntityKind) -> Result<Self, InfraError> {
        let collection = cleaner.collections().get(kind)?.clone();
        Ok(Self {
            cleaner,
            collection,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.collection.kind()
    }

    /// フィルタに一致する最初のドキュメントを削除し、削除前の本文を返す
    ///
    /// 一致するドキュメントが無ければ参照整理も行わず `None` を返す。
    #[tracing::instrument(skip_all, level = "debug", fields(kind = %self.kind()))]
    pub async fn find_one_and_delete(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Option<(DocumentId, JsonValue)>, InfraError> {
        let Some(id) = self.collection.find_ids(filter).await?.into_iter().next() else {
            return Ok(None);
        };
        let Some(body) = self.collection.find_body(&id).await? else {
            return Ok(None);
        };

        self.cleaner.cleanup_references(self.kind(), id).await?;
        if !self.collection.delete_by_id(&id).await? {
            return Ok(None);
        }
        self.log_deleted(id, "find_one_and_delete");

        Ok(Some((id, body)))
    }

    /// ID 指定でドキュメントを削除する
    ///
    /// ドキュメントが存在しない場合も参照整理は実行する（残った参照の掃除になる）。
    /// 一致が無ければ何もしない [`find_one_and_delete`](Self::find_one_and_delete) とは異なる。
    #[tracing::instrument(skip_all, level = "debug", fields(kind = %self.kind(), %id))]
    pub async fn delete_by_id(&self, id: &DocumentId) -> Result<bool, InfraError> {
        self.cleaner.cleanup_references(self.kind(), *id).await?;

        let deleted = self.collection.delete_by_id(id).await?;
        if deleted {
            self.log_deleted(*id, "delete_by_id");
        }
        Ok(deleted)
    }

    /// フィルタに一致するすべてのドキュメントを削除する
    ///
    /// 一致したドキュメントを順に整理し、すべて成功してから削除する。
    /// 途中で整理に失敗した場合は 1 件も削除しない。
    #[tracing::instrument(skip_all, level = "debug", fields(kind = %self.kind()))]
    pub async fn delete_many(&self, filter: &DocumentFilter) -> Result<u64, InfraError> {
        let ids = self.collection.find_ids(filter).await?;

        for id in &ids {
            self.cleaner.cleanup_references(self.kind(), *id).await?;
        }

        let mut deleted = 0;
        for id in ids {
            if self.collection.delete_by_id(&id).await? {
                deleted += 1;
                self.log_deleted(id, "delete_many");
            }
        }
        Ok(deleted)
    }

    /// 旧来の削除口。[`delete_by_id`](Self::delete_by_id) と同じ
    pub async fn remove(&self, id: &DocumentId) -> Result<bool, InfraError> {
        self.delete_by_id(id).await
    }

    fn log_deleted(&self, id: DocumentId, entry_point: &'static str) {
        log_business_event!(
            event.category = event::category::CLEANUP,
            event.action = event::action::PARENT_DELETED,
            event.entity_type = %self.kind(),
            event.entity_id = %id,
            event.result = event::result::SUCCESS,
            entry_point,
            "親エンティティを削除"
        );
    }
}
