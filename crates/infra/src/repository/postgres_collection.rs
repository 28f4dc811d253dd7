//! # PostgresDocumentCollection
//!
//! `id UUID` + `body JSONB` のテーブルを 1 つのドキュメントコレクションとして扱う。
//!
//! ## 設計方針
//!
//! - **テーブル名は種別から決まる**: [`EntityKind::collection_name`] 以外の文字列を
//!   SQL に埋め込まない
//! - **実行時クエリ**: テーブル名が種別ごとに変わるため `sqlx::query!` ではなく
//!   `sqlx::query` / `sqlx::query_scalar` を使う
//! - **順序の保持**: 配列要素の取り除きは `WITH ORDINALITY` で元の並びを保つ

use async_trait::async_trait;
use ichiba_domain::{
    cart::DerivedTotal,
    entity::{DocumentId, EntityKind},
    reference::PullScope,
};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::document_collection::{DocumentCollection, DocumentFilter, element_pattern};
use crate::error::InfraError;

/// PostgreSQL 実装の DocumentCollection
#[derive(Debug, Clone)]
pub struct PostgresDocumentCollection {
    pool: PgPool,
    kind: EntityKind,
}

impl PostgresDocumentCollection {
    /// 新しいコレクションを作成する
    pub fn new(pool: PgPool, kind: EntityKind) -> Self {
        Self { pool, kind }
    }

    fn table(&self) -> &'static str {
        self.kind.collection_name()
    }
}

#[async_trait]
impl DocumentCollection for PostgresDocumentCollection {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    #[tracing::instrument(skip_all, level = "debug", fields(collection = self.table()))]
    async fn find_ids(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>, InfraError> {
        let ids: Vec<Uuid> = if filter.is_all() {
            let sql = format!("SELECT id FROM {} ORDER BY id", self.table());
            sqlx::query_scalar(&sql).fetch_all(&self.pool).await?
        } else {
            let sql = format!(
                "SELECT id FROM {} WHERE body @> $1 ORDER BY id",
                self.table()
            );
            sqlx::query_scalar(&sql)
                .bind(filter.to_containment())
                .fetch_all(&self.pool)
                .await?
        };

        Ok(ids.into_iter().map(DocumentId::from_uuid).collect())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(collection = self.table(), %id))]
    async fn find_body(&self, id: &DocumentId) -> Result<Option<JsonValue>, InfraError> {
        let sql = format!("SELECT body FROM {} WHERE id = $1", self.table());
        let body: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(body)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(collection = self.table(), %id))]
    async fn insert(&self, id: &DocumentId, body: &JsonValue) -> Result<(), InfraError> {
        let sql = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", self.table());
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(body)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(collection = self.table(), %id, total_field = total.total_field)
    )]
    async fn recompute_total(
        &self,
        id: &DocumentId,
        total: DerivedTotal,
    ) -> Result<Option<u64>, InfraError> {
        // 合計は更新対象行の最新の本文から計算する
        let sql = format!(
            "UPDATE {} AS t SET body = jsonb_set(t.body, ARRAY[$2::text], to_jsonb((
                 SELECT COALESCE(SUM((e.elem ->> $4::text)::numeric), 0)
                 FROM jsonb_array_elements(
                     CASE WHEN jsonb_typeof(t.body -> $3::text) = 'array'
                          THEN t.body -> $3::text ELSE '[]'::jsonb END
                 ) AS e(elem)
                 WHERE jsonb_typeof(e.elem -> $4::text) = 'number'
                   AND (e.elem ->> $4::text) ~ '^[0-9]+$'
             )))
             WHERE t.id = $1
             RETURNING t.body -> $2::text",
            self.table()
        );
        let written: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(id.as_uuid())
            .bind(total.total_field)
            .bind(total.array_field)
            .bind(total.quantity_field)
            .fetch_optional(&self.pool)
            .await?;

        written
            .map(|value| {
                value.as_u64().ok_or_else(|| {
                    InfraError::unexpected(format!(
                        "{}(id={id}) の {} が上限を超えています: {value}",
                        self.kind, total.total_field
                    ))
                })
            })
            .transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(collection = self.table(), %id))]
    async fn delete_by_id(&self, id: &DocumentId) -> Result<bool, InfraError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table());
        let result = sqlx::query(&sql)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(collection = self.table(), %array_field, %nested_field, %id, ?scope)
    )]
    async fn update_many_pull(
        &self,
        array_field: &str,
        nested_field: &str,
        id: &DocumentId,
        scope: PullScope,
    ) -> Result<Vec<DocumentId>, InfraError> {
        let pattern = element_pattern(nested_field, id);

        // 一致しない要素だけを元の順序で集め直す
        let pulled = "COALESCE((
                SELECT jsonb_agg(e.elem ORDER BY e.idx)
                FROM jsonb_array_elements(t.body -> $1::text) WITH ORDINALITY AS e(elem, idx)
                WHERE NOT (e.elem @> $2)
            ), '[]'::jsonb)";

        let ids: Vec<Uuid> = match scope {
            PullScope::Matching => {
                let sql = format!(
                    "UPDATE {} AS t SET body = jsonb_set(t.body, ARRAY[$1::text], {pulled})
                     WHERE t.body @> $3
                     RETURNING t.id",
                    self.table()
                );
                let filter =
                    DocumentFilter::field(array_field, JsonValue::Array(vec![pattern.clone()]));
                sqlx::query_scalar(&sql)
                    .bind(array_field)
                    .bind(&pattern)
                    .bind(filter.to_containment())
                    .fetch_all(&self.pool)
                    .await?
            }
            PullScope::AllDocuments => {
                let sql = format!(
                    "UPDATE {} AS t SET body = jsonb_set(t.body, ARRAY[$1::text], {pulled})
                     WHERE jsonb_typeof(t.body -> $1::text) = 'array'
                       AND EXISTS (
                           SELECT 1 FROM jsonb_array_elements(t.body -> $1::text) AS x(elem)
                           WHERE x.elem @> $2
                       )
                     RETURNING t.id",
                    self.table()
                );
                sqlx::query_scalar(&sql)
                    .bind(array_field)
                    .bind(&pattern)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(ids.into_iter().map(DocumentId::from_uuid).collect())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(collection = self.table(), %field, %id))]
    async fn update_many_unset(&self, field: &str, id: &DocumentId) -> Result<u64, InfraError> {
        let sql = format!(
            "UPDATE {} SET body = body - $1::text WHERE body @> $2",
            self.table()
        );
        let filter = DocumentFilter::field(field, id.to_json());
        let result = sqlx::query(&sql)
            .bind(field)
            .bind(filter.to_containment())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
