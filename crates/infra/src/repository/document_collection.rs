//! # DocumentCollection
//!
//! 参照整理エンジンがコレクションに要求する操作（ケイパビリティ）を定義する。
//!
//! ## 設計方針
//!
//! - **名前による解決をしない**: エンジンはコレクションを文字列で引かず、
//!   [`CollectionRegistry`](crate::deletion::CollectionRegistry) に登録された
//!   実装を種別で受け取る
//! - **包含による照合**: フィルタは JSONB の包含（`@>`）と同じ意味を持つ
//!   JSON パターンで表現する。スカラーフィールドも配列要素も同じ仕組みで照合できる
//! - **即時コミット**: 各操作は独立してコミットされる。複数操作をまたぐ
//!   トランザクションは提供しない

use async_trait::async_trait;
use ichiba_domain::{
    cart::DerivedTotal,
    entity::{DocumentId, EntityKind},
    reference::{FieldMatch, PullScope},
};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::InfraError;

/// ドキュメント検索フィルタ
///
/// ドキュメント本文が含むべき JSON パターン。空のフィルタは全件に一致する。
///
/// ```rust
/// use ichiba_domain::{entity::DocumentId, reference::FieldMatch};
/// use ichiba_infra::repository::DocumentFilter;
/// use serde_json::json;
///
/// let product = DocumentId::new();
/// let filter = DocumentFilter::references(
///     FieldMatch::ArrayElement { array_field: "items", nested_field: "storeProduct" },
///     &product,
/// );
///
/// assert!(filter.matches(&json!({
///     "items": [{"storeProduct": product.to_string(), "quantity": 2}],
/// })));
/// assert!(!filter.matches(&json!({"items": []})));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentFilter(JsonMap<String, JsonValue>);

impl DocumentFilter {
    /// 全件に一致するフィルタ
    pub fn all() -> Self {
        Self::default()
    }

    /// ルート直下フィールドの等値条件
    pub fn field(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::all().and(field, value)
    }

    /// 等値条件を追加する
    pub fn and(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// 親 ID を参照しているドキュメントに一致するフィルタ
    pub fn references(field_match: FieldMatch, id: &DocumentId) -> Self {
        match field_match {
            FieldMatch::Field(field) => Self::field(field, id.to_json()),
            FieldMatch::ArrayElement {
                array_field,
                nested_field,
            } => Self::field(
                array_field,
                JsonValue::Array(vec![element_pattern(nested_field, id)]),
            ),
        }
    }

    /// 全件に一致するフィルタか
    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    /// JSONB 包含演算子に渡すパターン
    pub fn to_containment(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }

    /// ドキュメント本文がフィルタに一致するか
    pub fn matches(&self, body: &JsonValue) -> bool {
        json_contains(body, &self.to_containment())
    }
}

/// 配列要素 1 つに対する照合パターン（例: `{"storeProduct": "<id>"}`）
pub fn element_pattern(nested_field: &str, id: &DocumentId) -> JsonValue {
    let mut element = JsonMap::new();
    element.insert(nested_field.to_string(), id.to_json());
    JsonValue::Object(element)
}

/// `target @> pattern` と同じ規則で包含を判定する
///
/// - オブジェクト: パターンの各キーが存在し、その値を包含する
/// - 配列: パターンの各要素を包含する要素が 1 つ以上ある
/// - スカラー: 等値
pub fn json_contains(target: &JsonValue, pattern: &JsonValue) -> bool {
    match (target, pattern) {
        (JsonValue::Object(target), JsonValue::Object(pattern)) => pattern
            .iter()
            .all(|(key, value)| target.get(key).is_some_and(|t| json_contains(t, value))),
        (JsonValue::Array(target), JsonValue::Array(pattern)) => pattern
            .iter()
            .all(|value| target.iter().any(|t| json_contains(t, value))),
        _ => target == pattern,
    }
}

/// ドキュメントコレクション
///
/// 1 つのエンティティ種別のドキュメントを永続化する。
/// 参照整理エンジンと削除フック（[`CascadingRepository`](super::CascadingRepository)）は
/// このトレイトだけを通してコレクションを操作する。
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// このコレクションが格納するエンティティ種別
    fn kind(&self) -> EntityKind;

    /// フィルタに一致するドキュメントの ID を返す
    async fn find_ids(&self, filter: &DocumentFilter) -> Result<Vec<DocumentId>, InfraError>;

    /// 親 ID を指定位置に保持しているドキュメントの ID を返す
    async fn find_ids_by_field(
        &self,
        field_match: FieldMatch,
        id: &DocumentId,
    ) -> Result<Vec<DocumentId>, InfraError> {
        self.find_ids(&DocumentFilter::references(field_match, id))
            .await
    }

    /// ID でドキュメント本文を取得する
    async fn find_body(&self, id: &DocumentId) -> Result<Option<JsonValue>, InfraError>;

    /// ドキュメントを挿入する
    async fn insert(&self, id: &DocumentId, body: &JsonValue) -> Result<(), InfraError>;

    /// 派生合計をその時点の本文から再計算し、合計フィールドだけを書き換える
    ///
    /// 読み出しと書き込みは 1 つの操作として行い、並行する取り除きの結果を
    /// 上書きしない。ドキュメントが無ければ `None` を返す。
    async fn recompute_total(
        &self,
        id: &DocumentId,
        total: DerivedTotal,
    ) -> Result<Option<u64>, InfraError>;

    /// ID でドキュメントを 1 件削除する（存在しなければ `false`）
    async fn delete_by_id(&self, id: &DocumentId) -> Result<bool, InfraError>;

    /// 配列フィールドから親 ID を持つ要素を取り除く
    ///
    /// `scope` が [`PullScope::Matching`] なら参照を含むドキュメントだけ、
    /// [`PullScope::AllDocuments`] ならコレクション全体を更新する。
    /// 更新したドキュメントの ID を返す。
    async fn update_many_pull(
        &self,
        array_field: &str,
        nested_field: &str,
        id: &DocumentId,
        scope: PullScope,
    ) -> Result<Vec<DocumentId>, InfraError>;

    /// 親 ID を保持しているスカラーフィールドを削除する
    ///
    /// 更新したドキュメント数を返す。
    async fn update_many_unset(&self, field: &str, id: &DocumentId) -> Result<u64, InfraError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_スカラーフィールドの参照フィルタ() {
        let user = DocumentId::new();
        let filter = DocumentFilter::references(FieldMatch::Field("userId"), &user);

        assert_eq!(filter.to_containment(), json!({"userId": user.to_string()}));
        assert!(filter.matches(&json!({"userId": user.to_string(), "line1": "1-2-3"})));
        assert!(!filter.matches(&json!({"userId": DocumentId::new().to_string()})));
        assert!(!filter.matches(&json!({"line1": "1-2-3"})));
    }

    #[test]
    fn test_配列要素の参照フィルタ() {
        let store = DocumentId::new();
        let filter = DocumentFilter::references(
            FieldMatch::ArrayElement {
                array_field:  "recipients",
                nested_field: "recipientId",
            },
            &store,
        );

        let body = json!({
            "title": "お知らせ",
            "recipients": [
                {"recipientId": DocumentId::new().to_string(), "isRead": true},
                {"recipientId": store.to_string(), "isRead": false},
            ],
        });
        assert!(filter.matches(&body));
        assert!(!filter.matches(&json!({"recipients": []})));
        assert!(!filter.matches(&json!({"recipients": {"recipientId": store.to_string()}})));
    }

    #[test]
    fn test_空のフィルタは全件に一致する() {
        let filter = DocumentFilter::all();

        assert!(filter.is_all());
        assert!(filter.matches(&json!({})));
        assert!(filter.matches(&json!({"anything": [1, 2]})));
    }

    #[test]
    fn test_andで条件を重ねる() {
        let filter = DocumentFilter::field("productType", "storeProduct").and("userId", "u-1");

        assert!(filter.matches(&json!({"productType": "storeProduct", "userId": "u-1"})));
        assert!(!filter.matches(&json!({"productType": "userProduct", "userId": "u-1"})));
    }

    #[test]
    fn test_スカラー同士は型も含めて等値比較する() {
        assert!(json_contains(&json!(3), &json!(3)));
        assert!(!json_contains(&json!("3"), &json!(3)));
        assert!(!json_contains(&json!(null), &json!({})));
    }
}
