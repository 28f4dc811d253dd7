//! # エンティティ種別とドキュメント ID
//!
//! マーケットプレイスで永続化されるコレクションの種別と、
//! 各ドキュメントを識別する不透明な ID を定義する。
//!
//! ## 設計判断
//!
//! 参照ルール表はエンティティ種別を文字列ではなく [`EntityKind`] で引く。
//! 種別名のタイプミスはコンパイルエラーになり、「未登録の種別なので何もしない」
//! という黙った失敗が起きない。
//!
//! ## 使用例
//!
//! ```rust
//! use ichiba_domain::entity::{DocumentId, EntityKind};
//!
//! let kind: EntityKind = "store_product".parse().unwrap();
//! assert_eq!(kind, EntityKind::StoreProduct);
//! assert_eq!(kind.collection_name(), "store_products");
//!
//! let id = DocumentId::new();
//! assert_eq!(DocumentId::from_uuid(*id.as_uuid()), id);
//! ```

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use uuid::Uuid;

use crate::cart::DerivedTotal;

/// ドキュメントの一意識別子
///
/// どのコレクションのドキュメントかは持たない。等値比較のみを前提とする。
/// JSON 上では UUID 文字列として表現される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// 新しい ID を生成する（UUID v7）
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// 既存の UUID から ID を作成する
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 内部の UUID 参照を取得する
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// ドキュメント本文に埋め込むときの JSON 表現
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.0.to_string())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

/// エンティティ種別
///
/// 永続化されるコレクションと 1:1 で対応する。
/// 親として参照ルールを持つかどうかは [`RuleTable`](crate::reference::RuleTable) が決める。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Store,
    StoreProduct,
    UserProduct,
    Address,
    Cart,
    Wishlist,
    Review,
    Promotion,
    Notification,
}

impl EntityKind {
    /// 永続化先のコレクション名（PostgreSQL ではテーブル名）
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Store => "stores",
            Self::StoreProduct => "store_products",
            Self::UserProduct => "user_products",
            Self::Address => "addresses",
            Self::Cart => "carts",
            Self::Wishlist => "wishlists",
            Self::Review => "reviews",
            Self::Promotion => "promotions",
            Self::Notification => "notifications",
        }
    }

    /// このコレクションのドキュメントが持つ派生合計フィールド
    ///
    /// 配列要素を取り除いたあとに再計算が必要なコレクションだけが `Some` を返す。
    pub fn derived_total(self) -> Option<DerivedTotal> {
        match self {
            Self::Cart => Some(DerivedTotal::CART_ITEMS),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[rstest]
    #[case("user", EntityKind::User)]
    #[case("store", EntityKind::Store)]
    #[case("store_product", EntityKind::StoreProduct)]
    #[case("user_product", EntityKind::UserProduct)]
    #[case("address", EntityKind::Address)]
    #[case("notification", EntityKind::Notification)]
    fn test_snake_caseの名前からパースできる(#[case] input: &str, #[case] expected: EntityKind) {
        assert_eq!(input.parse::<EntityKind>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn test_未知の名前はパースエラーになる() {
        assert!("storeProduct".parse::<EntityKind>().is_err());
        assert!("".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_コレクション名は種別ごとに一意() {
        let names: HashSet<&str> = EntityKind::iter().map(EntityKind::collection_name).collect();
        assert_eq!(names.len(), EntityKind::iter().count());
    }

    #[test]
    fn test_派生合計を持つのはカートだけ() {
        let kinds: Vec<EntityKind> = EntityKind::iter()
            .filter(|kind| kind.derived_total().is_some())
            .collect();
        assert_eq!(kinds, vec![EntityKind::Cart]);
    }

    #[test]
    fn test_document_idのjson表現はuuid文字列() {
        let uuid: Uuid = "01890a5d-ac96-774b-bcce-b302099a8057".parse().unwrap();
        let id = DocumentId::from_uuid(uuid);

        assert_eq!(id.to_json(), serde_json::json!("01890a5d-ac96-774b-bcce-b302099a8057"));
        assert_eq!(serde_json::to_value(id).unwrap(), id.to_json());
    }
}
