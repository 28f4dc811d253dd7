//! # カート
//!
//! ユーザーごとのカートドキュメントと、その派生フィールドである
//! 合計点数（`totalItems`）の計算規則を定義する。
//!
//! ## 派生フィールドの方針
//!
//! `totalItems` は `items[].quantity` の総和として常に全体から再計算する。
//! 差分で加減算すると、部分的な更新が重なったときに実値とずれるため。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{DomainError, entity::DocumentId};

/// 配列要素の数量を合計した派生フィールドの定義
///
/// ドキュメントの型を知らない永続化層（JSON ドキュメントのまま扱う層）が
/// 再計算を行えるよう、フィールド名だけで規則を表現する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedTotal {
    /// 集計対象の配列フィールド
    pub array_field:    &'static str,
    /// 配列要素の数量フィールド
    pub quantity_field: &'static str,
    /// 合計値を保存するフィールド
    pub total_field:    &'static str,
}

impl DerivedTotal {
    /// カートの `totalItems = Σ items[].quantity`
    pub const CART_ITEMS: Self = Self {
        array_field:    "items",
        quantity_field: "quantity",
        total_field:    "totalItems",
    };

    /// ドキュメント本文から合計値を計算する
    ///
    /// 配列が無い、または数量が数値でない要素は 0 として扱う。
    /// 合計が `u64` に収まらない場合は `DomainError::Validation` を返す。
    pub fn compute(&self, body: &JsonValue) -> Result<u64, DomainError> {
        let Some(elements) = body.get(self.array_field).and_then(JsonValue::as_array) else {
            return Ok(0);
        };
        elements
            .iter()
            .filter_map(|element| element.get(self.quantity_field))
            .filter_map(JsonValue::as_u64)
            .try_fold(0_u64, u64::checked_add)
            .ok_or_else(|| {
                DomainError::Validation(format!("{} が上限を超えています", self.total_field))
            })
    }

    /// 合計値を再計算し、ドキュメント本文に書き戻す
    ///
    /// 本文がオブジェクトでない場合は `DomainError::Validation` を返す。
    pub fn apply(&self, body: &mut JsonValue) -> Result<u64, DomainError> {
        let total = self.compute(body)?;
        let Some(object) = body.as_object_mut() else {
            return Err(DomainError::Validation(format!(
                "{} を書き込めるドキュメントではありません",
                self.total_field
            )));
        };
        object.insert(self.total_field.to_string(), JsonValue::from(total));
        Ok(total)
    }
}

/// カート内の 1 商品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// 参照しているストア商品
    pub store_product:         DocumentId,
    /// 選択された価格区分
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_price_detail: Option<DocumentId>,
    /// 数量（1 以上）
    pub quantity:              u32,
}

impl CartItem {
    pub fn new(store_product: DocumentId, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::Validation(
                "カート商品の数量は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self {
            store_product,
            selected_price_detail: None,
            quantity,
        })
    }
}

/// カート（ユーザーごとに 1 つ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_id:     DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address_id:  Option<DocumentId>,
    #[serde(default)]
    items:       Vec<CartItem>,
    #[serde(default)]
    total_items: u64,
}

impl Cart {
    /// 新しいカートを作成する（合計点数は items から計算）
    pub fn new(user_id: DocumentId, items: Vec<CartItem>) -> Self {
        let mut cart = Self {
            user_id,
            address_id: None,
            items,
            total_items: 0,
        };
        cart.recompute_total_items();
        cart
    }

    /// 配送先住所を設定する
    pub fn with_address(self, address_id: DocumentId) -> Self {
        Self {
            address_id: Some(address_id),
            ..self
        }
    }

    pub fn user_id(&self) -> &DocumentId {
        &self.user_id
    }

    pub fn address_id(&self) -> Option<&DocumentId> {
        self.address_id.as_ref()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    /// 合計点数を items から再計算する
    pub fn recompute_total_items(&mut self) {
        self.total_items = self.items.iter().map(|item| u64::from(item.quantity)).sum();
    }

    /// JSON ドキュメント本文に変換する
    pub fn to_document(&self) -> Result<JsonValue, DomainError> {
        serde_json::to_value(self).map_err(|e| DomainError::Validation(e.to_string()))
    }

    /// JSON ドキュメント本文から復元する
    pub fn from_document(body: JsonValue) -> Result<Self, DomainError> {
        serde_json::from_value(body).map_err(|e| DomainError::Validation(e.to_string()))
    }
}
