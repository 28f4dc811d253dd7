//! # 参照ルール表
//!
//! 親エンティティが削除されたとき、他のコレクションに残る参照をどう整理するかを
//! 静的に定義する。
//!
//! ## ルールの種類
//!
//! | バリアント | 照合対象 | 処理 |
//! |-----------|---------|------|
//! | [`ReferenceRule::DeleteChild`] | スカラーフィールド | 参照元ドキュメントを削除（任意でカスケード） |
//! | [`ReferenceRule::DeleteChildArrayMatch`] | `配列.要素フィールド` | 要素が一致したドキュメントを丸ごと削除 |
//! | [`ReferenceRule::UnsetField`] | スカラーフィールド | フィールドを削除（ドキュメントは残す） |
//! | [`ReferenceRule::PullFromArray`] | `配列.要素フィールド` | 一致したドキュメントから要素を取り除き、派生合計を再計算 |
//! | [`ReferenceRule::PullFromRootArray`] | `配列.キーフィールド` | コレクション全体から要素を取り除く |
//!
//! ## 設定の検証
//!
//! ルール表は起動時に [`RuleTable::validate`] で検証する。
//!
//! - 同じ親のルール一覧で同じ子コレクションを 2 回以上対象にしてはならない
//!   （削除と更新のどちらを優先するか決められないため）
//! - カスケードの辺が循環してはならない
//! - 同じ親種別のエントリが重複してはならない

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{DomainError, entity::EntityKind};

/// 参照元ドキュメントの中で親 ID を保持している位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMatch {
    /// ルート直下のスカラーフィールド（例: `userId`）
    Field(&'static str),
    /// サブドキュメント配列の要素フィールド（例: `items[].storeProduct`）
    ArrayElement {
        array_field:  &'static str,
        nested_field: &'static str,
    },
}

impl std::fmt::Display for FieldMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => write!(f, "{field}"),
            Self::ArrayElement {
                array_field,
                nested_field,
            } => write!(f, "{array_field}.{nested_field}"),
        }
    }
}

/// 要素を取り除く対象ドキュメントの範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullScope {
    /// 現在参照を含むドキュメントだけを更新する
    Matching,
    /// コレクションの全ドキュメントに対して取り除きを適用する
    AllDocuments,
}

/// 親エンティティから子コレクションへの参照ルール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRule {
    DeleteChild {
        child:   EntityKind,
        field:   &'static str,
        cascade: bool,
    },
    DeleteChildArrayMatch {
        child:        EntityKind,
        array_field:  &'static str,
        nested_field: &'static str,
        cascade:      bool,
    },
    UnsetField {
        child: EntityKind,
        field: &'static str,
    },
    PullFromArray {
        child:        EntityKind,
        array_field:  &'static str,
        nested_field: &'static str,
    },
    PullFromRootArray {
        child:       EntityKind,
        array_field: &'static str,
        key_field:   &'static str,
    },
}

impl ReferenceRule {
    /// 参照を保持している子コレクション
    pub fn child(&self) -> EntityKind {
        match *self {
            Self::DeleteChild { child, .. }
            | Self::DeleteChildArrayMatch { child, .. }
            | Self::UnsetField { child, .. }
            | Self::PullFromArray { child, .. }
            | Self::PullFromRootArray { child, .. } => child,
        }
    }

    /// 親 ID を照合する位置
    pub fn field_match(&self) -> FieldMatch {
        match *self {
            Self::DeleteChild { field, .. } | Self::UnsetField { field, .. } => {
                FieldMatch::Field(field)
            }
            Self::DeleteChildArrayMatch {
                array_field,
                nested_field,
                ..
            }
            | Self::PullFromArray {
                array_field,
                nested_field,
                ..
            } => FieldMatch::ArrayElement {
                array_field,
                nested_field,
            },
            Self::PullFromRootArray {
                array_field,
                key_field,
                ..
            } => FieldMatch::ArrayElement {
                array_field,
                nested_field: key_field,
            },
        }
    }

    /// 参照元ドキュメントそのものを削除するルールか
    pub fn deletes_document(&self) -> bool {
        matches!(
            self,
            Self::DeleteChild { .. } | Self::DeleteChildArrayMatch { .. }
        )
    }

    /// 削除前に子のクリーンアップを再帰的に行うか
    pub fn cascades(&self) -> bool {
        match *self {
            Self::DeleteChild { cascade, .. } | Self::DeleteChildArrayMatch { cascade, .. } => {
                cascade
            }
            _ => false,
        }
    }

    /// ログやレポートで使うルールの表示名（例: `"cart.items.storeProduct"`）
    pub fn label(&self) -> String {
        format!("{}.{}", self.child(), self.field_match())
    }
}

/// 親エンティティ種別ごとの参照ルール一覧
pub type RuleEntry = (EntityKind, &'static [ReferenceRule]);

const USER_RULES: &[ReferenceRule] = &[
    ReferenceRule::DeleteChild {
        child:   EntityKind::Address,
        field:   "userId",
        cascade: true,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Cart,
        field:   "userId",
        cascade: false,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Wishlist,
        field:   "userId",
        cascade: false,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::UserProduct,
        field:   "userId",
        cascade: true,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Review,
        field:   "userId",
        cascade: false,
    },
    ReferenceRule::PullFromRootArray {
        child:       EntityKind::Notification,
        array_field: "recipients",
        key_field:   "recipientId",
    },
];

const STORE_RULES: &[ReferenceRule] = &[
    ReferenceRule::DeleteChild {
        child:   EntityKind::StoreProduct,
        field:   "storeId",
        cascade: true,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Promotion,
        field:   "storeName",
        cascade: false,
    },
    ReferenceRule::PullFromRootArray {
        child:       EntityKind::Notification,
        array_field: "recipients",
        key_field:   "recipientId",
    },
];

const STORE_PRODUCT_RULES: &[ReferenceRule] = &[
    ReferenceRule::PullFromArray {
        child:        EntityKind::Cart,
        array_field:  "items",
        nested_field: "storeProduct",
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Wishlist,
        field:   "productId",
        cascade: false,
    },
    ReferenceRule::DeleteChild {
        child:   EntityKind::Review,
        field:   "productId",
        cascade: false,
    },
];

const USER_PRODUCT_RULES: &[ReferenceRule] = &[ReferenceRule::DeleteChild {
    child:   EntityKind::Wishlist,
    field:   "productId",
    cascade: false,
}];

const ADDRESS_RULES: &[ReferenceRule] = &[ReferenceRule::UnsetField {
    child: EntityKind::Cart,
    field: "addressId",
}];

const MARKETPLACE_ENTRIES: &[RuleEntry] = &[
    (EntityKind::User, USER_RULES),
    (EntityKind::Store, STORE_RULES),
    (EntityKind::StoreProduct, STORE_PRODUCT_RULES),
    (EntityKind::UserProduct, USER_PRODUCT_RULES),
    (EntityKind::Address, ADDRESS_RULES),
];

/// 参照ルール表
///
/// プロセス起動時に一度だけ定義され、実行中に変更されない。
/// 親種別ごとのエントリを持たない種別は「整理対象なし」として扱う。
#[derive(Debug, Clone, Copy)]
pub struct RuleTable {
    entries: &'static [RuleEntry],
}

impl RuleTable {
    /// 任意のエントリからルール表を作成する
    ///
    /// 本番ではマーケットプレイス標準の [`RuleTable::marketplace`] を使う。
    pub const fn new(entries: &'static [RuleEntry]) -> Self {
        Self { entries }
    }

    /// マーケットプレイス標準のルール表
    pub const fn marketplace() -> Self {
        Self::new(MARKETPLACE_ENTRIES)
    }

    /// 親種別のルール一覧を返す（未定義の種別は空スライス）
    pub fn rules_for(&self, parent: EntityKind) -> &'static [ReferenceRule] {
        self.entries
            .iter()
            .find(|(kind, _)| *kind == parent)
            .map(|(_, rules)| *rules)
            .unwrap_or(&[])
    }

    /// ルールを 1 つ以上持つ親種別の一覧
    pub fn parents(&self) -> Vec<EntityKind> {
        self.entries
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// ルール表に登場するすべての種別（親と子）
    pub fn referenced_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self
            .entries
            .iter()
            .flat_map(|(parent, rules)| {
                std::iter::once(*parent).chain(rules.iter().map(ReferenceRule::child))
            })
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// ルール表を検証し、すべての問題を収集して返す
    pub fn validate(&self) -> RuleTableValidation {
        let mut errors = Vec::new();

        validate_unique_parents(self.entries, &mut errors);
        validate_no_conflicting_children(self.entries, &mut errors);
        validate_no_cascade_cycles(self.entries, &mut errors);

        RuleTableValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// 検証に失敗した場合は `DomainError::Configuration` を返す
    pub fn ensure_valid(&self) -> Result<(), DomainError> {
        let result = self.validate();
        if result.valid {
            return Ok(());
        }
        let messages: Vec<String> = result.errors.iter().map(|e| e.message.clone()).collect();
        Err(DomainError::Configuration(messages.join("; ")))
    }
}

/// ルール表の検証結果
#[derive(Debug, Clone, Serialize)]
pub struct RuleTableValidation {
    pub valid:  bool,
    pub errors: Vec<RuleValidationError>,
}

/// ルール表の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleValidationError {
    pub code:    &'static str,
    pub message: String,
    pub parent:  EntityKind,
}

fn validate_unique_parents(entries: &[RuleEntry], errors: &mut Vec<RuleValidationError>) {
    let mut seen = HashSet::new();
    for (parent, _) in entries {
        if !seen.insert(*parent) {
            errors.push(RuleValidationError {
                code:    "duplicate_parent",
                message: format!("親種別 {parent} のエントリが重複しています"),
                parent:  *parent,
            });
        }
    }
}

fn validate_no_conflicting_children(entries: &[RuleEntry], errors: &mut Vec<RuleValidationError>) {
    for (parent, rules) in entries {
        let mut seen = HashSet::new();
        for rule in rules.iter() {
            if !seen.insert(rule.child()) {
                errors.push(RuleValidationError {
                    code:    "conflicting_rules",
                    message: format!(
                        "親種別 {parent} のルールが子コレクション {} を複数回対象にしています",
                        rule.child()
                    ),
                    parent:  *parent,
                });
            }
        }
    }
}

fn validate_no_cascade_cycles(entries: &[RuleEntry], errors: &mut Vec<RuleValidationError>) {
    // カスケードする辺だけで隣接リストを構築
    let mut adjacency: HashMap<EntityKind, Vec<EntityKind>> = HashMap::new();
    for (parent, rules) in entries {
        let targets = adjacency.entry(*parent).or_default();
        targets.extend(rules.iter().filter(|r| r.cascades()).map(ReferenceRule::child));
    }

    // 3色 DFS（White=未訪問, Gray=処理中, Black=完了）
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs(
        node: EntityKind,
        adjacency: &HashMap<EntityKind, Vec<EntityKind>>,
        colors: &mut HashMap<EntityKind, Color>,
    ) -> bool {
        colors.insert(node, Color::Gray);
        if let Some(neighbors) = adjacency.get(&node) {
            for &next in neighbors {
                match colors.get(&next).copied().unwrap_or(Color::White) {
                    Color::Gray => return true,
                    Color::White => {
                        if dfs(next, adjacency, colors) {
                            return true;
                        }
                    }
                    Color::Black => {}
                }
            }
        }
        colors.insert(node, Color::Black);
        false
    }

    let mut nodes: Vec<EntityKind> = adjacency.keys().copied().collect();
    nodes.sort();
    let mut colors: HashMap<EntityKind, Color> = HashMap::new();
    for node in nodes {
        if colors.get(&node).copied().unwrap_or(Color::White) == Color::White
            && dfs(node, &adjacency, &mut colors)
        {
            errors.push(RuleValidationError {
                code:    "cascade_cycle",
                message: format!("親種別 {node} から始まるカスケードが循環しています"),
                parent:  node,
            });
            return;
        }
    }
}
