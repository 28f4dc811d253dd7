//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で効率的に調査できるよう、ログフィールドの命名規約と
//! ヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` に `error.category` + `error.kind` フィールドを直接追加する。
//! 定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.entity_type`: エンティティ種別
/// - `event.entity_id`: エンティティ ID
/// - `event.result`: 結果（[`event::result`] の定数を使用）
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const CLEANUP: &str = "cleanup";
    }

    /// イベントアクション
    pub mod action {
        /// 親エンティティに対する参照整理が完了した
        pub const REFERENCES_CLEANED: &str = "references.cleaned";
        /// 参照元ドキュメントを丸ごと削除した
        pub const CHILD_DELETED: &str = "child.deleted";
        /// 親エンティティを物理削除した
        pub const PARENT_DELETED: &str = "parent.deleted";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB、ドキュメントコレクション）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 参照ルール表の設定不備
        pub const CONFIGURATION: &str = "configuration";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const CASCADE_CYCLE: &str = "cascade_cycle";
        pub const RULE_TABLE: &str = "rule_table";
        pub const UNREGISTERED_COLLECTION: &str = "unregistered_collection";
        pub const PARTIAL_CLEANUP: &str = "partial_cleanup";
        pub const INTERNAL: &str = "internal";
    }
}
