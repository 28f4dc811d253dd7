//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## 設計方針
//!
//! - **型による分類**: エラーの種類を列挙型で明示し、パターンマッチで処理可能に
//! - **thiserror 活用**: `#[error(...)]` マクロでエラーメッセージを自動生成
//!
//! ## 使用例
//!
//! ```rust
//! use ichiba_domain::DomainError;
//!
//! fn validate_quantity(quantity: u32) -> Result<(), DomainError> {
//!     if quantity == 0 {
//!         return Err(DomainError::Validation("数量は 1 以上です".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 入力値やドキュメントの形状がビジネスルールに違反している場合に使用する。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 参照ルール表の設定エラー
    ///
    /// 起動時の検証で、同一コレクションへの競合ルールや
    /// カスケードの循環が見つかった場合に使用する。
    #[error("参照ルール設定エラー: {0}")]
    Configuration(String),
}
