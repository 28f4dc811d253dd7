//! # インフラ層エラー定義
//!
//! データベースやドキュメントコレクションの操作で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: sqlx::Error, serde_json::Error をラップ
//! - **ドメインエラーとの分離**: インフラ固有のエラーを明示
//! - **SpanTrace 自動捕捉**: `From` 実装や convenience constructor で
//!   エラー生成時の呼び出し経路を自動記録する
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別（Database, CascadeCycle 等）
//!
//! ## 参照整理の失敗
//!
//! 参照整理はルールごとに並行実行され、トランザクションで囲まない。
//! 1 つのルールだけが失敗した場合は、そのルールのエラーをそのまま返す。
//! 複数のルールが失敗した場合は [`InfraErrorKind::CleanupFailed`] に全件をまとめて返す。
//! いずれの場合も、成功したルールの変更は取り消されない。

use std::fmt;

use derive_more::Display;
use ichiba_domain::entity::{DocumentId, EntityKind};
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
///
/// ## パターンマッチ
///
/// エラー種別に応じた処理には [`kind()`](InfraError::kind) を使用する:
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::CascadeCycle { entity, id } => { /* 設定不備 */ }
///     _ => { /* その他 */ }
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// シリアライズ/デシリアライズエラー
    #[error("シリアライズエラー: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 参照ルール表の設定エラー
    ///
    /// 起動時の検証で見つかった競合ルールや循環カスケード。
    #[error("参照ルール設定エラー: {0}")]
    Configuration(String),

    /// コレクションが登録されていない
    ///
    /// ルール表が参照する種別のコレクションがレジストリに無い（配線漏れ）。
    #[error("コレクションが登録されていません: {0}")]
    UnregisteredCollection(EntityKind),

    /// カスケード削除の循環
    ///
    /// 1 回の参照整理の中で、処理中の `(種別, ID)` に再び到達した。
    #[error("カスケード削除が循環しています: {entity}(id={id})")]
    CascadeCycle {
        entity: EntityKind,
        id:     DocumentId,
    },

    /// 複数ルールの参照整理が失敗した
    ///
    /// 成功したルールの変更はコミット済みのまま残る。
    #[error(
        "参照整理に失敗しました: {entity}(id={id}), 失敗したルール数={}",
        .failures.len()
    )]
    CleanupFailed {
        entity:   EntityKind,
        id:       DocumentId,
        failures: Vec<InfraError>,
    },

    /// クライアント入力エラー
    #[error("入力エラー: {0}")]
    InvalidInput(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

// ===== InfraError のメソッド =====

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// 参照整理で失敗したルールのエラー一覧
    ///
    /// `CleanupFailed` 以外は自分自身だけを含む 1 件として扱う。
    pub fn cleanup_failures(&self) -> Vec<&InfraError> {
        match &self.kind {
            InfraErrorKind::CleanupFailed { failures, .. } => failures.iter().collect(),
            _ => vec![self],
        }
    }

    /// InfraError を分解して InfraErrorKind と SpanTrace を取り出す
    pub fn into_parts(self) -> (InfraErrorKind, SpanTrace) {
        (self.kind, self.span_trace)
    }

    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    // ===== Convenience constructors =====

    /// 参照ルール設定エラーを生成する
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Configuration(msg.into()))
    }

    /// 未登録コレクションエラーを生成する
    pub fn unregistered_collection(kind: EntityKind) -> Self {
        Self::capture(InfraErrorKind::UnregisteredCollection(kind))
    }

    /// カスケード循環エラーを生成する
    pub fn cascade_cycle(entity: EntityKind, id: DocumentId) -> Self {
        Self::capture(InfraErrorKind::CascadeCycle { entity, id })
    }

    /// 複数ルールの失敗をまとめたエラーを生成する
    pub fn cleanup_failed(entity: EntityKind, id: DocumentId, failures: Vec<InfraError>) -> Self {
        Self::capture(InfraErrorKind::CleanupFailed {
            entity,
            id,
            failures,
        })
    }

    /// クライアント入力エラーを生成する
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::InvalidInput(msg.into()))
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Unexpected(msg.into()))
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::capture(InfraErrorKind::Database(source))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(source: serde_json::Error) -> Self {
        Self::capture(InfraErrorKind::Serialization(source))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// テスト用に ErrorLayer 付き subscriber を設定する
    fn with_error_layer(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        f();
    }

    #[test]
    fn test_from_sqlx_errorでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_collection", collection = "carts");
            let _enter = span.enter();

            let err: InfraError = sqlx::Error::RowNotFound.into();

            assert!(matches!(err.kind(), InfraErrorKind::Database(_)));
            let trace_str = format!("{}", err.span_trace());
            assert!(
                trace_str.contains("test_collection"),
                "SpanTrace がスパン名を含むこと: {trace_str}",
            );
        });
    }

    #[test]
    fn test_from_serde_json_errorでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_serialization");
            let _enter = span.enter();

            let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
            let err: InfraError = json_err.into();

            assert!(matches!(err.kind(), InfraErrorKind::Serialization(_)));
            let trace_str = format!("{}", err.span_trace());
            assert!(trace_str.contains("test_serialization"));
        });
    }

    #[test]
    fn test_cascade_cycleの表示() {
        let id = DocumentId::from_uuid(uuid::Uuid::nil());
        let err = InfraError::cascade_cycle(EntityKind::StoreProduct, id);

        assert_eq!(
            format!("{err}"),
            "カスケード削除が循環しています: store_product(id=00000000-0000-0000-0000-000000000000)"
        );
    }

    #[test]
    fn test_cleanup_failedは失敗件数を表示し全エラーを保持する() {
        let id = DocumentId::from_uuid(uuid::Uuid::nil());
        let err = InfraError::cleanup_failed(
            EntityKind::User,
            id,
            vec![
                InfraError::unexpected("carts"),
                InfraError::unexpected("wishlists"),
            ],
        );

        assert!(format!("{err}").ends_with("失敗したルール数=2"));
        assert_eq!(err.cleanup_failures().len(), 2);
    }

    #[test]
    fn test_cleanup_failuresは単一エラーを1件として返す() {
        let err = InfraError::unregistered_collection(EntityKind::Review);
        assert_eq!(err.cleanup_failures().len(), 1);
        assert_eq!(format!("{err}"), "コレクションが登録されていません: review");
    }

    #[test]
    fn test_sourceがinfra_error_kindに委譲する() {
        use std::error::Error;

        let err: InfraError = sqlx::Error::RowNotFound.into();
        assert!(err.source().is_some());

        let err = InfraError::configuration("conflicting_rules");
        assert!(err.source().is_none());
    }
}
