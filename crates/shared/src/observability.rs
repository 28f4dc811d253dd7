//! # ログ初期化
//!
//! メンテナンスコマンドとテストハーネスが使うトレーシングの初期化。
//!
//! - 出力形式は `LOG_FORMAT`（`json` / `pretty`、大文字小文字は区別しない）
//! - レベルは `RUST_LOG`、未設定なら [`TracingConfig::default_filter`]
//! - 参照整理の失敗を追えるよう、`InfraError` が保持する `SpanTrace` 用の
//!   `ErrorLayer` を常に登録する

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// 1 行 1 イベントの JSON（`jq` で絞り込む運用向け）
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT` から読み取る。不正な値なら警告して `Pretty`
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var("LOG_FORMAT") else {
            return Self::default();
        };
        value.parse().unwrap_or_else(|_| {
            eprintln!("WARNING: LOG_FORMAT={value:?} は不明な形式のため pretty で出力します");
            Self::default()
        })
    }
}

/// `RUST_LOG` が無いときのフィルタ
pub const DEFAULT_FILTER: &str = "info,ichiba=debug";

/// トレーシング初期化設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// 初期化ログに出すサービス名
    pub service_name:   String,
    pub log_format:     LogFormat,
    /// `RUST_LOG` 未設定時のフィルタ
    pub default_filter: String,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::new(service_name, LogFormat::from_env())
    }

    /// `RUST_LOG` 未設定時のフィルタを差し替える
    pub fn with_default_filter(self, filter: impl Into<String>) -> Self {
        Self {
            default_filter: filter.into(),
            ..self
        }
    }
}

/// トレーシングを初期化する（プロセスで 1 回だけ呼ぶ）
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_filter));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    tracing::debug!(
        service = %config.service_name,
        log_format = %config.log_format,
        "トレーシングを初期化しました"
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("pretty", LogFormat::Pretty)]
    #[case("Pretty", LogFormat::Pretty)]
    fn test_ログ形式は大文字小文字を区別せずに読める(
        #[case] input: &str,
        #[case] expected: LogFormat,
    ) {
        assert_eq!(input.parse::<LogFormat>().unwrap(), expected);
    }

    #[test]
    fn test_不明なログ形式はパースエラー() {
        assert!("yaml".parse::<LogFormat>().is_err());
        assert!("".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_設定の既定値はprettyと標準フィルタ() {
        let config = TracingConfig::new("ichiba-maintenance", LogFormat::default());

        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_with_default_filterでフィルタだけが変わる() {
        let config =
            TracingConfig::new("ichiba-maintenance", LogFormat::Json).with_default_filter("warn");

        assert_eq!(config.default_filter, "warn");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.service_name, "ichiba-maintenance");
    }
}
