//! # Ichiba メンテナンスコマンド
//!
//! 親エンティティの削除後に残った参照を運用者が手動で整理するためのコマンド。
//!
//! ## 用途
//!
//! - **cleanup**: 参照ルール表に従って参照を整理する（親ドキュメント自体は削除しない）
//! - **count**: 整理の前に、ルールごとに何件のドキュメントが参照しているかを確認する
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `LOG_FORMAT` | No | `json` または `pretty`（デフォルト: `pretty`） |
//! | `RUST_LOG` | No | ログレベル（デフォルト: `info,ichiba=debug`） |
//!
//! ## 実行方法
//!
//! ```bash
//! # 参照数の確認
//! cargo run -p ichiba-maintenance -- count store 01890a5d-ac96-774b-bcce-b302099a8057
//!
//! # 参照整理
//! cargo run -p ichiba-maintenance -- cleanup store 01890a5d-ac96-774b-bcce-b302099a8057
//! ```

mod cli;
mod config;

use anyhow::Context as _;
use cli::MaintenanceCommand;
use config::MaintenanceConfig;
use ichiba_domain::reference::RuleTable;
use ichiba_infra::{
    db,
    deletion::{CollectionRegistry, ReferenceCleaner},
};
use ichiba_shared::{
    event_log::error as log_error,
    observability::{TracingConfig, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::from_env("ichiba-maintenance"));

    let command = cli::parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit());

    // 参照ルール表は DB 接続前に検証する
    let rules = RuleTable::marketplace();
    rules
        .ensure_valid()
        .context("参照ルール表の検証に失敗しました")?;

    let config = MaintenanceConfig::from_env().context("DATABASE_URL が設定されていません")?;
    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベースに接続できません")?;
    db::run_migrations(&pool)
        .await
        .context("マイグレーションに失敗しました")?;

    let cleaner = ReferenceCleaner::new(rules, CollectionRegistry::with_postgres(pool))?;

    match command {
        MaintenanceCommand::Cleanup { kind, id } => {
            if let Err(error) = cleaner.manual_cascade_delete(kind, id).await {
                for failure in error.cleanup_failures() {
                    tracing::error!(
                        error.category = log_error::category::INFRASTRUCTURE,
                        error.kind = log_error::kind::PARTIAL_CLEANUP,
                        %kind,
                        %id,
                        error = %failure,
                        "参照整理に失敗したルールがあります"
                    );
                }
                return Err(error.into());
            }
            tracing::info!(%kind, %id, "参照整理が完了しました");
        }
        MaintenanceCommand::Count { kind, id } => {
            let counts = cleaner.count_references(kind, id).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
    }

    Ok(())
}
