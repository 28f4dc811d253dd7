//! # メンテナンスコマンド設定
//!
//! 環境変数からメンテナンスコマンドの設定を読み込む。

use std::env;

/// メンテナンスコマンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// PostgreSQL 接続 URL
    pub database_url: String,
}

impl MaintenanceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, env::VarError> {
        Self::from_lookup(|key| env::var(key))
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<Self, env::VarError> {
        let database_url = lookup("DATABASE_URL")?;
        if database_url.trim().is_empty() {
            return Err(env::VarError::NotPresent);
        }
        Ok(Self { database_url })
    }
}
