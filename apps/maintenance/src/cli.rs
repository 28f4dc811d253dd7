//! # コマンドライン引数
//!
//! `ichiba-maintenance <cleanup|count> <entity-kind> <id>` を解析する。

use clap::{Arg, ArgMatches, Command};
use ichiba_domain::entity::{DocumentId, EntityKind};
use uuid::Uuid;

/// 実行するメンテナンス操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCommand {
    /// 参照整理を実行する
    Cleanup { kind: EntityKind, id: DocumentId },
    /// 参照しているドキュメント数を表示する（変更しない）
    Count { kind: EntityKind, id: DocumentId },
}

fn target_args() -> [Arg; 2] {
    [
        Arg::new("kind")
            .required(true)
            .value_name("ENTITY_KIND")
            .help("親エンティティ種別（例: store_product）")
            .value_parser(parse_entity_kind),
        Arg::new("id")
            .required(true)
            .value_name("ID")
            .help("親エンティティの ID（UUID）")
            .value_parser(parse_document_id),
    ]
}

/// コマンド定義
pub fn command() -> Command {
    Command::new("ichiba-maintenance")
        .about("親エンティティ削除後の参照整理を手動で実行する")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("cleanup")
                .about("参照ルール表に従って参照を整理する")
                .args(target_args()),
        )
        .subcommand(
            Command::new("count")
                .about("ルールごとの参照数を表示する")
                .args(target_args()),
        )
}

/// 引数を解析する
pub fn parse_from<I, T>(args: I) -> Result<MaintenanceCommand, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let mut command = command();
    let matches = command.try_get_matches_from_mut(args)?;

    let parsed = match matches.subcommand() {
        Some(("cleanup", sub)) => {
            target(sub).map(|(kind, id)| MaintenanceCommand::Cleanup { kind, id })
        }
        Some(("count", sub)) => {
            target(sub).map(|(kind, id)| MaintenanceCommand::Count { kind, id })
        }
        _ => None,
    };
    parsed.ok_or_else(|| {
        command.error(
            clap::error::ErrorKind::MissingSubcommand,
            "cleanup か count を指定してください",
        )
    })
}

fn target(matches: &ArgMatches) -> Option<(EntityKind, DocumentId)> {
    let kind = matches.get_one::<EntityKind>("kind")?;
    let id = matches.get_one::<DocumentId>("id")?;
    Some((*kind, *id))
}

fn parse_entity_kind(value: &str) -> Result<EntityKind, String> {
    value
        .parse::<EntityKind>()
        .map_err(|_| format!("未知のエンティティ種別です: {value}"))
}

fn parse_document_id(value: &str) -> Result<DocumentId, String> {
    Uuid::parse_str(value)
        .map(DocumentId::from_uuid)
        .map_err(|e| format!("ID は UUID である必要があります: {e}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const ID: &str = "01890a5d-ac96-774b-bcce-b302099a8057";

    fn id() -> DocumentId {
        DocumentId::from_uuid(Uuid::parse_str(ID).unwrap())
    }

    #[test]
    fn test_cleanupを解析する() {
        let command = parse_from(["ichiba-maintenance", "cleanup", "store_product", ID]).unwrap();

        assert_eq!(
            command,
            MaintenanceCommand::Cleanup {
                kind: EntityKind::StoreProduct,
                id:   id(),
            }
        );
    }

    #[test]
    fn test_countを解析する() {
        let command = parse_from(["ichiba-maintenance", "count", "user", ID]).unwrap();

        assert_eq!(
            command,
            MaintenanceCommand::Count {
                kind: EntityKind::User,
                id:   id(),
            }
        );
    }

    #[rstest]
    #[case(&["ichiba-maintenance"])]
    #[case(&["ichiba-maintenance", "cleanup", "storeProduct", ID])]
    #[case(&["ichiba-maintenance", "cleanup", "store", "not-a-uuid"])]
    #[case(&["ichiba-maintenance", "count", "store"])]
    #[case(&["ichiba-maintenance", "purge", "store", ID])]
    fn test_不正な引数はエラー(#[case] args: &[&str]) {
        assert!(parse_from(args.iter().copied()).is_err());
    }

    #[test]
    fn test_コマンド定義が妥当() {
        command().debug_assert();
    }
}
