//! Persist reminder dedup flags so restarts do not repeat notices

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationFlags::Table)
                    .if_not_exists()
                    .col(string_len(NotificationFlags::Namespace, 32).not_null())
                    .col(string_len(NotificationFlags::Key, 255).not_null())
                    .col(
                        timestamp_with_time_zone(NotificationFlags::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(NotificationFlags::Namespace)
                            .col(NotificationFlags::Key),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationFlags::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationFlags {
    #[sea_orm(iden = "notification_flags")]
    Table,
    Namespace,
    Key,
    CreatedAt,
}
