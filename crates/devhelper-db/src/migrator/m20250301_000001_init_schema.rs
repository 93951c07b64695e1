//! Initial schema: domains and VPN session records

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(string_len(Domains::Fqdn, 253).not_null().primary_key())
                    .col(string_len(Domains::Ip, 64).not_null())
                    .col(string_len(Domains::OwnerId, 64).not_null().unique_key())
                    .col(string_len(Domains::OwnerName, 255).not_null())
                    .col(
                        timestamp_with_time_zone(Domains::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone(Domains::DeleteAt).not_null())
                    .col(boolean(Domains::BasicAuth).not_null().default(true))
                    .col(boolean(Domains::FullSsl).not_null().default(false))
                    .col(string_len(Domains::Port, 5).not_null().default("80"))
                    .to_owned(),
            )
            .await?;

        // Reminder and reclaim sweeps scan by deadline
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_domains_delete_at")
                    .table(Domains::Table)
                    .col(Domains::DeleteAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VpnAccounts::Table)
                    .if_not_exists()
                    .col(string_len(VpnAccounts::Id, 36).not_null().primary_key())
                    .col(string_len(VpnAccounts::UserName, 255).not_null())
                    .col(string_len(VpnAccounts::UserEmail, 255).not_null())
                    .col(string_len(VpnAccounts::OwnerId, 64).not_null())
                    .col(
                        timestamp_with_time_zone(VpnAccounts::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone(VpnAccounts::DeactivateAt).not_null())
                    .col(boolean(VpnAccounts::Active).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_vpn_accounts_email_active")
                    .table(VpnAccounts::Table)
                    .col(VpnAccounts::UserEmail)
                    .col(VpnAccounts::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VpnAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Domains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Domains {
    #[sea_orm(iden = "domains")]
    Table,
    Fqdn,
    Ip,
    OwnerId,
    OwnerName,
    CreatedAt,
    DeleteAt,
    BasicAuth,
    FullSsl,
    Port,
}

#[derive(DeriveIden)]
enum VpnAccounts {
    #[sea_orm(iden = "vpn_accounts")]
    Table,
    Id,
    UserName,
    UserEmail,
    OwnerId,
    CreatedAt,
    DeactivateAt,
    Active,
}
