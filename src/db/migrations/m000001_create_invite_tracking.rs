use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invites::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invites::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(Invites::Code).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Invites::Uses)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Invites::CreatorId).big_integer())
                    .col(ColumnDef::new(Invites::ChannelId).big_integer())
                    .col(ColumnDef::new(Invites::MaxUses).integer())
                    .col(ColumnDef::new(Invites::MaxAge).integer())
                    .col(
                        ColumnDef::new(Invites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invites::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Invites::GuildId).col(Invites::Code))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invites-guild-creator")
                    .table(Invites::Table)
                    .col(Invites::GuildId)
                    .col(Invites::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InviteJoins::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InviteJoins::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InviteJoins::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(InviteJoins::MemberId).big_integer().not_null())
                    .col(
                        ColumnDef::new(InviteJoins::MemberName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InviteJoins::InviterId).big_integer())
                    .col(ColumnDef::new(InviteJoins::InviterName).string_len(64))
                    .col(
                        ColumnDef::new(InviteJoins::InviteCode)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteJoins::InviteUses)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteJoins::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invite-joins-guild-member")
                    .table(InviteJoins::Table)
                    .col(InviteJoins::GuildId)
                    .col(InviteJoins::MemberId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InviteStats::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InviteStats::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(InviteStats::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(InviteStats::RegularInvites)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InviteStats::LeftInvites)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InviteStats::FakeInvites)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InviteStats::BonusInvites)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InviteStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(InviteStats::GuildId)
                            .col(InviteStats::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InviteStats::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(InviteJoins::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Invites::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Invites {
    Table,
    GuildId,
    Code,
    Uses,
    CreatorId,
    ChannelId,
    MaxUses,
    MaxAge,
    CreatedAt,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum InviteJoins {
    Table,
    Id,
    GuildId,
    MemberId,
    MemberName,
    InviterId,
    InviterName,
    InviteCode,
    InviteUses,
    JoinedAt,
}

#[derive(DeriveIden)]
enum InviteStats {
    Table,
    GuildId,
    UserId,
    RegularInvites,
    LeftInvites,
    FakeInvites,
    BonusInvites,
    UpdatedAt,
}
