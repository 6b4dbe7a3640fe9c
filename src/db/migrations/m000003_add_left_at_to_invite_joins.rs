use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(InviteJoins::Table)
                    .add_column(
                        ColumnDef::new(InviteJoins::LeftAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(InviteJoins::Table)
                    .drop_column(InviteJoins::LeftAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum InviteJoins {
    Table,
    LeftAt,
}
