use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ValidationTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValidationTasks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ValidationTasks::JobId).uuid().not_null())
                    .col(
                        ColumnDef::new(ValidationTasks::ItemIndex)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ValidationTasks::Address).string().not_null())
                    .col(ColumnDef::new(ValidationTasks::Status).string().not_null())
                    .col(
                        ColumnDef::new(ValidationTasks::DeliveryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ValidationTasks::LockToken).uuid())
                    .col(ColumnDef::new(ValidationTasks::LockExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ValidationTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_validation_tasks_status_created")
                    .table(ValidationTasks::Table)
                    .col(ValidationTasks::Status)
                    .col(ValidationTasks::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ValidationTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ValidationTasks {
    Table,
    Id,
    JobId,
    ItemIndex,
    Address,
    Status,
    DeliveryCount,
    LockToken,
    LockExpiresAt,
    CreatedAt,
}
