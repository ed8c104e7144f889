use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 批量校验作业
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::Status).string().not_null())
                    .col(ColumnDef::new(Jobs::Total).integer().not_null())
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Jobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::CancelledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::LastProgressAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_status_progress")
                    .table(Jobs::Table)
                    .col(Jobs::Status)
                    .col(Jobs::LastProgressAt)
                    .to_owned(),
            )
            .await?;

        // 作业条目，(job_id, item_index) 唯一定位一个地址
        manager
            .create_table(
                Table::create()
                    .table(JobItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(JobItems::JobId).uuid().not_null())
                    .col(ColumnDef::new(JobItems::ItemIndex).integer().not_null())
                    .col(ColumnDef::new(JobItems::Address).string().not_null())
                    .col(ColumnDef::new(JobItems::Status).string().not_null())
                    .col(
                        ColumnDef::new(JobItems::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(JobItems::Result).json())
                    .col(
                        ColumnDef::new(JobItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(JobItems::JobId)
                            .col(JobItems::ItemIndex),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_job_items_job_id")
                            .from(JobItems::Table, JobItems::JobId)
                            .to(Jobs::Table, Jobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    Status,
    Total,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
    CancelledAt,
    LastProgressAt,
}

#[derive(DeriveIden)]
enum JobItems {
    Table,
    JobId,
    ItemIndex,
    Address,
    Status,
    Attempts,
    Result,
    UpdatedAt,
}
