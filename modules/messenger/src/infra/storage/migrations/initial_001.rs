use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    AuthorId,
    Content,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Threads {
    Table,
    Id,
    PairKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ThreadParticipants {
    Table,
    ThreadId,
    UserId,
    JoinedAt,
}

#[derive(DeriveIden)]
enum ThreadMessages {
    Table,
    ThreadId,
    MessageId,
    AttachedAt,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    UserId,
    Avatar,
    Bio,
    Link,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Username)
                            .string_len(150)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Messages::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Messages::Content).text().not_null())
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_author")
                            .from(Messages::Table, Messages::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Threads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Threads::Id).uuid().not_null().primary_key())
                    // NULLs never collide, so only direct threads are constrained
                    .col(ColumnDef::new(Threads::PairKey).string_len(73).null().unique_key())
                    .col(
                        ColumnDef::new(Threads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Threads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ThreadParticipants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ThreadParticipants::ThreadId).uuid().not_null())
                    .col(ColumnDef::new(ThreadParticipants::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ThreadParticipants::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ThreadParticipants::ThreadId)
                            .col(ThreadParticipants::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_participants_thread")
                            .from(ThreadParticipants::Table, ThreadParticipants::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_participants_user")
                            .from(ThreadParticipants::Table, ThreadParticipants::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_thread_participants_user")
                    .table(ThreadParticipants::Table)
                    .col(ThreadParticipants::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ThreadMessages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ThreadMessages::ThreadId).uuid().not_null())
                    .col(ColumnDef::new(ThreadMessages::MessageId).uuid().not_null())
                    .col(
                        ColumnDef::new(ThreadMessages::AttachedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ThreadMessages::ThreadId)
                            .col(ThreadMessages::MessageId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_messages_thread")
                            .from(ThreadMessages::Table, ThreadMessages::ThreadId)
                            .to(Threads::Table, Threads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_thread_messages_message")
                            .from(ThreadMessages::Table, ThreadMessages::MessageId)
                            .to(Messages::Table, Messages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_messages_created_at")
                    .table(Messages::Table)
                    .col(Messages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Profiles::UserId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Profiles::Avatar).string_len(255).null())
                    .col(ColumnDef::new(Profiles::Bio).text().null())
                    .col(ColumnDef::new(Profiles::Link).string_len(200).null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profiles_user")
                            .from(Profiles::Table, Profiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ThreadMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ThreadParticipants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Threads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}
