use sea_orm::Schema;
use sea_orm_migration::prelude::*;

mod channel_participant {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "channel_participants")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub channel_id: i64,
        pub user_id: Option<i64>,
        pub session_id: Option<String>,
        pub nickname: String,
        pub is_operator: bool,
        pub joined_at: ChronoDateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00004_create_channel_participants"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(channel_participant::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_participants_channel_user")
                    .table(channel_participant::Entity)
                    .col(channel_participant::Column::ChannelId)
                    .col(channel_participant::Column::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_participants_channel_session")
                    .table(channel_participant::Entity)
                    .col(channel_participant::Column::ChannelId)
                    .col(channel_participant::Column::SessionId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(channel_participant::Entity).to_owned())
            .await
    }
}
