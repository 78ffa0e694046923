use sea_orm::Schema;
use sea_orm_migration::prelude::*;

mod message {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "messages")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub channel_id: i64,
        pub subchannel_id: Option<i64>,
        pub parent_message_id: Option<i64>,
        pub thread_root_id: Option<i64>,
        pub author_user_id: Option<i64>,
        pub author_nickname: String,
        pub content: Vec<u8>,
        pub encrypted: bool,
        pub created_at: ChronoDateTimeUtc,
        pub edited_at: Option<ChronoDateTimeUtc>,
        pub deleted_at: Option<ChronoDateTimeUtc>,
        pub reply_count: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00003_create_messages"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(message::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_channel_parent")
                    .table(message::Entity)
                    .col(message::Column::ChannelId)
                    .col(message::Column::ParentMessageId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_thread_root")
                    .table(message::Entity)
                    .col(message::Column::ThreadRootId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(message::Entity).to_owned())
            .await
    }
}
