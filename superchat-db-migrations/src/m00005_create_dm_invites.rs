use sea_orm::Schema;
use sea_orm_migration::prelude::*;

mod dm_invite {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "dm_invites")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub initiator_user_id: Option<i64>,
        pub initiator_session_id: Option<String>,
        pub target_user_id: Option<i64>,
        pub target_session_id: Option<String>,
        pub is_encrypted: bool,
        pub created_at: ChronoDateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00005_create_dm_invites"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(dm_invite::Entity))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(dm_invite::Entity).to_owned())
            .await
    }
}
