use sea_orm::entity::prelude::*;

/// DM membership (§3). `CHECK: at least one of user/session is set` is
/// enforced at the MemDB layer, not by a SQL constraint, since sea-orm's
/// schema builder has no portable way to express it across the
/// sqlite/postgres/mysql backends this table may run on.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
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

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Channel,
    User,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Channel => Entity::belongs_to(super::Channel::Entity)
                .from(Column::ChannelId)
                .to(super::Channel::Column::Id)
                .into(),
            Self::User => Entity::belongs_to(super::User::Entity)
                .from(Column::UserId)
                .to(super::User::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
