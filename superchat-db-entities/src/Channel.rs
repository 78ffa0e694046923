use sea_orm::entity::prelude::*;

/// Persisted counterpart of an in-memory `Channel` (§3). `is_dm`
/// channels are never surfaced through `ListChannels` at the MemDB
/// layer, but are still checkpointed here for crash recovery.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub channel_type: i16,
    pub parent_channel_id: Option<i64>,
    pub creator_user_id: Option<i64>,
    pub retention_hours: i32,
    pub is_dm: bool,
    pub is_private: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Creator,
    Message,
    ChannelParticipant,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Creator => Entity::belongs_to(super::User::Entity)
                .from(Column::CreatorUserId)
                .to(super::User::Column::Id)
                .into(),
            Self::Message => Entity::has_many(super::Message::Entity)
                .from(Column::Id)
                .to(super::Message::Column::ChannelId)
                .into(),
            Self::ChannelParticipant => Entity::has_many(super::ChannelParticipant::Entity)
                .from(Column::Id)
                .to(super::ChannelParticipant::Column::ChannelId)
                .into(),
        }
    }
}

impl Related<super::Message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl Related<super::ChannelParticipant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChannelParticipant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
