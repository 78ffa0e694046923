use sea_orm::entity::prelude::*;

/// Persisted counterpart of an in-memory `User` (§3). MemDB is
/// authoritative at runtime; this table is what the checkpointer
/// writes rows into and what `superchat create-user`/crash recovery
/// read back.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub nickname: String,
    pub password_hash: Option<Vec<u8>>,
    pub flags: i32,
    pub encryption_public_key: Option<Vec<u8>>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Channel,
    Message,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Channel => Entity::has_many(super::Channel::Entity)
                .from(Column::Id)
                .to(super::Channel::Column::CreatorUserId)
                .into(),
            Self::Message => Entity::has_many(super::Message::Entity)
                .from(Column::Id)
                .to(super::Message::Column::AuthorUserId)
                .into(),
        }
    }
}

impl Related<super::Channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl Related<super::Message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
