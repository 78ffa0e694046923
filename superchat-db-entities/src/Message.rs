use sea_orm::entity::prelude::*;

/// Persisted counterpart of an in-memory `Message` (§3). `content` is
/// raw bytes — plaintext UTF-8 for normal posts, an opaque
/// nonce‖ciphertext‖tag blob when `encrypted` is set (§4.6).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
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

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Channel,
    Author,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Channel => Entity::belongs_to(super::Channel::Entity)
                .from(Column::ChannelId)
                .to(super::Channel::Column::Id)
                .into(),
            Self::Author => Entity::belongs_to(super::User::Entity)
                .from(Column::AuthorUserId)
                .to(super::User::Column::Id)
                .into(),
        }
    }
}

impl Related<super::Channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
