use sea_orm::entity::prelude::*;

/// Pending DM consent (§3). Deleted on accept, decline, or session end;
/// this table only ever holds invites still awaiting a response.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
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
