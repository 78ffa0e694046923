use sea_orm::entity::prelude::*;

/// Historical audit row for a connection (§3 "Ownership": "Session is
/// persisted only as a historical audit row ... live Session state
/// never touches disk"). Written once on connect, updated once on
/// disconnect; never read back into MemDB.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "session_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<i64>,
    pub nickname: Option<String>,
    pub remote_addr: String,
    pub connected_at: ChronoDateTimeUtc,
    pub disconnected_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
