use sea_orm::entity::prelude::*;

/// Structured audit trail for admin actions, grounded in the teacher's
/// `LogEntry` table — a natural counterpart to `User.flags` (banned)
/// and the "author-only or admin" language in §4.3.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "audit_log_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub actor_user_id: Option<i64>,
    pub action: String,
    #[sea_orm(column_type = "Text")]
    pub target_description: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
