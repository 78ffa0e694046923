use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use sea_orm_migration::MigrationTrait;

mod m00001_create_users;
mod m00002_create_channels;
mod m00003_create_messages;
mod m00004_create_channel_participants;
mod m00005_create_dm_invites;
mod m00006_create_session_records;
mod m00007_create_audit_log_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m00001_create_users::Migration),
            Box::new(m00002_create_channels::Migration),
            Box::new(m00003_create_messages::Migration),
            Box::new(m00004_create_channel_participants::Migration),
            Box::new(m00005_create_dm_invites::Migration),
            Box::new(m00006_create_session_records::Migration),
            Box::new(m00007_create_audit_log_entries::Migration),
        ]
    }
}

/// Runs unapplied migrations in order, per §4.5 ("current schema version
/// is read from a schema_migrations table; unapplied versions are
/// executed in order"). `sea-orm-migration` tracks this itself in its
/// own `seaql_migrations` bookkeeping table — see SPEC_FULL.md §3.
pub async fn migrate_database(connection: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(connection, None).await
}
