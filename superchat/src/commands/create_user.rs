//! `superchat create-user` (§4.3 `RegisterUser`'s offline counterpart).
//! Writes straight to SQLite via `sea-orm`, the way the teacher's own
//! `create_user` command inserts a `User`/`PasswordCredential` pair
//! without going through a live `Services`/session. MemDB has no
//! path to hydrate from SQL at startup, so this only takes effect for
//! accounts created before the server's first `run` — once it's live,
//! new accounts come from in-band `REGISTER_USER` or SSH
//! auto-registration instead (see DESIGN.md).

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, Database, EntityTrait, QueryFilter};
use superchat_common::helpers::hash::derive_password_key;
use superchat_common::types::{Secret, UserFlags};
use superchat_db_entities::User;
use tracing::info;

use crate::commands::common::sqlite_url;
use crate::config::load_config;

pub(crate) async fn command(
    cli: &crate::Cli,
    nickname: &str,
    password: &Secret<String>,
    admin: bool,
) -> Result<()> {
    if nickname.trim().is_empty() {
        bail!("nickname must not be empty");
    }

    let config = load_config(&cli.config)?;
    let connection = Database::connect(sqlite_url(&config.server.data_dir)).await?;
    superchat_db_migrations::migrate_database(&connection).await?;

    let nickname_lower = nickname.to_lowercase();
    let password_hash = derive_password_key(password.expose_secret(), &nickname_lower)
        .context("deriving password key")?;
    let flags = if admin { UserFlags::ADMIN as i32 } else { 0 };

    let existing = User::Entity::find()
        .filter(User::Column::Nickname.eq(nickname.to_owned()))
        .one(&connection)
        .await?;

    match existing {
        Some(user) => {
            let mut active: User::ActiveModel = user.into();
            active.password_hash = Set(Some(password_hash.to_vec()));
            active.flags = Set(flags);
            active.update(&connection).await?;
            info!(%nickname, "updated existing user");
        }
        None => {
            let active = User::ActiveModel {
                id: NotSet,
                nickname: Set(nickname.to_owned()),
                password_hash: Set(Some(password_hash.to_vec())),
                flags: Set(flags),
                encryption_public_key: Set(None),
                created_at: Set(Utc::now()),
            };
            active.insert(&connection).await?;
            info!(%nickname, "created user");
        }
    }

    Ok(())
}
