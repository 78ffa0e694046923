use std::io::IsTerminal;
use std::path::Path;

use tracing::*;

/// The sqlite DSN the checkpointer, `create-user`, `migrate` and `check`
/// all open against, derived from `server.data_dir` the same way across
/// every one-shot command and the live server.
pub(crate) fn sqlite_url(data_dir: &Path) -> String {
    format!("sqlite://{}/superchat.sqlite3?mode=rwc", data_dir.display())
}

pub(crate) fn assert_interactive_terminal() {
    if !std::io::stdin().is_terminal() {
        error!("Please run this command from an interactive terminal.");
        if is_docker() {
            info!("(have you forgotten `-it`?)");
        }
        std::process::exit(1);
    }
}

pub(crate) fn is_docker() -> bool {
    std::env::var("DOCKER").is_ok()
}
