use uuid::Uuid;

/// The stable error taxonomy carried on ERROR frames and in logs.
///
/// Codes are a wire contract: adding a variant must not renumber an
/// existing one.
#[derive(thiserror::Error, Debug)]
pub enum SuperchatError {
    // 1000-1999 Protocol
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    // 2000-2999 Validation
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("rate limited")]
    RateLimited,
    #[error("subscription limit reached")]
    SubscriptionLimit,
    #[error("name already in use: {0}")]
    NameInUse(String),
    #[error("{0} is too long")]
    TooLong(&'static str),

    // 3000-3999 Authorization
    #[error("not authenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("banned")]
    Banned,

    // 4000-4999 NotFound
    #[error("channel not found: {0}")]
    ChannelNotFound(i64),
    #[error("message not found: {0}")]
    MessageNotFound(i64),
    #[error("user not found: {0}")]
    UserNotFound(String),

    // 9000-9999 Internal
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
}

impl SuperchatError {
    /// The numeric code sent on the wire's ERROR frame. Internal errors
    /// always collapse to 9000 regardless of their Rust-side variant, so
    /// the client never learns more than "something went wrong server-side".
    pub fn code(&self) -> u16 {
        use SuperchatError::*;
        match self {
            InvalidMessage(_) => 1000,
            NotImplemented(_) => 1001,
            UnsupportedVersion(_) => 1002,
            MissingField(_) => 2000,
            RateLimited => 2001,
            SubscriptionLimit => 2002,
            NameInUse(_) => 2003,
            TooLong(_) => 2004,
            Unauthenticated => 3000,
            Forbidden => 3001,
            Banned => 3002,
            ChannelNotFound(_) => 4000,
            MessageNotFound(_) => 4001,
            UserNotFound(_) => 4002,
            Database(_) | Io(_) | Config(_) | Internal(_) | SessionNotFound(_) => 9000,
        }
    }

    /// Whether this error is safe to report verbatim on the wire. Internal
    /// errors are logged with full context server-side and replaced with a
    /// generic message before being sent to the client.
    pub fn is_internal(&self) -> bool {
        self.code() == 9000
    }

    /// The message to actually put on the wire: the real message for
    /// client-facing errors, a generic one for internal errors.
    pub fn wire_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_owned()
        } else {
            self.to_string()
        }
    }
}
