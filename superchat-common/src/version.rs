/// The crate version baked in at build time, reported in the
/// `SERVER_CONFIG` frame and the `superchat check` CLI output.
pub fn superchat_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
