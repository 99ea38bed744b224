//! Build version shown by `--version`, `/api/health` and the completion
//! client's user agent.

/// `APP_VERSION` at build time, else the crate version.
pub const VERSION: &str = match option_env!("APP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

pub fn user_agent() -> String {
    format!("zafira-backend/{VERSION}")
}
