//! The URIs for the application's routes.

/// The expense submission form.
pub const ROOT: &str = "/";
/// The log-in page.
pub const LOG_IN_VIEW: &str = "/login";
/// The expense history page.
pub const HISTORY_VIEW: &str = "/historial";
/// The static assets (scripts, styles) the pages reference.
pub const STATIC_ASSETS: &str = "/static";

/// Log in and receive a session cookie.
pub const LOG_IN_API: &str = "/api/login";
/// Log out and invalidate the session.
pub const LOG_OUT_API: &str = "/api/logout";
/// Check whether the request carries a live session.
pub const CHECK_AUTH_API: &str = "/api/check-auth";
/// Submit (POST) or list (GET) expense records.
pub const PAGOS_API: &str = "/api/pagos";
/// The container health check.
pub const HEALTH: &str = "/health";
