//! Route classification for the session gate.
//!
//! `/` matches exactly; every other entry matches by prefix. Public routes
//! never redirect. Protected pages redirect signed-out visitors to the login
//! page. Other `/api/` routes are left to their handlers, which answer 401
//! JSON when they need a session.

/// Paths anyone may open.
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/login",
    "/signup",
    "/about",
    "/explore",
    "/proverbs",
    "/u/",
    "/api/health",
    "/api/auth/",
    "/api/feed",
    "/api/profiles/",
    "/api/leaderboard",
];

/// Pages that require a session.
pub const PROTECTED_PREFIXES: &[&str] = &["/feed", "/settings", "/notifications", "/bookmarks", "/admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    /// API route that authenticates inside its handler.
    Api,
}

pub fn classify(path: &str) -> RouteClass {
    if path == "/" || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Public;
    }
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Protected;
    }
    if path.starts_with("/api/") {
        return RouteClass::Api;
    }
    // Unlisted pages are treated as public
    RouteClass::Public
}

/// Login URL carrying the original destination.
pub fn login_redirect(login_path: &str, path_and_query: &str) -> String {
    format!("{login_path}?redirectTo={}", urlencoding::encode(path_and_query))
}
