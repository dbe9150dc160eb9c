use actix_web::cookie::{time::Duration, Cookie, SameSite};

pub const GUEST_COOKIE: &str = "guestId";
pub const SESSION_COOKIE: &str = "session_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

pub const GUEST_COOKIE_MAX_AGE_DAYS: i64 = 7;
pub const SESSION_COOKIE_MAX_AGE_DAYS: i64 = 7;
pub const OAUTH_STATE_MAX_AGE_MINUTES: i64 = 10;

fn base_cookie(name: &'static str, value: String, secure: bool, same_site: SameSite) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path("/")
        .finish()
}

pub fn guest_cookie(guest_id: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(GUEST_COOKIE, guest_id.to_string(), secure, SameSite::Strict);
    cookie.set_max_age(Duration::days(GUEST_COOKIE_MAX_AGE_DAYS));
    cookie
}

pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    // Lax so the cookie survives the top-level redirect back from an OAuth provider
    let mut cookie = base_cookie(SESSION_COOKIE, token.to_string(), secure, SameSite::Lax);
    cookie.set_max_age(Duration::days(SESSION_COOKIE_MAX_AGE_DAYS));
    cookie
}

pub fn oauth_state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(OAUTH_STATE_COOKIE, state.to_string(), secure, SameSite::Lax);
    cookie.set_max_age(Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES));
    cookie
}

/// Expired cookie that makes the browser drop `name`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}
