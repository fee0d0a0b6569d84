//! Helpers for the private session cookie.
//!
//! The cookie only carries the session ID; the payload lives server-side. The
//! jar encrypts and authenticates the value, so a client cannot forge or even
//! read its own session ID.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use super::session::Session;

/// The name of the session cookie.
pub const COOKIE_SESSION_ID: &str = "session_id";

/// Add the session cookie for `session` to the jar.
///
/// The cookie expires together with the session, is HTTP-only, and is never
/// sent cross-site.
pub fn set_session_cookie(jar: PrivateCookieJar, session: &Session) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, session.id.clone()))
            .expires(session.expiry)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    )
}

/// Replace the session cookie with one that expires immediately.
///
/// `jar.remove` only takes effect on the response when the removal cookie
/// carries the same path as the original, so this builds the tombstone
/// explicitly.
pub fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    )
}

/// Extract the session ID from the request's cookie jar, if present.
pub fn get_session_id_from_cookies(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(COOKIE_SESSION_ID)
        .map(|cookie| cookie.value_trimmed().to_owned())
}

#[cfg(test)]
mod cookie_tests {
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use sha2::{Digest, Sha512};
    use time::OffsetDateTime;

    use crate::auth::session::{SESSION_LIFETIME, Session, SessionData};

    use super::{
        COOKIE_SESSION_ID, get_session_id_from_cookies, invalidate_session_cookie,
        set_session_cookie,
    };

    fn get_jar() -> PrivateCookieJar {
        let hash = Sha512::digest(b"foobar");
        let key = Key::from(&hash);

        PrivateCookieJar::new(key)
    }

    fn get_test_session() -> Session {
        let now = OffsetDateTime::now_utc();

        Session {
            id: "11111111-2222-3333-4444-555555555555".to_owned(),
            data: SessionData {
                username: "Lucas Ortiz".to_owned(),
                login_time: now,
            },
            expiry: now + SESSION_LIFETIME,
        }
    }

    #[test]
    fn set_then_get_round_trips_the_session_id() {
        let session = get_test_session();

        let jar = set_session_cookie(get_jar(), &session);

        assert_eq!(get_session_id_from_cookies(&jar), Some(session.id));
    }

    #[test]
    fn session_cookie_is_scoped_and_http_only() {
        let session = get_test_session();

        let jar = set_session_cookie(get_jar(), &session);
        let cookie = jar.get(COOKIE_SESSION_ID).unwrap();

        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn invalidated_cookie_expires_in_the_past() {
        let session = get_test_session();
        let jar = set_session_cookie(get_jar(), &session);

        let jar = invalidate_session_cookie(jar);
        let cookie = jar.get(COOKIE_SESSION_ID).unwrap();

        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_ne!(get_session_id_from_cookies(&jar), Some(session.id));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(get_session_id_from_cookies(&get_jar()), None);
    }
}
