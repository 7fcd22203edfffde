use time::Duration;
use tower_cookies::{Cookie, Cookies};

use super::jwt_service::ACCESS_TOKEN_TTL_HOURS;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
const SECURE: bool = true; // Set to true for HTTPS
const HTTP_ONLY: bool = true;
const SAME_SITE: tower_cookies::cookie::SameSite = tower_cookies::cookie::SameSite::Strict;

pub struct CookieService;

impl CookieService {
    pub fn set_access_cookie(cookies: &Cookies, access_token: &str) {
        cookies.add(Self::create_cookie(
            ACCESS_TOKEN_COOKIE,
            access_token,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        ));
    }

    pub fn clear_access_cookie(cookies: &Cookies) {
        cookies.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/").build());
    }

    pub fn access_token(cookies: &Cookies) -> Option<String> {
        cookies
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn create_cookie(name: &'static str, value: &str, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name, value.to_string()))
            .secure(SECURE)
            .http_only(HTTP_ONLY)
            .same_site(SAME_SITE)
            .path("/")
            .max_age(max_age)
            .build()
    }
}
