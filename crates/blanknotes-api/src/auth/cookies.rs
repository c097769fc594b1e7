//! Session cookie transport
//!
//! Both tokens travel as `HttpOnly` cookies scoped to `/`. Development mode
//! uses `SameSite=Lax` so the frontend works over plain HTTP; otherwise the
//! cookies are `SameSite=None; Secure` for cross-site frontends.

/// Cookie carrying the access token
pub const ACCESS_COOKIE: &str = "access-token";

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Builds `Set-Cookie` header values
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    dev: bool,
}

impl CookiePolicy {
    pub fn new(dev: bool) -> Self {
        Self { dev }
    }

    fn same_site(&self) -> &'static str {
        if self.dev {
            "SameSite=Lax"
        } else {
            "SameSite=None; Secure"
        }
    }

    /// Cookie that stores `value` for `max_age_secs`
    pub fn set(&self, name: &str, value: &str, max_age_secs: u64) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; {}; Max-Age={}",
            name,
            value,
            self.same_site(),
            max_age_secs
        )
    }

    /// Cookie that makes the browser drop `name`
    pub fn clear(&self, name: &str) -> String {
        format!("{}=; Path=/; HttpOnly; {}; Max-Age=0", name, self.same_site())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_cookie() {
        let cookie = CookiePolicy::new(true).set(ACCESS_COOKIE, "abc", 600);
        assert_eq!(
            cookie,
            "access-token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=600"
        );
    }

    #[test]
    fn test_production_cookie_is_secure() {
        let cookie = CookiePolicy::new(false).set(REFRESH_COOKIE, "xyz", 86_400);
        assert!(cookie.contains("SameSite=None; Secure"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = CookiePolicy::new(true).clear(REFRESH_COOKIE);
        assert!(cookie.starts_with("refresh-token=;"));
        assert!(cookie.ends_with("Max-Age=0"));
    }
}
