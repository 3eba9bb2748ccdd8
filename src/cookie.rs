use crate::{CookieId, Expiration};
use std::fmt;
use time::OffsetDateTime;

/// A cookie held by a [`CookieJar`].
///
/// Stored cookies are never built directly: they enter the jar through
/// [`CookieJar::add`], [`CookieJar::add_header`], or a cookie-file load. The
/// jar hands out shared references through [`CookieJar::matches`],
/// [`CookieJar::iter`], and [`CookieJar::get`].
///
/// `name` and `value` are opaque byte sequences as far as the jar is
/// concerned; `domain` is always stored lowercase and without a leading dot,
/// with the subdomain-matching intent carried by
/// [`domain_specified`](Cookie::domain_specified).
///
/// [`CookieJar`]: crate::CookieJar
/// [`CookieJar::add`]: crate::CookieJar::add
/// [`CookieJar::add_header`]: crate::CookieJar::add_header
/// [`CookieJar::matches`]: crate::CookieJar::matches
/// [`CookieJar::iter`]: crate::CookieJar::iter
/// [`CookieJar::get`]: crate::CookieJar::get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) domain: String,
    pub(crate) domain_specified: bool,
    pub(crate) path: String,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
    pub(crate) expires: Expiration,
}

impl Cookie {
    /// Returns the name of `self`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of `self`.
    ///
    /// Does not strip surrounding quotes. See [`Cookie::value_trimmed()`]
    /// for a version that does.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the value of `self` with a surrounding pair of double-quotes
    /// trimmed away. Quotes are only trimmed when they form a pair, never
    /// otherwise; the trimmed value plays no part in identity or matching.
    #[inline]
    pub fn value_trimmed(&self) -> &str {
        let bytes = self.value.as_bytes();
        if bytes.len() >= 2 && bytes.first() == Some(&b'"') && bytes.last() == Some(&b'"') {
            &self.value[1..self.value.len() - 1]
        } else {
            &self.value
        }
    }

    /// Returns the name and value of `self` as a tuple of `(name, value)`.
    #[inline]
    pub fn name_value(&self) -> (&str, &str) {
        (self.name(), self.value())
    }

    /// Returns the domain of `self`: lowercase, never dot-prefixed.
    #[inline]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns `true` if the cookie carried an explicit `Domain` attribute
    /// when it was set.
    ///
    /// Such cookies are sent to the named domain and every subdomain of it.
    /// Without the attribute the cookie is host-only: it matches its domain
    /// exactly and nothing else.
    #[inline]
    pub fn domain_specified(&self) -> bool {
        self.domain_specified
    }

    /// Returns the path of `self`. Always starts with `/`.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if the cookie is only sent over secure transports.
    #[inline]
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Returns `true` if the cookie was marked `HttpOnly`.
    ///
    /// The jar stores the flag and round-trips it through the cookie file,
    /// but does not itself withhold such cookies from any caller; keeping
    /// them away from non-protocol consumers is the embedding client's job.
    #[inline]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    /// Returns the [`Expiration`] of `self`.
    #[inline]
    pub fn expires(&self) -> Expiration {
        self.expires
    }

    /// Returns `true` if `self` is expired at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires.is_expired_at(now)
    }

    /// Returns the [`CookieId`] identifying `self` in a jar.
    pub fn id(&self) -> CookieId<'_> {
        CookieId::new(self.name.as_str(), self.domain.as_str(), self.path.as_str())
    }

    /// Returns `true` if `self` is applicable to a request for `host`.
    ///
    /// A host-only cookie requires case-insensitive equality. A cookie with
    /// an explicit `Domain` also matches any proper subdomain: `host` may
    /// equal the domain or end with `"." + domain`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::{CookieJar, Origin, SetCookie};
    ///
    /// let mut jar = CookieJar::new();
    /// let origin = Origin::new("example.com", "/", false);
    /// jar.add(SetCookie::new("sid", "1").set_domain(".example.com"), &origin).unwrap();
    ///
    /// let cookie = jar.iter().next().unwrap();
    /// assert!(cookie.domain_matches("example.com"));
    /// assert!(cookie.domain_matches("a.example.com"));
    /// assert!(!cookie.domain_matches("notexample.com"));
    /// ```
    pub fn domain_matches(&self, host: &str) -> bool {
        domain_covers(&self.domain, self.domain_specified, host)
    }

    /// Returns `true` if `self` is applicable to a request for
    /// `request_path`.
    ///
    /// The request path must equal the cookie path, or extend it at a `/`
    /// boundary: `/foo` covers `/foo` and `/foo/bar` but not `/foobar`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::{CookieJar, Origin, SetCookie};
    ///
    /// let mut jar = CookieJar::new();
    /// let origin = Origin::new("example.com", "/", false);
    /// jar.add(SetCookie::new("sid", "1").set_path("/foo"), &origin).unwrap();
    ///
    /// let cookie = jar.iter().next().unwrap();
    /// assert!(cookie.path_matches("/foo"));
    /// assert!(cookie.path_matches("/foo/bar"));
    /// assert!(!cookie.path_matches("/foobar"));
    /// ```
    pub fn path_matches(&self, request_path: &str) -> bool {
        path_covers(&self.path, request_path)
    }

    /// Returns `true` if `self` should be sent on a request described by
    /// the arguments: domain and path match, the secure filter passes, and
    /// the cookie is not expired at `now`.
    pub fn matches(&self, host: &str, request_path: &str, is_secure: bool, now: OffsetDateTime) -> bool {
        if self.secure && !is_secure {
            return false;
        }
        if self.is_expired_at(now) {
            return false;
        }
        self.domain_matches(host) && self.path_matches(request_path)
    }
}

impl fmt::Display for Cookie {
    /// Formats the cookie as a `name=value` pair, the form it takes inside
    /// a request `Cookie` header.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// `host` is covered by `domain`: equal, or (when subdomain matching was
/// requested) ending in `"." + domain`. Host comparison is ASCII
/// case-insensitive; stored domains are already lowercase.
pub(crate) fn domain_covers(domain: &str, subdomains: bool, host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    if !subdomains {
        return false;
    }
    let (host_len, domain_len) = (host.len(), domain.len());
    host_len > domain_len
        && host.as_bytes()[host_len - domain_len - 1] == b'.'
        && host[host_len - domain_len..].eq_ignore_ascii_case(domain)
}

/// `request_path` is inside the subtree rooted at `cookie_path`.
pub(crate) fn path_covers(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => cookie_path.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
