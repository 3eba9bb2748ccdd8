use std::borrow::Cow;

/// The identity of a stored cookie: its (name, domain, path) triple.
///
/// A [`CookieJar`] holds at most one live cookie per `CookieId`; setting a
/// cookie with the same triple replaces the stored record, and a deletion
/// request (a cookie arriving with a past expiry) is addressed by triple.
///
/// The domain half is normalized the same way the jar normalizes stored
/// cookies: lowercased, with a single leading dot stripped. Name and path
/// are opaque and case-sensitive.
///
/// # Example
///
/// ```
/// use barattolo::CookieId;
///
/// let id = CookieId::new("sid", "example.com", "/");
/// assert_eq!(id.name(), "sid");
/// assert_eq!(id.domain(), "example.com");
/// assert_eq!(id.path(), "/");
///
/// // A leading dot and domain case never create a distinct identity.
/// assert_eq!(CookieId::new("sid", ".Example.COM", "/"), id);
/// ```
///
/// [`CookieJar`]: crate::CookieJar
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CookieId<'c> {
    pub(crate) name: Cow<'c, str>,
    pub(crate) domain: Cow<'c, str>,
    pub(crate) path: Cow<'c, str>,
}

impl<'c> CookieId<'c> {
    /// Creates a new [`CookieId`] from a name, a domain, and a path.
    pub fn new<N, D, P>(name: N, domain: D, path: P) -> CookieId<'c>
    where
        N: Into<Cow<'c, str>>,
        D: Into<Cow<'c, str>>,
        P: Into<Cow<'c, str>>,
    {
        CookieId {
            name: name.into(),
            domain: normalize_domain(domain.into()),
            path: path.into(),
        }
    }

    /// Returns the name of the cookie.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Returns the normalized domain of the cookie, never dot-prefixed.
    #[inline]
    pub fn domain(&self) -> &str {
        self.domain.as_ref()
    }

    /// Returns the path of the cookie.
    #[inline]
    pub fn path(&self) -> &str {
        self.path.as_ref()
    }

    /// Converts `self` into a `CookieId` with a `'static` lifetime with as
    /// few allocations as possible.
    pub fn into_owned(self) -> CookieId<'static> {
        let to_owned = |s: Cow<'c, str>| match s {
            Cow::Borrowed(s) => Cow::Owned(s.to_owned()),
            Cow::Owned(s) => Cow::Owned(s),
        };
        CookieId {
            name: to_owned(self.name),
            domain: to_owned(self.domain),
            path: to_owned(self.path),
        }
    }
}

/// Lowercase the domain and strip a single leading dot; cookies are stored
/// dot-free, with the subdomain-matching intent carried separately.
fn normalize_domain(domain: Cow<'_, str>) -> Cow<'_, str> {
    let stripped = domain.strip_prefix('.').unwrap_or(&domain);
    if stripped.len() == domain.len() && !stripped.bytes().any(|b| b.is_ascii_uppercase()) {
        domain
    } else {
        Cow::Owned(stripped.to_ascii_lowercase())
    }
}

impl<'a, N, D, P> From<(N, D, P)> for CookieId<'a>
where
    N: Into<Cow<'a, str>>,
    D: Into<Cow<'a, str>>,
    P: Into<Cow<'a, str>>,
{
    fn from((name, domain, path): (N, D, P)) -> Self {
        CookieId::new(name, domain, path)
    }
}

#[cfg(test)]
mod tests {
    use super::CookieId;
    use std::borrow::Cow;

    #[test]
    fn domain_is_normalized() {
        let id = CookieId::new("a", ".RUST-LANG.org", "/");
        assert_eq!(id.domain(), "rust-lang.org");

        // `..example.com` is not a valid domain; only one dot is stripped.
        let id = CookieId::new("a", "..example.com", "/");
        assert_eq!(id.domain(), ".example.com");
    }

    #[test]
    fn normalization_avoids_allocating_when_clean() {
        let id = CookieId::new("a", "example.com", "/");
        assert!(matches!(id.domain, Cow::Borrowed(_)));
    }

    #[test]
    fn name_and_path_are_case_sensitive() {
        let lower = CookieId::new("sid", "example.com", "/foo");
        assert_ne!(CookieId::new("SID", "example.com", "/foo"), lower);
        assert_ne!(CookieId::new("sid", "example.com", "/FOO"), lower);
        assert_eq!(CookieId::new("sid", "EXAMPLE.com", "/foo"), lower);
    }
}
