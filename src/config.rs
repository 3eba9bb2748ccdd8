//! Configuration for a [`CookieJar`].
//!
//! Check out the [`JarConfig`] struct for more information.
//!
//! [`CookieJar`]: crate::CookieJar

/// `JarConfig` specifies the policies a [`CookieJar`] applies when cookies
/// are stored: how strictly `Domain` attributes are vetted, how many cookies
/// may be retained, and whether session cookies survive persistence.
///
/// # Example
///
/// ```rust
/// use barattolo::CookieJar;
/// use barattolo::config::{DomainPolicy, JarConfig};
///
/// let mut config = JarConfig::default();
/// config.domain_policy = DomainPolicy::Permissive;
/// config.max_cookies_per_domain = 10;
/// let jar = CookieJar::with_config(config);
/// ```
///
/// [`CookieJar`]: crate::CookieJar
#[derive(Debug, Clone)]
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct JarConfig {
    /// How `Domain` attributes are vetted on insert.
    ///
    /// By default, this field is [`DomainPolicy::PublicSuffixAware`].
    pub domain_policy: DomainPolicy,
    /// The maximum number of live cookies retained per cookie domain.
    ///
    /// When an insert pushes a domain over this limit, the oldest cookies
    /// for that domain are evicted first. The cookie being inserted is never
    /// evicted, so a limit of `0` behaves as `1`.
    ///
    /// By default `50`, the per-domain minimum capability from RFC 6265,
    /// section 6.1.
    pub max_cookies_per_domain: usize,
    /// The maximum number of live cookies retained jar-wide.
    ///
    /// Enforced after the per-domain limit, again oldest-first and never
    /// evicting the cookie being inserted.
    ///
    /// By default `3000`, the jar-wide minimum capability from RFC 6265,
    /// section 6.1.
    pub max_cookies_total: usize,
    /// If `true`, session cookies (no expiry) are written out when the jar
    /// is saved to a cookie file, recorded with the `0` expiry sentinel.
    ///
    /// If `false`, session cookies live only as long as the in-memory jar.
    ///
    /// By default, this field is `false`.
    pub persist_session_cookies: bool,
}

/// How a [`CookieJar`] vets the `Domain` attribute of an incoming cookie.
///
/// Every policy enforces the baseline RFC 6265 rule: an explicit `Domain`
/// must domain-match the host that set the cookie. The policy controls the
/// *additional* restriction against registering cookies for an entire
/// top-level domain.
///
/// [`CookieJar`]: crate::CookieJar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub enum DomainPolicy {
    /// Only the baseline domain-match check is applied.
    #[cfg_attr(feature = "serde", serde(alias = "permissive"))]
    Permissive,
    /// A `Domain` attribute without an embedded dot (other than
    /// `localhost`) is refused, so a cookie can never cover a bare
    /// top-level domain such as `com`.
    ///
    /// This is the heuristic widely deployed cookie engines fall back to
    /// when built without a public-suffix list; embedders that need full
    /// effective-TLD accuracy can pre-filter with a PSL lookup before
    /// calling into the jar.
    #[cfg_attr(feature = "serde", serde(alias = "public-suffix-aware"))]
    PublicSuffixAware,
}

impl Default for JarConfig {
    fn default() -> Self {
        JarConfig {
            domain_policy: DomainPolicy::PublicSuffixAware,
            max_cookies_per_domain: 50,
            max_cookies_total: 3000,
            persist_session_cookies: false,
        }
    }
}
