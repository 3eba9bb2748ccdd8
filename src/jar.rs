use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::ops::Bound;

use log::{debug, trace};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::cookie::{domain_covers, path_covers};
use crate::set_cookie::{default_path, sanitize_path_attribute, ParseError};
use crate::{Cookie, CookieId, DomainPolicy, Expiration, JarConfig, Origin, SetCookie};

/// Name plus value of a single cookie may not exceed this many bytes.
const MAX_NAME_VALUE: usize = 4096;

/// A stable reference to a cookie held by a [`CookieJar`].
///
/// Handles are creation-ordered: a cookie stored later compares greater
/// than every cookie stored before it, and replacing a cookie assigns a
/// fresh handle. A handle stays valid across unrelated mutations; once its
/// cookie is removed or replaced it simply resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CookieHandle(u64);

/// What [`CookieJar::add`] did with the cookie it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new cookie was stored.
    Inserted(CookieHandle),
    /// An existing cookie with the same (name, domain, path) identity was
    /// overwritten. The handle is fresh; the replaced cookie's handle is
    /// dead.
    Replaced(CookieHandle),
    /// The cookie arrived already expired and deleted its stored namesake.
    Removed,
    /// The cookie arrived already expired and there was nothing to delete.
    Expired,
}

impl AddOutcome {
    /// Returns the handle of the stored cookie, if one was stored.
    pub fn handle(&self) -> Option<CookieHandle> {
        match self {
            AddOutcome::Inserted(handle) | AddOutcome::Replaced(handle) => Some(*handle),
            AddOutcome::Removed | AddOutcome::Expired => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`CookieJar::add`] and its variants when a cookie
/// is refused.
///
/// A refusal never modifies the jar.
pub enum AddError {
    #[error("Failed to parse the `Set-Cookie`-style line")]
    Malformed(#[source] ParseError),
    #[error("The cookie name is empty")]
    EmptyName,
    #[error("The cookie name `{name}` contains a control byte or a separator")]
    InvalidName { name: String },
    #[error("The value of cookie `{name}` contains a control byte")]
    InvalidValue { name: String },
    #[error("Cookie `{name}` carries {size} bytes of name plus value, above the 4096 byte limit")]
    Oversized { name: String, size: usize },
    #[error("The `Domain` attribute `{domain}` does not cover the origin host `{host}`")]
    DomainMismatch { domain: String, host: String },
    #[error("Refusing `{domain}` as a cookie domain: it has no usable dot and is not `localhost`")]
    DotlessDomain { domain: String },
    #[error("The origin host is empty")]
    EmptyHost,
    #[error("The request origin `{host}{path}` contains a control byte")]
    InvalidOrigin { host: String, path: String },
    #[error("Cookie `{name}` does not satisfy the requirements of its name prefix")]
    InvalidPrefix { name: String },
    #[error("A non-secure origin may not overwrite or shadow the secure cookie `{name}`")]
    SecureOverwrite { name: String },
}

/// A store of cookies for an HTTP client session.
///
/// The jar holds at most one cookie per (name, domain, path) identity,
/// decides which stored cookies apply to a request
/// ([`matches`](CookieJar::matches)), admits new ones with the usual
/// protections against cross-domain injection and secure-cookie
/// clobbering ([`add`](CookieJar::add)), expires and evicts, and can be
/// saved to and loaded from a cookie file (see
/// [`save`](CookieJar::save)/[`load`](CookieJar::load)).
///
/// It performs no I/O and holds no locks of its own; wrap it in a
/// [`SharedJar`](crate::SharedJar) to share one jar across threads.
///
/// # Example
///
/// ```rust
/// use barattolo::{CookieJar, Origin};
///
/// let mut jar = CookieJar::new();
/// let origin = Origin::new("www.example.com", "/login", true);
/// jar.add_header("sid=31d4d96e; Path=/account; Secure; HttpOnly", &origin).unwrap();
/// jar.add_header("lang=en-US; Domain=example.com", &origin).unwrap();
///
/// // Longest path first, then most recently stored first.
/// let cookies = jar.matches("www.example.com", "/account/settings", true);
/// let header = cookies
///     .iter()
///     .map(|cookie| cookie.to_string())
///     .collect::<Vec<_>>()
///     .join("; ");
/// assert_eq!(header, "sid=31d4d96e; lang=en-US");
///
/// // The `lang` cookie covers sibling hosts, the host-only `sid` does not.
/// let cookies = jar.matches("static.example.com", "/", false);
/// assert_eq!(cookies.len(), 1);
/// assert_eq!(cookies[0].name(), "lang");
/// ```
#[derive(Debug, Clone)]
pub struct CookieJar {
    config: JarConfig,
    /// Keyed by creation order; iteration order is enumeration order.
    cookies: BTreeMap<CookieHandle, Cookie>,
    /// One live record per identity. Always points at a key of `cookies`.
    index: HashMap<CookieId<'static>, CookieHandle>,
    next_id: u64,
}

impl CookieJar {
    /// Creates an empty jar with the default [`JarConfig`].
    pub fn new() -> CookieJar {
        CookieJar::with_config(JarConfig::default())
    }

    /// Creates an empty jar with the given configuration.
    pub fn with_config(config: JarConfig) -> CookieJar {
        CookieJar {
            config,
            cookies: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 0,
        }
    }

    /// Returns the configuration of `self`.
    pub fn config(&self) -> &JarConfig {
        &self.config
    }

    /// Adds a cookie set by `origin`, using the current time for every
    /// expiry decision.
    ///
    /// The origin fills in whatever the cookie leaves out: no `Domain`
    /// attribute makes a host-only cookie for `origin.host()`, no usable
    /// `Path` attribute yields the directory portion of `origin.path()`.
    /// `Max-Age` wins over `Expires`; with neither, the cookie lives for
    /// the session.
    ///
    /// A cookie that arrives already expired is a deletion request for its
    /// (name, domain, path) identity, the idiom servers use to unset a
    /// cookie.
    ///
    /// # Refusals
    ///
    /// A cookie is refused (see [`AddError`]) when it tries to reach
    /// outside its origin (`Domain` not covering the host, dot-less
    /// domains under [`DomainPolicy::PublicSuffixAware`], any `Domain`
    /// other than the address itself on an IP origin), when a `__Secure-`
    /// or `__Host-` name prefix is not backed by the attributes it
    /// promises, when a non-secure origin would overwrite or shadow a
    /// live secure cookie, when name or value are oversized or carry
    /// bytes that no cookie can hold, or when the origin's host or path
    /// carry such bytes themselves. A refusal leaves the jar untouched.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::errors::AddError;
    /// use barattolo::{AddOutcome, CookieJar, Origin, SetCookie};
    ///
    /// let mut jar = CookieJar::new();
    /// let origin = Origin::new("www.example.com", "/", false);
    ///
    /// let outcome = jar.add(SetCookie::new("sid", "1"), &origin).unwrap();
    /// assert!(matches!(outcome, AddOutcome::Inserted(_)));
    ///
    /// // Same identity: overwritten, not duplicated.
    /// let outcome = jar.add(SetCookie::new("sid", "2"), &origin).unwrap();
    /// assert!(matches!(outcome, AddOutcome::Replaced(_)));
    /// assert_eq!(jar.len(), 1);
    ///
    /// // A different origin cannot plant cookies here.
    /// let elsewhere = Origin::new("attacker.test", "/", false);
    /// let error = jar
    ///     .add(SetCookie::new("sid", "3").set_domain("example.com"), &elsewhere)
    ///     .unwrap_err();
    /// assert!(matches!(error, AddError::DomainMismatch { .. }));
    /// ```
    pub fn add<'c, C>(&mut self, cookie: C, origin: &Origin<'_>) -> Result<AddOutcome, AddError>
    where
        C: Into<SetCookie<'c>>,
    {
        self.add_at(cookie, origin, OffsetDateTime::now_utc())
    }

    /// Adds a cookie as [`add`](CookieJar::add) does, evaluating `Max-Age`
    /// arithmetic and expiry against the provided `now` instead of the
    /// wall clock.
    pub fn add_at<'c, C>(
        &mut self,
        cookie: C,
        origin: &Origin<'_>,
        now: OffsetDateTime,
    ) -> Result<AddOutcome, AddError>
    where
        C: Into<SetCookie<'c>>,
    {
        let result = self.add_inner(cookie.into(), origin, now, true);
        if let Err(e) = &result {
            debug!("cookie refused: {e}");
        }
        result
    }

    /// Adds a cookie as [`add`](CookieJar::add) does, controlling whether
    /// the jar opportunistically drops expired records first.
    ///
    /// Skipping the sweep only skips physical cleanup: expired cookies are
    /// invisible to every accessor either way, so no caller can observe
    /// the difference short of memory use.
    pub fn add_with_sweep<'c, C>(
        &mut self,
        cookie: C,
        origin: &Origin<'_>,
        sweep: bool,
    ) -> Result<AddOutcome, AddError>
    where
        C: Into<SetCookie<'c>>,
    {
        let result = self.add_inner(cookie.into(), origin, OffsetDateTime::now_utc(), sweep);
        if let Err(e) = &result {
            debug!("cookie refused: {e}");
        }
        result
    }

    /// Parses a raw `Set-Cookie`-style line and adds it.
    ///
    /// This is the entry point for header-shaped input; everything after
    /// parsing behaves exactly like [`add`](CookieJar::add).
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::{CookieJar, Origin};
    ///
    /// let mut jar = CookieJar::new();
    /// let origin = Origin::new("example.com", "/", false);
    /// jar.add_header("theme=dark; Max-Age=86400; Path=/", &origin).unwrap();
    /// assert_eq!(jar.len(), 1);
    /// ```
    pub fn add_header(&mut self, header: &str, origin: &Origin<'_>) -> Result<AddOutcome, AddError> {
        let cookie = match SetCookie::parse(header) {
            Ok(cookie) => cookie,
            Err(e) => {
                let e = AddError::Malformed(e);
                debug!("cookie refused: {e}");
                return Err(e);
            }
        };
        self.add(cookie, origin)
    }

    fn add_inner(
        &mut self,
        cookie: SetCookie<'_>,
        origin: &Origin<'_>,
        now: OffsetDateTime,
        sweep: bool,
    ) -> Result<AddOutcome, AddError> {
        if sweep {
            self.purge_expired(now);
        }

        if cookie.name().is_empty() {
            return Err(AddError::EmptyName);
        }
        if !valid_name(cookie.name()) {
            return Err(AddError::InvalidName {
                name: cookie.name().to_owned(),
            });
        }
        if !valid_value(cookie.value()) {
            return Err(AddError::InvalidValue {
                name: cookie.name().to_owned(),
            });
        }
        let size = cookie.name().len() + cookie.value().len();
        if size > MAX_NAME_VALUE {
            return Err(AddError::Oversized {
                name: cookie.name().to_owned(),
                size,
            });
        }

        let host = origin.host();
        if host.is_empty() {
            return Err(AddError::EmptyHost);
        }
        // Stored domains and paths stay free of control bytes; both default
        // from the origin.
        if !valid_value(host) || !valid_value(origin.path()) {
            return Err(AddError::InvalidOrigin {
                host: host.to_owned(),
                path: origin.path().to_owned(),
            });
        }
        let domain_attribute = cookie.domain().filter(|d| !d.is_empty());
        let (domain, domain_specified) = match domain_attribute {
            Some(attribute) => {
                if host.parse::<IpAddr>().is_ok() {
                    // An IP origin may only name itself, and the result is
                    // host-only: there are no subdomains of an address.
                    if !attribute.eq_ignore_ascii_case(host) {
                        return Err(AddError::DomainMismatch {
                            domain: attribute.to_owned(),
                            host: host.to_owned(),
                        });
                    }
                    (host.to_ascii_lowercase(), false)
                } else {
                    if self.config.domain_policy == DomainPolicy::PublicSuffixAware
                        && dotless_domain(attribute)
                    {
                        return Err(AddError::DotlessDomain {
                            domain: attribute.to_owned(),
                        });
                    }
                    if !domain_covers(attribute, true, host) {
                        return Err(AddError::DomainMismatch {
                            domain: attribute.to_owned(),
                            host: host.to_owned(),
                        });
                    }
                    (attribute.to_ascii_lowercase(), true)
                }
            }
            None => (host.to_ascii_lowercase(), false),
        };

        let path_attribute = cookie.path().and_then(sanitize_path_attribute);
        let path = match path_attribute {
            Some(attribute) => attribute.to_owned(),
            None => default_path(origin.path()).to_owned(),
        };

        if name_prefixed(cookie.name(), "__Secure-") {
            if cookie.secure() != Some(true) {
                return Err(AddError::InvalidPrefix {
                    name: cookie.name().to_owned(),
                });
            }
        } else if name_prefixed(cookie.name(), "__Host-") {
            // The root path must be spelled out; a default path that happens
            // to be `/` does not qualify.
            if cookie.secure() != Some(true)
                || domain_attribute.is_some()
                || path_attribute != Some("/")
            {
                return Err(AddError::InvalidPrefix {
                    name: cookie.name().to_owned(),
                });
            }
        }

        let expires = match cookie.max_age() {
            Some(max_age) if max_age <= Duration::ZERO => {
                Expiration::DateTime(OffsetDateTime::UNIX_EPOCH)
            }
            Some(max_age) => Expiration::DateTime(
                now.checked_add(max_age)
                    .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc()),
            ),
            None => cookie.expires().unwrap_or(Expiration::Session),
        };

        // Leave secure cookies alone: a non-secure origin may not touch a
        // live secure cookie with the same name and domain on an
        // overlapping path, whether by overwrite, shadowing, or
        // expiry-deletion. An expired record no longer stands guard.
        if !origin.is_secure() {
            let shadowed = self.cookies.values().any(|existing| {
                existing.secure
                    && !existing.is_expired_at(now)
                    && existing.name == cookie.name()
                    && existing.domain == domain
                    && paths_overlap(&existing.path, &path)
            });
            if shadowed {
                return Err(AddError::SecureOverwrite {
                    name: cookie.name().to_owned(),
                });
            }
        }

        if expires.is_expired_at(now) {
            let id = CookieId::new(cookie.name().to_owned(), domain, path);
            return Ok(match self.take_cookie(&id) {
                Some(old) if !old.is_expired_at(now) => {
                    trace!(
                        "deleted cookie `{}` for domain `{}` via a past expiry date",
                        id.name(),
                        id.domain()
                    );
                    AddOutcome::Removed
                }
                _ => AddOutcome::Expired,
            });
        }

        let record = Cookie {
            name: cookie.name().to_owned(),
            value: cookie.value.into_owned(),
            domain,
            domain_specified,
            path,
            secure: cookie.secure.unwrap_or(false),
            http_only: cookie.http_only.unwrap_or(false),
            expires,
        };
        trace!(
            "storing cookie `{}` for domain `{}` path `{}`",
            record.name,
            record.domain,
            record.path
        );
        let (handle, replaced) = self.insert_record(record);
        let outcome = match replaced {
            Some(old) if !old.is_expired_at(now) => AddOutcome::Replaced(handle),
            _ => AddOutcome::Inserted(handle),
        };
        self.enforce_limits(handle);
        Ok(outcome)
    }

    /// Returns the cookies to send on a request, best match first.
    ///
    /// A cookie applies when its domain covers `host`, its path covers
    /// `request_path`, and it is not expired; secure cookies additionally
    /// require `is_secure`. The result is ordered the way a `Cookie`
    /// header is assembled: longest path first, most recently stored first
    /// among equals.
    ///
    /// An empty `host` or `request_path` matches nothing.
    pub fn matches(&self, host: &str, request_path: &str, is_secure: bool) -> Vec<&Cookie> {
        self.matches_at(host, request_path, is_secure, OffsetDateTime::now_utc())
    }

    /// [`matches`](CookieJar::matches) with expiry evaluated against the
    /// provided `now`.
    pub fn matches_at(
        &self,
        host: &str,
        request_path: &str,
        is_secure: bool,
        now: OffsetDateTime,
    ) -> Vec<&Cookie> {
        let mut hits: Vec<(CookieHandle, &Cookie)> = self
            .cookies
            .iter()
            .filter(|(_, cookie)| cookie.matches(host, request_path, is_secure, now))
            .map(|(handle, cookie)| (*handle, cookie))
            .collect();
        hits.sort_by(|(handle_a, a), (handle_b, b)| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| handle_b.cmp(handle_a))
        });
        hits.into_iter().map(|(_, cookie)| cookie).collect()
    }

    /// Iterates over the live cookies in creation order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> + '_ {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .values()
            .filter(move |cookie| !cookie.is_expired_at(now))
    }

    /// Returns the handle of the oldest live cookie.
    ///
    /// Together with [`next`](CookieJar::next) this supports a cursor-style
    /// walk over the jar in creation order:
    ///
    /// ```rust
    /// use barattolo::{CookieJar, Origin, SetCookie};
    ///
    /// let mut jar = CookieJar::new();
    /// let origin = Origin::new("example.com", "/", false);
    /// jar.add(SetCookie::new("first", "1"), &origin).unwrap();
    /// jar.add(SetCookie::new("second", "2"), &origin).unwrap();
    ///
    /// let mut names = Vec::new();
    /// let mut cursor = jar.first();
    /// while let Some(handle) = cursor {
    ///     names.push(jar.name(handle).unwrap().to_owned());
    ///     cursor = jar.next(handle);
    /// }
    /// assert_eq!(names, ["first", "second"]);
    /// ```
    pub fn first(&self) -> Option<CookieHandle> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .iter()
            .find(|(_, cookie)| !cookie.is_expired_at(now))
            .map(|(handle, _)| *handle)
    }

    /// Returns the handle of the next live cookie after `handle` in
    /// creation order.
    ///
    /// `handle` itself does not need to be live: the walk continues past
    /// removed and replaced cookies without skipping survivors.
    pub fn next(&self, handle: CookieHandle) -> Option<CookieHandle> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .range((Bound::Excluded(handle), Bound::Unbounded))
            .find(|(_, cookie)| !cookie.is_expired_at(now))
            .map(|(handle, _)| *handle)
    }

    /// Returns the cookie behind `handle`, if it is still live.
    pub fn get(&self, handle: CookieHandle) -> Option<&Cookie> {
        let cookie = self.cookies.get(&handle)?;
        if cookie.is_expired_at(OffsetDateTime::now_utc()) {
            None
        } else {
            Some(cookie)
        }
    }

    /// Returns the name of the cookie behind `handle`.
    pub fn name(&self, handle: CookieHandle) -> Option<&str> {
        self.get(handle).map(Cookie::name)
    }

    /// Returns the value of the cookie behind `handle`.
    pub fn value(&self, handle: CookieHandle) -> Option<&str> {
        self.get(handle).map(Cookie::value)
    }

    /// Returns the domain of the cookie behind `handle`.
    pub fn domain(&self, handle: CookieHandle) -> Option<&str> {
        self.get(handle).map(Cookie::domain)
    }

    /// Returns the path of the cookie behind `handle`.
    pub fn path(&self, handle: CookieHandle) -> Option<&str> {
        self.get(handle).map(Cookie::path)
    }

    /// Returns whether the cookie behind `handle` is secure.
    pub fn secure(&self, handle: CookieHandle) -> Option<bool> {
        self.get(handle).map(Cookie::secure)
    }

    /// Returns the expiration of the cookie behind `handle`.
    pub fn expires(&self, handle: CookieHandle) -> Option<Expiration> {
        self.get(handle).map(Cookie::expires)
    }

    /// Returns the number of live cookies.
    pub fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .values()
            .filter(|cookie| !cookie.is_expired_at(now))
            .count()
    }

    /// Returns `true` if the jar holds no live cookie.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the cookie with the given identity, returning it if a live
    /// one was stored.
    pub fn remove(&mut self, id: &CookieId<'_>) -> Option<Cookie> {
        let removed = self.take_cookie(id)?;
        if removed.is_expired_at(OffsetDateTime::now_utc()) {
            return None;
        }
        trace!(
            "removed cookie `{}` for domain `{}`",
            removed.name,
            removed.domain
        );
        Some(removed)
    }

    /// Drops every record whose expiry is at or before `now`. Idempotent;
    /// purely physical cleanup, since expired cookies are invisible from
    /// the moment they expire.
    ///
    /// Returns the number of records dropped.
    pub fn purge_expired(&mut self, now: OffsetDateTime) -> usize {
        let purged = self.drop_records(|cookie| cookie.is_expired_at(now));
        if purged > 0 {
            trace!("purged {purged} expired cookies");
        }
        purged
    }

    /// Drops every session cookie, keeping the ones with an expiry date.
    pub fn clear_session(&mut self) {
        self.drop_records(|cookie| cookie.expires.is_session());
    }

    /// Drops every cookie.
    ///
    /// Handles stay monotonic across a clear, so a stale handle can never
    /// alias a cookie stored later.
    pub fn clear(&mut self) {
        self.cookies.clear();
        self.index.clear();
    }

    /// Stores a fully resolved record, replacing its identity's previous
    /// holder. Returns the fresh handle and the replaced record.
    pub(crate) fn insert_record(&mut self, record: Cookie) -> (CookieHandle, Option<Cookie>) {
        let id = record.id().into_owned();
        let handle = CookieHandle(self.next_id);
        self.next_id += 1;
        let replaced = self
            .index
            .insert(id, handle)
            .and_then(|old| self.cookies.remove(&old));
        self.cookies.insert(handle, record);
        (handle, replaced)
    }

    /// Every physical record in creation order. The cookie-file writer
    /// applies its own expiry and session filtering on top.
    pub(crate) fn records(&self) -> impl Iterator<Item = &Cookie> + '_ {
        self.cookies.values()
    }

    /// Admission for records read from a cookie file: a cookie already in
    /// the jar wins over a loaded one with the same identity.
    pub(crate) fn insert_loaded(&mut self, record: Cookie) -> Option<CookieHandle> {
        let id = record.id().into_owned();
        if self.index.contains_key(&id) {
            trace!(
                "skipping loaded cookie `{}`: the jar already holds one",
                record.name
            );
            return None;
        }
        let (handle, _) = self.insert_record(record);
        self.enforce_limits(handle);
        Some(handle)
    }

    /// Merges every record of `other` into `self` in `other`'s creation
    /// order, an existing cookie winning over an incoming one. Returns the
    /// number of records absorbed.
    pub(crate) fn absorb(&mut self, other: CookieJar) -> usize {
        let mut added = 0;
        for (_, record) in other.cookies {
            if self.insert_loaded(record).is_some() {
                added += 1;
            }
        }
        added
    }

    fn take_cookie(&mut self, id: &CookieId<'_>) -> Option<Cookie> {
        let owned = id.clone().into_owned();
        let handle = self.index.remove(&owned)?;
        self.cookies.remove(&handle)
    }

    fn drop_records(&mut self, mut doomed: impl FnMut(&Cookie) -> bool) -> usize {
        let handles: Vec<CookieHandle> = self
            .cookies
            .iter()
            .filter(|(_, cookie)| doomed(cookie))
            .map(|(handle, _)| *handle)
            .collect();
        let dropped = handles.len();
        for handle in handles {
            if let Some(cookie) = self.cookies.remove(&handle) {
                self.index.remove(&cookie.id().into_owned());
            }
        }
        dropped
    }

    /// Evicts, oldest first, until the capacity limits hold again: first
    /// within the domain of the record behind `newest`, then jar-wide. The
    /// newest record itself is never evicted, so a limit of zero behaves
    /// like a limit of one.
    fn enforce_limits(&mut self, newest: CookieHandle) {
        let domain = match self.cookies.get(&newest) {
            Some(cookie) => cookie.domain.clone(),
            None => return,
        };
        let per_domain = self.config.max_cookies_per_domain.max(1);
        let total = self.config.max_cookies_total.max(1);

        while self
            .cookies
            .values()
            .filter(|cookie| cookie.domain == domain)
            .count()
            > per_domain
        {
            let victim = self
                .cookies
                .iter()
                .filter(|(handle, cookie)| **handle != newest && cookie.domain == domain)
                .map(|(handle, _)| *handle)
                .next();
            match victim {
                Some(handle) => self.evict(handle),
                None => break,
            }
        }
        while self.cookies.len() > total {
            let victim = self.cookies.keys().copied().find(|handle| *handle != newest);
            match victim {
                Some(handle) => self.evict(handle),
                None => break,
            }
        }
    }

    fn evict(&mut self, handle: CookieHandle) {
        if let Some(cookie) = self.cookies.remove(&handle) {
            debug!(
                "evicted cookie `{}` for domain `{}`",
                cookie.name, cookie.domain
            );
            self.index.remove(&cookie.id().into_owned());
        }
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        CookieJar::new()
    }
}

/// Cookie names may not contain control bytes or the RFC 2616 separators.
fn valid_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    name.bytes()
        .all(|b| !b.is_ascii_control() && !SEPARATORS.contains(&b))
}

/// Values may hold anything but control bytes, which no header or cookie
/// file could carry anyway.
fn valid_value(value: &str) -> bool {
    value.bytes().all(|b| !b.is_ascii_control())
}

fn name_prefixed(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len() && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// The tail-match heuristic applied when no public-suffix list is wired
/// in: a `Domain` attribute needs a non-trailing dot, with `localhost` as
/// the single exception.
fn dotless_domain(domain: &str) -> bool {
    if domain.eq_ignore_ascii_case("localhost") {
        return false;
    }
    match domain.find('.') {
        Some(position) => position + 1 >= domain.len(),
        None => true,
    }
}

fn paths_overlap(a: &str, b: &str) -> bool {
    path_covers(a, b) || path_covers(b, a)
}

#[cfg(test)]
mod tests {
    use super::{AddError, AddOutcome, CookieJar};
    use crate::{Cookie, CookieId, DomainPolicy, Expiration, JarConfig, Origin, SetCookie};
    use time::macros::datetime;
    use time::Duration;

    const PAST: time::OffsetDateTime = datetime!(2015-10-21 07:28:00 UTC);
    const FUTURE: time::OffsetDateTime = datetime!(9999-01-01 00:00:00 UTC);

    fn origin() -> Origin<'static> {
        Origin::new("www.example.com", "/", false)
    }

    fn record(name: &str, domain: &str, path: &str, expires: Expiration) -> Cookie {
        Cookie {
            name: name.into(),
            value: "v".into(),
            domain: domain.into(),
            domain_specified: false,
            path: path.into(),
            secure: false,
            http_only: false,
            expires,
        }
    }

    #[test]
    fn insert_then_match() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("sid", "abc"), &origin()).unwrap();

        let hits = jar.matches("www.example.com", "/", false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name_value(), ("sid", "abc"));

        assert!(jar.matches("other.example.com", "/", false).is_empty());
        assert!(jar.matches("", "/", false).is_empty());
        assert!(jar.matches("www.example.com", "", false).is_empty());
    }

    #[test]
    fn reinserting_the_same_identity_replaces() {
        let mut jar = CookieJar::new();
        let first = jar
            .add(SetCookie::new("sid", "old"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        let outcome = jar.add(SetCookie::new("sid", "new"), &origin()).unwrap();

        let second = match outcome {
            AddOutcome::Replaced(handle) => handle,
            other => panic!("expected a replacement, got {other:?}"),
        };
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.value(second), Some("new"));
        // The replaced cookie's handle is dead, and the replacement moved
        // to the back of the creation order.
        assert_eq!(jar.get(first), None);
        assert!(second > first);
        assert_eq!(jar.first(), Some(second));
    }

    #[test]
    fn secure_cookies_stay_out_of_insecure_requests() {
        let mut jar = CookieJar::new();
        let https = Origin::new("www.example.com", "/", true);
        jar.add(SetCookie::new("sid", "1").set_secure(true), &https)
            .unwrap();

        assert!(jar.matches("www.example.com", "/", false).is_empty());
        assert_eq!(jar.matches("www.example.com", "/", true).len(), 1);
    }

    #[test]
    fn past_expiry_insert_is_a_deletion() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("sid", "abc"), &origin()).unwrap();
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.matches("www.example.com", "/", false).len(), 1);

        let deletion = SetCookie::new("sid", "ignored").set_expires(PAST);
        let outcome = jar.add(deletion.clone(), &origin()).unwrap();
        assert_eq!(outcome, AddOutcome::Removed);
        assert_eq!(jar.len(), 0);
        assert!(jar.matches("www.example.com", "/", false).is_empty());

        // Nothing left to delete the second time around.
        let outcome = jar.add(deletion, &origin()).unwrap();
        assert_eq!(outcome, AddOutcome::Expired);
    }

    #[test]
    fn negative_max_age_is_a_deletion_too() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("sid", "abc"), &origin()).unwrap();
        let outcome = jar
            .add(
                SetCookie::new("sid", "").set_max_age(Duration::seconds(-5)),
                &origin(),
            )
            .unwrap();
        assert_eq!(outcome, AddOutcome::Removed);
        assert!(jar.is_empty());
    }

    #[test]
    fn max_age_wins_over_expires() {
        let mut jar = CookieJar::new();
        let now = datetime!(2024-06-01 12:00:00 UTC);
        let cookie = SetCookie::new("sid", "1")
            .set_expires(PAST)
            .set_max_age(Duration::seconds(60));
        let handle = jar
            .add_at(cookie, &origin(), now)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(
            jar.expires(handle),
            Some(Expiration::DateTime(datetime!(2024-06-01 12:01:00 UTC)))
        );
    }

    #[test]
    fn domain_cookie_reaches_subdomains() {
        let mut jar = CookieJar::new();
        jar.add(
            SetCookie::new("lang", "en").set_domain(".example.com"),
            &origin(),
        )
        .unwrap();

        for host in ["example.com", "a.example.com", "deep.a.example.com"] {
            assert_eq!(jar.matches(host, "/", false).len(), 1, "host {host}");
        }
        assert!(jar.matches("notexample.com", "/", false).is_empty());
    }

    #[test]
    fn host_only_is_the_default() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("sid", "1"), &origin()).unwrap();

        assert_eq!(jar.matches("www.example.com", "/", false).len(), 1);
        assert!(jar.matches("sub.www.example.com", "/", false).is_empty());
        assert!(jar.matches("example.com", "/", false).is_empty());
    }

    #[test]
    fn path_scoping() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("c", "1").set_path("/foo"), &origin())
            .unwrap();

        assert_eq!(jar.matches("www.example.com", "/foo", false).len(), 1);
        assert_eq!(jar.matches("www.example.com", "/foo/bar", false).len(), 1);
        assert!(jar.matches("www.example.com", "/foobar", false).is_empty());
        assert!(jar.matches("www.example.com", "/", false).is_empty());
    }

    #[test]
    fn missing_path_defaults_to_the_origin_directory() {
        let mut jar = CookieJar::new();
        let deep = Origin::new("www.example.com", "/a/b/c", false);
        let handle = jar
            .add(SetCookie::new("sid", "1"), &deep)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.path(handle), Some("/a/b"));

        let root = Origin::new("www.example.com", "/index.html", false);
        let handle = jar
            .add(SetCookie::new("other", "2"), &root)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.path(handle), Some("/"));
    }

    #[test]
    fn relative_path_attribute_falls_back_to_default() {
        let mut jar = CookieJar::new();
        let deep = Origin::new("www.example.com", "/a/b", false);
        let handle = jar
            .add(SetCookie::new("sid", "1").set_path("nope"), &deep)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.path(handle), Some("/a"));
    }

    #[test]
    fn control_bytes_in_a_path_attribute_fall_back_to_default() {
        let mut jar = CookieJar::new();
        let deep = Origin::new("www.example.com", "/shop/cart", false);
        let handle = jar
            .add_header("sid=1; Path=/a\tb", &deep)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.path(handle), Some("/shop"));

        let handle = jar
            .add(SetCookie::new("other", "2").set_path("/a\nb"), &deep)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.path(handle), Some("/shop"));
    }

    #[test]
    fn an_origin_with_control_bytes_is_refused() {
        let mut jar = CookieJar::new();

        let bad_host = Origin::new("www.exa\tmple.com", "/", false);
        let e = jar.add(SetCookie::new("sid", "1"), &bad_host).unwrap_err();
        assert!(matches!(e, AddError::InvalidOrigin { .. }));

        let bad_path = Origin::new("www.example.com", "/a\tb/c", false);
        let e = jar.add(SetCookie::new("sid", "1"), &bad_path).unwrap_err();
        assert!(matches!(e, AddError::InvalidOrigin { .. }));
        assert!(jar.is_empty());
    }

    #[test]
    fn match_order_is_path_length_then_recency() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("root", "1").set_path("/"), &origin())
            .unwrap();
        jar.add(SetCookie::new("docs", "2").set_path("/docs"), &origin())
            .unwrap();
        jar.add(SetCookie::new("web", "3").set_path("/docs/web"), &origin())
            .unwrap();
        jar.add(SetCookie::new("late", "4").set_path("/"), &origin())
            .unwrap();

        let names: Vec<&str> = jar
            .matches("www.example.com", "/docs/web/index.html", false)
            .into_iter()
            .map(Cookie::name)
            .collect();
        // Among the two root-path cookies, the most recently stored comes
        // first.
        assert_eq!(names, ["web", "docs", "late", "root"]);
    }

    #[test]
    fn enumeration_is_creation_order() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("a", "1"), &origin()).unwrap();
        jar.add(SetCookie::new("b", "2"), &origin()).unwrap();
        jar.add(SetCookie::new("c", "3"), &origin()).unwrap();
        // Replacing `a` moves it to the back.
        jar.add(SetCookie::new("a", "4"), &origin()).unwrap();

        let names: Vec<&str> = jar.iter().map(Cookie::name).collect();
        assert_eq!(names, ["b", "c", "a"]);
    }

    #[test]
    fn cursor_walk_visits_every_live_cookie() {
        let mut jar = CookieJar::new();
        for name in ["a", "b", "c", "d"] {
            jar.add(SetCookie::new(name, "v"), &origin()).unwrap();
        }
        let dangling = jar
            .add(SetCookie::new("b", "v2"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        let _ = dangling;

        let mut walked = Vec::new();
        let mut cursor = jar.first();
        while let Some(handle) = cursor {
            walked.push(jar.name(handle).unwrap().to_owned());
            cursor = jar.next(handle);
        }
        assert_eq!(walked, ["a", "c", "d", "b"]);

        let from_iter: Vec<String> = jar.iter().map(|c| c.name().to_owned()).collect();
        assert_eq!(walked, from_iter);
    }

    #[test]
    fn next_works_from_a_dead_handle() {
        let mut jar = CookieJar::new();
        let first = jar
            .add(SetCookie::new("a", "1"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        jar.add(SetCookie::new("b", "2"), &origin()).unwrap();
        // Replace `a`: its old handle is dead but still usable as a cursor.
        jar.add(SetCookie::new("a", "3"), &origin()).unwrap();

        assert_eq!(jar.get(first), None);
        let after = jar.next(first).unwrap();
        assert_eq!(jar.name(after), Some("b"));
    }

    #[test]
    fn cross_domain_injection_is_refused() {
        let mut jar = CookieJar::new();
        let evil = Origin::new("attacker.test", "/", false);
        let e = jar
            .add(SetCookie::new("sid", "1").set_domain("example.com"), &evil)
            .unwrap_err();
        assert!(matches!(e, AddError::DomainMismatch { .. }));

        // A sibling subdomain is just as much off-limits.
        let sibling = Origin::new("a.example.com", "/", false);
        let e = jar
            .add(
                SetCookie::new("sid", "1").set_domain("b.example.com"),
                &sibling,
            )
            .unwrap_err();
        assert!(matches!(e, AddError::DomainMismatch { .. }));
        assert!(jar.is_empty());
    }

    #[test]
    fn parent_domain_is_allowed() {
        let mut jar = CookieJar::new();
        let handle = jar
            .add(SetCookie::new("sid", "1").set_domain("example.com"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        let cookie = jar.get(handle).unwrap();
        assert_eq!(cookie.domain(), "example.com");
        assert!(cookie.domain_specified());
    }

    #[test]
    fn dotless_domains_are_policy_dependent() {
        let mut jar = CookieJar::new();
        let intranet = Origin::new("intranet", "/", false);
        let e = jar
            .add(SetCookie::new("sid", "1").set_domain("intranet"), &intranet)
            .unwrap_err();
        assert!(matches!(e, AddError::DotlessDomain { .. }));

        // `localhost` is the blessed exception.
        let localhost = Origin::new("localhost", "/", false);
        jar.add(SetCookie::new("sid", "1").set_domain("localhost"), &localhost)
            .unwrap();

        // A trailing dot does not count as having a dot.
        let trailing = Origin::new("example.", "/", false);
        let e = jar
            .add(SetCookie::new("sid", "1").set_domain("example."), &trailing)
            .unwrap_err();
        assert!(matches!(e, AddError::DotlessDomain { .. }));

        let mut config = JarConfig::default();
        config.domain_policy = DomainPolicy::Permissive;
        let mut lax = CookieJar::with_config(config);
        lax.add(SetCookie::new("sid", "1").set_domain("intranet"), &intranet)
            .unwrap();
        assert_eq!(lax.len(), 1);
    }

    #[test]
    fn ip_origins_store_host_only() {
        let mut jar = CookieJar::new();
        let ip = Origin::new("127.0.0.1", "/", false);
        let handle = jar
            .add(SetCookie::new("sid", "1").set_domain("127.0.0.1"), &ip)
            .unwrap()
            .handle()
            .unwrap();
        let cookie = jar.get(handle).unwrap();
        assert!(!cookie.domain_specified());
        assert_eq!(cookie.domain(), "127.0.0.1");

        // A domain that merely tail-matches the address is an injection
        // attempt, not a subdomain.
        let e = jar
            .add(SetCookie::new("sid", "1").set_domain("0.0.1"), &ip)
            .unwrap_err();
        assert!(matches!(e, AddError::DomainMismatch { .. }));

        let v6 = Origin::new("::1", "/", false);
        jar.add(SetCookie::new("sid", "1").set_domain("::1"), &v6)
            .unwrap();
    }

    #[test]
    fn secure_prefix_requires_the_secure_attribute() {
        let mut jar = CookieJar::new();
        let https = Origin::new("www.example.com", "/", true);

        let e = jar
            .add(SetCookie::new("__Secure-sid", "1"), &https)
            .unwrap_err();
        assert!(matches!(e, AddError::InvalidPrefix { .. }));

        jar.add(SetCookie::new("__Secure-sid", "1").set_secure(true), &https)
            .unwrap();

        // The prefix check is case-insensitive.
        let e = jar
            .add(SetCookie::new("__secure-other", "1"), &https)
            .unwrap_err();
        assert!(matches!(e, AddError::InvalidPrefix { .. }));
    }

    #[test]
    fn host_prefix_requirements() {
        let mut jar = CookieJar::new();
        let https = Origin::new("www.example.com", "/", true);

        jar.add(
            SetCookie::new("__Host-sid", "1").set_secure(true).set_path("/"),
            &https,
        )
        .unwrap();

        let with_domain = SetCookie::new("__Host-sid", "1")
            .set_secure(true)
            .set_path("/")
            .set_domain("example.com");
        assert!(matches!(
            jar.add(with_domain, &https).unwrap_err(),
            AddError::InvalidPrefix { .. }
        ));

        let with_subpath = SetCookie::new("__Host-sid", "1")
            .set_secure(true)
            .set_path("/admin");
        assert!(matches!(
            jar.add(with_subpath, &https).unwrap_err(),
            AddError::InvalidPrefix { .. }
        ));

        let without_secure = SetCookie::new("__Host-sid", "1").set_path("/");
        assert!(matches!(
            jar.add(without_secure, &https).unwrap_err(),
            AddError::InvalidPrefix { .. }
        ));

        // `Path=/` has to be spelled out; defaulting to the root path from
        // a root-path origin is not enough.
        let defaulted = SetCookie::new("__Host-sid", "1").set_secure(true);
        assert!(matches!(
            jar.add(defaulted, &https).unwrap_err(),
            AddError::InvalidPrefix { .. }
        ));
    }

    #[test]
    fn insecure_origin_cannot_touch_secure_cookies() {
        let mut jar = CookieJar::new();
        let https = Origin::new("www.example.com", "/", true);
        let http = Origin::new("www.example.com", "/", false);
        jar.add(SetCookie::new("sid", "good").set_secure(true), &https)
            .unwrap();

        // Overwrite.
        let e = jar.add(SetCookie::new("sid", "evil"), &http).unwrap_err();
        assert!(matches!(e, AddError::SecureOverwrite { .. }));

        // Shadowing on a sub-path.
        let e = jar
            .add(SetCookie::new("sid", "evil").set_path("/login"), &http)
            .unwrap_err();
        assert!(matches!(e, AddError::SecureOverwrite { .. }));

        // Deletion by past expiry.
        let e = jar
            .add(SetCookie::new("sid", "x").set_expires(PAST), &http)
            .unwrap_err();
        assert!(matches!(e, AddError::SecureOverwrite { .. }));
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.matches("www.example.com", "/", true)[0].value(), "good");

        // Overlap is what the rule keys on: a secure cookie scoped to
        // `/account` does not block the same name under `/blog`.
        jar.add(
            SetCookie::new("tok", "1").set_secure(true).set_path("/account"),
            &https,
        )
        .unwrap();
        jar.add(SetCookie::new("tok", "2").set_path("/blog"), &http)
            .unwrap();

        // A secure origin may overwrite.
        jar.add(SetCookie::new("sid", "fresh").set_secure(true), &https)
            .unwrap();
        assert_eq!(jar.matches("www.example.com", "/", true)[0].value(), "fresh");
    }

    #[test]
    fn expired_secure_cookies_do_not_block_insecure_origins() {
        let mut jar = CookieJar::new();
        let http = Origin::new("www.example.com", "/", false);
        jar.insert_record(Cookie {
            name: "sid".into(),
            value: "stale".into(),
            domain: "www.example.com".into(),
            domain_specified: false,
            path: "/".into(),
            secure: true,
            http_only: false,
            expires: Expiration::DateTime(PAST),
        });

        // The expired record is still physically present (no sweep), yet it
        // no longer guards its name.
        let outcome = jar
            .add_with_sweep(SetCookie::new("sid", "new"), &http, false)
            .unwrap();
        assert!(matches!(outcome, AddOutcome::Inserted(_)));
        assert_eq!(jar.matches("www.example.com", "/", false)[0].value(), "new");
    }

    #[test]
    fn oversized_cookies_are_refused() {
        let mut jar = CookieJar::new();
        let value = "v".repeat(4096);
        let e = jar
            .add(SetCookie::new("sid", value.as_str()), &origin())
            .unwrap_err();
        assert!(matches!(e, AddError::Oversized { .. }));

        // Exactly at the limit is fine.
        let value = "v".repeat(4096 - 3);
        jar.add(SetCookie::new("sid", value.as_str()), &origin())
            .unwrap();
    }

    #[test]
    fn malformed_names_and_values_are_refused() {
        let mut jar = CookieJar::new();
        assert!(matches!(
            jar.add(SetCookie::new("", "v"), &origin()).unwrap_err(),
            AddError::EmptyName
        ));
        assert!(matches!(
            jar.add(SetCookie::new("na me", "v"), &origin()).unwrap_err(),
            AddError::InvalidName { .. }
        ));
        assert!(matches!(
            jar.add(SetCookie::new("name;", "v"), &origin()).unwrap_err(),
            AddError::InvalidName { .. }
        ));
        assert!(matches!(
            jar.add(SetCookie::new("name", "line\nbreak"), &origin())
                .unwrap_err(),
            AddError::InvalidValue { .. }
        ));
        assert!(jar.is_empty());
    }

    #[test]
    fn add_header_surfaces_parse_failures() {
        let mut jar = CookieJar::new();
        jar.add_header("sid=1; Path=/", &origin()).unwrap();
        let e = jar.add_header("garbage", &origin()).unwrap_err();
        assert!(matches!(e, AddError::Malformed(_)));
    }

    #[test]
    fn domain_eviction_is_oldest_first() {
        let mut config = JarConfig::default();
        config.max_cookies_per_domain = 2;
        let mut jar = CookieJar::with_config(config);

        jar.add(SetCookie::new("a", "1"), &origin()).unwrap();
        jar.add(SetCookie::new("b", "2"), &origin()).unwrap();
        jar.add(SetCookie::new("c", "3"), &origin()).unwrap();

        let names: Vec<&str> = jar.iter().map(Cookie::name).collect();
        assert_eq!(names, ["b", "c"]);

        // Another domain is not affected by this one's pressure.
        let other = Origin::new("other.test", "/", false);
        jar.add(SetCookie::new("x", "1"), &other).unwrap();
        assert_eq!(jar.len(), 3);
    }

    #[test]
    fn jar_wide_eviction_kicks_in_after_domain_eviction() {
        let mut config = JarConfig::default();
        config.max_cookies_total = 2;
        let mut jar = CookieJar::with_config(config);

        jar.add(SetCookie::new("a", "1"), &Origin::new("one.test", "/", false))
            .unwrap();
        jar.add(SetCookie::new("b", "2"), &Origin::new("two.test", "/", false))
            .unwrap();
        jar.add(SetCookie::new("c", "3"), &Origin::new("three.test", "/", false))
            .unwrap();

        let domains: Vec<&str> = jar.iter().map(Cookie::domain).collect();
        assert_eq!(domains, ["two.test", "three.test"]);
    }

    #[test]
    fn the_newest_cookie_is_never_evicted() {
        let mut config = JarConfig::default();
        config.max_cookies_per_domain = 0;
        let mut jar = CookieJar::with_config(config);

        jar.add(SetCookie::new("a", "1"), &origin()).unwrap();
        let handle = jar
            .add(SetCookie::new("b", "2"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        let names: Vec<&str> = jar.iter().map(Cookie::name).collect();
        assert_eq!(names, ["b"]);
        assert_eq!(jar.first(), Some(handle));
    }

    #[test]
    fn expired_records_are_invisible_before_any_purge() {
        let mut jar = CookieJar::new();
        jar.insert_record(record("dead", "example.com", "/", Expiration::DateTime(PAST)));
        let live = record("alive", "example.com", "/", Expiration::DateTime(FUTURE));
        let (live_handle, _) = jar.insert_record(live);

        // Physically present...
        assert_eq!(jar.cookies.len(), 2);
        // ...but observably absent.
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.iter().count(), 1);
        assert_eq!(jar.first(), Some(live_handle));
        assert!(jar.matches("example.com", "/", false).len() == 1);
        assert_eq!(jar.name(live_handle), Some("alive"));
    }

    #[test]
    fn purge_is_idempotent() {
        let mut jar = CookieJar::new();
        jar.insert_record(record("dead", "example.com", "/", Expiration::DateTime(PAST)));
        jar.insert_record(record("alive", "example.com", "/", Expiration::DateTime(FUTURE)));

        let now = datetime!(2024-01-01 00:00:00 UTC);
        assert_eq!(jar.purge_expired(now), 1);
        assert_eq!(jar.cookies.len(), 1);
        assert_eq!(jar.purge_expired(now), 0);
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn sweeping_is_only_physical_cleanup() {
        let mut jar = CookieJar::new();
        jar.insert_record(record("dead", "stale.test", "/", Expiration::DateTime(PAST)));

        jar.add_with_sweep(SetCookie::new("a", "1"), &origin(), false)
            .unwrap();
        // The expired record is still physically around...
        assert_eq!(jar.cookies.len(), 2);
        assert_eq!(jar.len(), 1);

        jar.add_with_sweep(SetCookie::new("b", "2"), &origin(), true)
            .unwrap();
        // ...until a sweeping add drops it.
        assert_eq!(jar.cookies.len(), 2);
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn clear_session_keeps_persistent_cookies() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("session", "1"), &origin()).unwrap();
        jar.add(SetCookie::new("persistent", "2").set_expires(FUTURE), &origin())
            .unwrap();

        jar.clear_session();
        let names: Vec<&str> = jar.iter().map(Cookie::name).collect();
        assert_eq!(names, ["persistent"]);

        jar.clear();
        assert!(jar.is_empty());
        assert_eq!(jar.cookies.len(), 0);
    }

    #[test]
    fn handles_stay_monotonic_across_clear() {
        let mut jar = CookieJar::new();
        let old = jar
            .add(SetCookie::new("a", "1"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        jar.clear();
        let new = jar
            .add(SetCookie::new("b", "2"), &origin())
            .unwrap()
            .handle()
            .unwrap();
        assert!(new > old);
        assert_eq!(jar.get(old), None);
    }

    #[test]
    fn remove_by_identity() {
        let mut jar = CookieJar::new();
        jar.add(SetCookie::new("sid", "1"), &origin()).unwrap();

        let id = CookieId::new("sid", "www.example.com", "/");
        let removed = jar.remove(&id).unwrap();
        assert_eq!(removed.value(), "1");
        assert!(jar.is_empty());
        assert_eq!(jar.remove(&id), None);
    }

    #[test]
    fn hosts_are_matched_case_insensitively() {
        let mut jar = CookieJar::new();
        let shouty = Origin::new("WWW.Example.COM", "/", false);
        let handle = jar
            .add(SetCookie::new("sid", "1"), &shouty)
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(jar.domain(handle), Some("www.example.com"));
        assert_eq!(jar.matches("www.EXAMPLE.com", "/", false).len(), 1);
    }

    #[test]
    fn empty_origin_host_is_refused() {
        let mut jar = CookieJar::new();
        let nowhere = Origin::new("", "/", false);
        assert!(matches!(
            jar.add(SetCookie::new("sid", "1"), &nowhere).unwrap_err(),
            AddError::EmptyHost
        ));
    }

    #[test]
    fn handle_accessors_mirror_the_record() {
        let mut jar = CookieJar::new();
        let https = Origin::new("www.example.com", "/docs/guide", true);
        let cookie = SetCookie::new("sid", "abc")
            .set_secure(true)
            .set_expires(FUTURE);
        let handle = jar.add(cookie, &https).unwrap().handle().unwrap();

        assert_eq!(jar.name(handle), Some("sid"));
        assert_eq!(jar.value(handle), Some("abc"));
        assert_eq!(jar.domain(handle), Some("www.example.com"));
        assert_eq!(jar.path(handle), Some("/docs"));
        assert_eq!(jar.secure(handle), Some(true));
        assert_eq!(jar.expires(handle), Some(Expiration::DateTime(FUTURE)));
    }
}
