use std::borrow::Cow;
use std::fmt;

use log::trace;
use time::format_description::FormatItem;
use time::macros::{datetime, format_description};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::date;
use crate::Expiration;

/// Longest `Set-Cookie`-style line the parser accepts, in bytes.
pub(crate) const MAX_HEADER_LINE: usize = 5000;

/// A cookie as a server hands it out, before it is admitted into a
/// [`CookieJar`].
///
/// ## Constructing a `SetCookie`
///
/// To construct a cookie with only a name/value, use [`SetCookie::new()`]:
///
/// ```rust
/// use barattolo::SetCookie;
///
/// let cookie = SetCookie::new("name", "value");
/// assert_eq!(cookie.to_string(), "name=value");
/// ```
///
/// ## Building a `SetCookie`
///
/// To construct more elaborate cookies, use `SetCookie`'s `set_*` methods.
///
/// ```rust
/// use barattolo::SetCookie;
///
/// let cookie = SetCookie::new("name", "value")
///     .set_domain("www.rust-lang.org")
///     .set_path("/")
///     .set_secure(true)
///     .set_http_only(true);
/// ```
///
/// ## Parsing a `SetCookie`
///
/// [`SetCookie::parse()`] accepts a raw `Set-Cookie`-style header line in
/// the tolerant dialect clients have always accepted: case-insensitive
/// attribute names, unknown attributes skipped, dates in any of the shapes
/// servers actually emit.
///
/// ```rust
/// use barattolo::SetCookie;
///
/// let cookie = SetCookie::parse("id=a3fWa; Path=/docs; Secure").unwrap();
/// assert_eq!(cookie.name_value(), ("id", "a3fWa"));
/// assert_eq!(cookie.path(), Some("/docs"));
/// assert_eq!(cookie.secure(), Some(true));
/// ```
///
/// Attributes carried here are the server's *request*; which of them take
/// effect, and against which origin, is decided by
/// [`CookieJar::add`](crate::CookieJar::add).
///
/// [`CookieJar`]: crate::CookieJar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie<'c> {
    /// The cookie's name.
    pub(crate) name: Cow<'c, str>,
    /// The cookie's value.
    pub(crate) value: Cow<'c, str>,
    /// The cookie's expiration, if any.
    pub(crate) expires: Option<Expiration>,
    /// The cookie's maximum age, if any.
    pub(crate) max_age: Option<Duration>,
    /// The cookie's domain, if any.
    pub(crate) domain: Option<Cow<'c, str>>,
    /// The cookie's path, if any.
    pub(crate) path: Option<Cow<'c, str>>,
    /// Whether this cookie was marked Secure.
    pub(crate) secure: Option<bool>,
    /// Whether this cookie was marked HttpOnly.
    pub(crate) http_only: Option<bool>,
}

impl<'c> SetCookie<'c> {
    /// Creates a new [`SetCookie`] with the given name and value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::SetCookie;
    ///
    /// let cookie = SetCookie::new("name", "value");
    /// assert_eq!(cookie.name_value(), ("name", "value"));
    ///
    /// // This is equivalent to `from` with a `(name, value)` tuple:
    /// let cookie = SetCookie::from(("name", "value"));
    /// assert_eq!(cookie.name_value(), ("name", "value"));
    /// ```
    pub fn new<N, V>(name: N, value: V) -> SetCookie<'c>
    where
        N: Into<Cow<'c, str>>,
        V: Into<Cow<'c, str>>,
    {
        SetCookie {
            name: name.into(),
            value: value.into(),
            expires: None,
            max_age: None,
            domain: None,
            path: None,
            secure: None,
            http_only: None,
        }
    }

    /// Parses a `Set-Cookie`-style header line.
    ///
    /// The first `;`-separated segment must be a `name=value` pair; the name
    /// must be non-empty after trimming whitespace, and a pair of
    /// double-quotes around the value is removed. Every following segment is
    /// an attribute with a case-insensitive name. `Domain`, `Path`,
    /// `Expires`, `Max-Age`, `Secure` and `HttpOnly` are recognized;
    /// anything else (including `SameSite`) is ignored. An `Expires` date
    /// that cannot be parsed leaves the attribute unset rather than failing
    /// the line, and when an attribute repeats the last usable occurrence
    /// wins.
    ///
    /// Lines longer than 5000 bytes are rejected outright.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::SetCookie;
    ///
    /// let cookie = SetCookie::parse(
    ///     "id=a3fWa; Domain=.example.com; Expires=Wed, 21 Oct 2015 07:28:00 GMT; HttpOnly",
    /// )
    /// .unwrap();
    /// assert_eq!(cookie.name(), "id");
    /// // The leading dot carries no meaning and is dropped.
    /// assert_eq!(cookie.domain(), Some("example.com"));
    /// assert_eq!(cookie.http_only(), Some(true));
    /// assert!(cookie.expires_datetime().is_some());
    /// ```
    pub fn parse(header: &'c str) -> Result<SetCookie<'c>, ParseError> {
        if header.len() > MAX_HEADER_LINE {
            let e = TooLongError {
                length: header.len(),
            };
            return Err(ParseError::TooLong(e));
        }

        let mut segments = header.split(';');
        // `split` always yields at least one segment.
        let pair = segments.next().unwrap_or_default();
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => {
                let e = MissingPairError {
                    fragment: pair.to_string(),
                };
                return Err(ParseError::MissingPair(e));
            }
        };
        if name.is_empty() {
            let e = EmptyNameError {
                value: value.to_string(),
            };
            return Err(ParseError::EmptyName(e));
        }

        let mut cookie = SetCookie::new(name, trim_paired_quotes(value));
        for segment in segments {
            let (attr, attr_value) = match segment.split_once('=') {
                Some((attr, attr_value)) => (attr.trim(), attr_value.trim()),
                None => (segment.trim(), ""),
            };
            if attr.is_empty() {
                continue;
            }
            if attr.eq_ignore_ascii_case("domain") {
                if !attr_value.is_empty() {
                    cookie.domain = Some(Cow::Borrowed(attr_value));
                }
            } else if attr.eq_ignore_ascii_case("path") {
                if !attr_value.is_empty() {
                    cookie.path = Some(Cow::Borrowed(attr_value));
                }
            } else if attr.eq_ignore_ascii_case("secure") {
                cookie.secure = Some(true);
            } else if attr.eq_ignore_ascii_case("httponly") {
                cookie.http_only = Some(true);
            } else if attr.eq_ignore_ascii_case("expires") {
                if let Some(datetime) = date::parse_cookie_date(attr_value) {
                    cookie.expires = Some(Expiration::DateTime(datetime));
                }
            } else if attr.eq_ignore_ascii_case("max-age") {
                if let Some(seconds) = parse_max_age(attr_value) {
                    cookie.max_age = Some(Duration::seconds(seconds));
                }
            } else {
                trace!("ignoring unknown cookie attribute `{}`", attr);
            }
        }
        Ok(cookie)
    }

    /// Converts `self` into a [`SetCookie`] with a static lifetime with as few
    /// allocations as possible.
    pub fn into_owned(self) -> SetCookie<'static> {
        SetCookie {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
            expires: self.expires,
            max_age: self.max_age,
            domain: self.domain.map(|d| Cow::Owned(d.into_owned())),
            path: self.path.map(|p| Cow::Owned(p.into_owned())),
            secure: self.secure,
            http_only: self.http_only,
        }
    }

    /// Returns the name of `self`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of `self`.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the name and value of `self` as a tuple of `(name, value)`.
    #[inline]
    pub fn name_value(&self) -> (&str, &str) {
        (self.name(), self.value())
    }

    /// Returns the `Domain` of the cookie if one was specified, without a
    /// leading dot: `Domain=.example.com` and `Domain=example.com` mean the
    /// same thing.
    #[inline]
    pub fn domain(&self) -> Option<&str> {
        match self.domain {
            Some(ref c) => {
                let domain = c.as_ref();
                domain.strip_prefix('.').or(Some(domain))
            }
            None => None,
        }
    }

    /// Returns the `Path` of the cookie if one was specified.
    #[inline]
    pub fn path(&self) -> Option<&str> {
        match self.path {
            Some(ref c) => Some(c.as_ref()),
            None => None,
        }
    }

    /// Returns whether the cookie carried a `Secure` attribute.
    #[inline]
    pub fn secure(&self) -> Option<bool> {
        self.secure
    }

    /// Returns whether the cookie carried an `HttpOnly` attribute.
    #[inline]
    pub fn http_only(&self) -> Option<bool> {
        self.http_only
    }

    /// Returns the [`Expiration`] of the cookie if one was specified.
    #[inline]
    pub fn expires(&self) -> Option<Expiration> {
        self.expires
    }

    /// Returns the expiration date-time of the cookie if one was specified.
    ///
    /// It returns `None` if the cookie is a session cookie or if the
    /// expiration was not specified.
    #[inline]
    pub fn expires_datetime(&self) -> Option<OffsetDateTime> {
        self.expires.and_then(|e| e.datetime())
    }

    /// Returns the `Max-Age` of the cookie if one was specified.
    ///
    /// When both `Max-Age` and `Expires` are present, `Max-Age` wins at
    /// insertion time.
    #[inline]
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Sets the name of `self` to `name`.
    pub fn set_name<N: Into<Cow<'c, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the value of `self` to `value`.
    pub fn set_value<V: Into<Cow<'c, str>>>(mut self, value: V) -> Self {
        self.value = value.into();
        self
    }

    /// Sets the `domain` of `self` to `domain`.
    ///
    /// # Example
    ///
    /// ```
    /// use barattolo::SetCookie;
    ///
    /// let mut c = SetCookie::new("name", "value");
    /// assert_eq!(c.domain(), None);
    ///
    /// c = c.set_domain("rust-lang.org");
    /// assert_eq!(c.domain(), Some("rust-lang.org"));
    /// ```
    pub fn set_domain<D: Into<Cow<'c, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Unsets the `domain` of `self`.
    pub fn unset_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Sets the `path` of `self` to `path`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::SetCookie;
    ///
    /// let mut c = SetCookie::new("name", "value");
    /// assert_eq!(c.path(), None);
    ///
    /// c = c.set_path("/");
    /// assert_eq!(c.path(), Some("/"));
    /// ```
    pub fn set_path<P: Into<Cow<'c, str>>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Unsets the `path` of `self`.
    pub fn unset_path(mut self) -> Self {
        self.path = None;
        self
    }

    /// Sets the value of `secure` in `self` to `value`. If `value` is
    /// `None`, the field is unset.
    #[inline]
    pub fn set_secure<T: Into<Option<bool>>>(mut self, value: T) -> Self {
        self.secure = value.into();
        self
    }

    /// Sets the value of `http_only` in `self` to `value`. If `value` is
    /// `None`, the field is unset.
    #[inline]
    pub fn set_http_only<T: Into<Option<bool>>>(mut self, value: T) -> Self {
        self.http_only = value.into();
        self
    }

    /// Sets the expires field of `self` to `time`. If `time` is `None`, an
    /// expiration of [`Session`](Expiration::Session) is set.
    ///
    /// # Example
    ///
    /// ```
    /// use barattolo::{Expiration, SetCookie};
    /// use barattolo::time::{Duration, OffsetDateTime};
    ///
    /// let mut c = SetCookie::new("name", "value");
    /// assert_eq!(c.expires(), None);
    ///
    /// let mut now = OffsetDateTime::now_utc();
    /// now += Duration::weeks(52);
    ///
    /// c = c.set_expires(now);
    /// assert!(c.expires().is_some());
    ///
    /// c = c.set_expires(None);
    /// assert_eq!(c.expires(), Some(Expiration::Session));
    /// ```
    pub fn set_expires<T: Into<Expiration>>(mut self, time: T) -> Self {
        static MAX_DATETIME: OffsetDateTime = datetime!(9999-12-31 23:59:59.999_999 UTC);

        // RFC 6265 requires dates not to exceed 9999 years.
        self.expires = Some(time.into().map(|time| std::cmp::min(time, MAX_DATETIME)));
        self
    }

    /// Unsets the `expires` of `self`.
    pub fn unset_expires(mut self) -> Self {
        self.expires = None;
        self
    }

    /// Sets the `max_age` of `self` to `value`. If `value` is `None`, the
    /// field is unset.
    #[inline]
    pub fn set_max_age<D: Into<Option<Duration>>>(mut self, value: D) -> Self {
        self.max_age = value.into();
        self
    }

    fn fmt_parameters(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(true) = self.http_only() {
            write!(f, "; HttpOnly")?;
        }

        if let Some(true) = self.secure() {
            write!(f, "; Secure")?;
        }

        if let Some(path) = self.path() {
            write!(f, "; Path={}", path)?;
        }

        if let Some(domain) = self.domain() {
            write!(f, "; Domain={}", domain)?;
        }

        if let Some(max_age) = self.max_age() {
            write!(f, "; Max-Age={}", max_age.whole_seconds())?;
        }

        if let Some(time) = self.expires_datetime() {
            let time = time.to_offset(UtcOffset::UTC);

            // From http://tools.ietf.org/html/rfc2616#section-3.3.1.
            static FMT1: &[FormatItem<'_>] = format_description!(
                "[weekday repr:short], [day] [month repr:short] [year padding:none] [hour]:[minute]:[second] GMT"
            );
            write!(f, "; Expires={}", time.format(&FMT1).map_err(|_| fmt::Error)?)?;
        }

        Ok(())
    }
}

impl<'c> fmt::Display for SetCookie<'c> {
    /// Formats the cookie `self` as a `Set-Cookie` header value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::SetCookie;
    ///
    /// let cookie = SetCookie::new("foo", "bar").set_path("/");
    /// assert_eq!(cookie.to_string(), "foo=bar; Path=/");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name(), self.value())?;
        self.fmt_parameters(f)
    }
}

impl<'c, N, V> From<(N, V)> for SetCookie<'c>
where
    N: Into<Cow<'c, str>>,
    V: Into<Cow<'c, str>>,
{
    fn from((name, value): (N, V)) -> Self {
        SetCookie::new(name, value)
    }
}

/// The request context a cookie is being set from: the host the response
/// came from, the path that was requested, and whether the transport was
/// secure.
///
/// The jar needs it to fill in defaults for cookies that carry no `Domain`
/// or `Path` attribute and to reject cross-domain and downgrade attempts.
///
/// # Example
///
/// ```rust
/// use barattolo::Origin;
///
/// let origin = Origin::new("www.example.com", "/accounts/login", true);
/// assert_eq!(origin.host(), "www.example.com");
/// assert_eq!(origin.path(), "/accounts/login");
/// assert!(origin.is_secure());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin<'a> {
    host: &'a str,
    path: &'a str,
    secure: bool,
}

impl<'a> Origin<'a> {
    /// Creates a new [`Origin`] from a host, a request path and the
    /// security of the transport it was reached over.
    pub fn new(host: &'a str, path: &'a str, secure: bool) -> Origin<'a> {
        Origin { host, path, secure }
    }

    /// Returns the host of `self`.
    #[inline]
    pub fn host(&self) -> &'a str {
        self.host
    }

    /// Returns the request path of `self`.
    #[inline]
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Returns `true` if the origin was reached over a secure transport.
    #[inline]
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

/// The default cookie path for a request path: its directory portion, `/`
/// at the root or for anything that is not an absolute path.
pub(crate) fn default_path(request_path: &str) -> &str {
    if !request_path.starts_with('/') {
        return "/";
    }
    match request_path.rfind('/') {
        Some(0) | None => "/",
        Some(last_slash) => &request_path[..last_slash],
    }
}

/// A `Path` attribute is usable if it is absolute and free of control
/// bytes, after shedding the stray quotes some sites wrap it in. Anything
/// else falls back to the default path.
pub(crate) fn sanitize_path_attribute(raw: &str) -> Option<&str> {
    let path = raw.strip_prefix('"').unwrap_or(raw);
    let path = path.strip_suffix('"').unwrap_or(path);
    if path.starts_with('/') && path.bytes().all(|b| !b.is_ascii_control()) {
        Some(path)
    } else {
        None
    }
}

fn trim_paired_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes.first() == Some(&b'"') && bytes.last() == Some(&b'"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// `Max-Age` as deployed engines read it: an optionally signed integer,
/// clamped on overflow. Anything else means the attribute is ignored.
fn parse_max_age(value: &str) -> Option<i64> {
    // Some sites quote the number.
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value);
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<i64>() {
        Ok(seconds) => Some(if negative { -seconds } else { seconds }),
        Err(_) => Some(if negative { i64::MIN } else { i64::MAX }),
    }
}

#[derive(Debug)]
#[non_exhaustive]
/// The error returned by [`SetCookie::parse()`].
pub enum ParseError {
    MissingPair(MissingPairError),
    EmptyName(EmptyNameError),
    TooLong(TooLongError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to parse a `Set-Cookie`-style header line")
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::MissingPair(e) => Some(e),
            ParseError::EmptyName(e) => Some(e),
            ParseError::TooLong(e) => Some(e),
        }
    }
}

#[derive(Debug)]
/// An error that occurs when the first segment of a `Set-Cookie`-style line
/// doesn't contain a name-value separator (`=`).
pub struct MissingPairError {
    fragment: String,
}

impl fmt::Display for MissingPairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expected a name-value pair, but no `=` was found in `{}`",
            self.fragment
        )
    }
}

impl std::error::Error for MissingPairError {}

#[derive(Debug)]
/// An error that occurs when parsing a `Set-Cookie`-style line with an
/// empty cookie name (e.g. `=value`).
pub struct EmptyNameError {
    value: String,
}

impl fmt::Display for EmptyNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The name of a cookie cannot be empty, but found an empty name with `{}` as value",
            self.value
        )
    }
}

impl std::error::Error for EmptyNameError {}

#[derive(Debug)]
/// An error that occurs when a `Set-Cookie`-style line is longer than any
/// cookie a server could legitimately send.
pub struct TooLongError {
    length: usize,
}

impl fmt::Display for TooLongError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The header line is {} bytes long, above the {} byte limit for a single cookie",
            self.length, MAX_HEADER_LINE
        )
    }
}

impl std::error::Error for TooLongError {}
