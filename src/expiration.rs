use time::OffsetDateTime;

/// A cookie's expiration: either an absolute date-time or session-scoped.
///
/// An `Expiration` is constructible with `Expiration::from()` via any of:
///
///   * `None` -> `Expiration::Session`
///   * `Some(OffsetDateTime)` -> `Expiration::DateTime`
///   * `OffsetDateTime` -> `Expiration::DateTime`
///
/// ```rust
/// use barattolo::Expiration;
/// use time::OffsetDateTime;
///
/// let expires = Expiration::from(None);
/// assert_eq!(expires, Expiration::Session);
///
/// let now = OffsetDateTime::now_utc();
/// let expires = Expiration::from(now);
/// assert_eq!(expires, Expiration::DateTime(now));
///
/// let expires = Expiration::from(Some(now));
/// assert_eq!(expires, Expiration::DateTime(now));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// Expiration for a "permanent" cookie at a specific date-time.
    DateTime(OffsetDateTime),
    /// Expiration for a "session" cookie: the cookie is conceptually deleted
    /// when the session that owns the jar ends. Session cookies are never
    /// written to a cookie file unless the jar is explicitly configured to
    /// persist them.
    Session,
}

impl Expiration {
    /// Returns `true` if `self` is an `Expiration::DateTime`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    /// use time::OffsetDateTime;
    ///
    /// let expires = Expiration::from(None);
    /// assert!(!expires.is_datetime());
    ///
    /// let expires = Expiration::from(OffsetDateTime::now_utc());
    /// assert!(expires.is_datetime());
    /// ```
    pub fn is_datetime(&self) -> bool {
        match self {
            Expiration::DateTime(_) => true,
            Expiration::Session => false,
        }
    }

    /// Returns `true` if `self` is an `Expiration::Session`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    /// use time::OffsetDateTime;
    ///
    /// let expires = Expiration::from(None);
    /// assert!(expires.is_session());
    ///
    /// let expires = Expiration::from(OffsetDateTime::now_utc());
    /// assert!(!expires.is_session());
    /// ```
    pub fn is_session(&self) -> bool {
        match self {
            Expiration::DateTime(_) => false,
            Expiration::Session => true,
        }
    }

    /// Returns the inner [`OffsetDateTime`] if `self` is a `DateTime`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    /// use time::OffsetDateTime;
    ///
    /// let expires = Expiration::from(None);
    /// assert!(expires.datetime().is_none());
    ///
    /// let now = OffsetDateTime::now_utc();
    /// let expires = Expiration::from(now);
    /// assert_eq!(expires.datetime(), Some(now));
    /// ```
    pub fn datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Expiration::Session => None,
            Expiration::DateTime(v) => Some(*v),
        }
    }

    /// Builds an `Expiration` from seconds since the Unix epoch.
    ///
    /// This is the inverse of [`Expiration::unix_timestamp()`] and is used
    /// when reading a cookie file, where expiry is recorded as an integer.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    ///
    /// let expires = Expiration::from_unix(1_445_412_480);
    /// assert_eq!(expires.unix_timestamp(), Some(1_445_412_480));
    /// ```
    pub fn from_unix(seconds: i64) -> Expiration {
        // Out-of-range timestamps are clamped to the nearest representable
        // instant rather than rejected; a cookie file is not trusted input.
        let datetime = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(if seconds < 0 {
            time::PrimitiveDateTime::MIN.assume_utc()
        } else {
            time::PrimitiveDateTime::MAX.assume_utc()
        });
        Expiration::DateTime(datetime)
    }

    /// Returns the expiry as seconds since the Unix epoch, or `None` for a
    /// session cookie.
    ///
    /// In the cookie-file format the integer `0` is the sentinel for
    /// "session cookie". That sentinel never collides with a real epoch-0
    /// expiry: such a cookie is already expired at any plausible clock
    /// reading, so it is never live and never persisted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    ///
    /// assert_eq!(Expiration::Session.unix_timestamp(), None);
    /// assert_eq!(Expiration::from_unix(86_400).unix_timestamp(), Some(86_400));
    /// ```
    pub fn unix_timestamp(&self) -> Option<i64> {
        match self {
            Expiration::Session => None,
            Expiration::DateTime(v) => Some(v.unix_timestamp()),
        }
    }

    /// Returns `true` if a cookie carrying this expiration is expired at
    /// `now`.
    ///
    /// Session cookies never expire by clock; a `DateTime` expiry of exactly
    /// `now` counts as expired.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    /// use time::OffsetDateTime;
    ///
    /// let now = OffsetDateTime::now_utc();
    ///
    /// assert!(!Expiration::Session.is_expired_at(now));
    /// assert!(Expiration::DateTime(now).is_expired_at(now));
    /// assert!(!Expiration::DateTime(now + time::Duration::minutes(1)).is_expired_at(now));
    /// ```
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self {
            Expiration::Session => false,
            Expiration::DateTime(v) => *v <= now,
        }
    }

    /// Applies `f` to the inner [`OffsetDateTime`] if `self` is a `DateTime`
    /// and returns the mapped `Expiration`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use barattolo::Expiration;
    /// use time::{Duration, OffsetDateTime};
    ///
    /// let now = OffsetDateTime::now_utc();
    /// let one_week = Duration::weeks(1);
    ///
    /// let expires = Expiration::from(now);
    /// assert_eq!(expires.map(|t| t + one_week).datetime(), Some(now + one_week));
    ///
    /// let expires = Expiration::from(None);
    /// assert_eq!(expires.map(|t| t + one_week).datetime(), None);
    /// ```
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(OffsetDateTime) -> OffsetDateTime,
    {
        match self {
            Expiration::Session => Expiration::Session,
            Expiration::DateTime(v) => Expiration::DateTime(f(v)),
        }
    }
}

impl<T: Into<Option<OffsetDateTime>>> From<T> for Expiration {
    fn from(option: T) -> Self {
        match option.into() {
            Some(value) => Expiration::DateTime(value),
            None => Expiration::Session,
        }
    }
}
