use std::path::Path;
use std::sync::{Arc, RwLock};

use time::OffsetDateTime;

use crate::file::{LoadError, SaveError};
use crate::jar::{AddError, AddOutcome};
use crate::{Cookie, CookieId, CookieJar, JarConfig, Origin, SetCookie};

/// A [`CookieJar`] shared across threads, for "profile" use where several
/// sessions read and write the same cookies.
///
/// Cloning is cheap and every clone points at the same jar. Reads
/// (matching, counting) run concurrently; mutations take the write lock
/// for the duration of the in-memory work only. File I/O never happens
/// under a lock: [`flush_to_path`](SharedJar::flush_to_path) snapshots the
/// jar first and [`load_from_path`](SharedJar::load_from_path) parses the
/// file into a staging jar before merging it in.
///
/// ```rust
/// use barattolo::{Origin, SharedJar};
///
/// let jar = SharedJar::new();
/// let worker = jar.clone();
/// let handle = std::thread::spawn(move || {
///     let origin = Origin::new("example.com", "/", false);
///     worker.add_header("sid=abc", &origin).unwrap();
/// });
/// handle.join().unwrap();
///
/// assert_eq!(jar.header_for("example.com", "/", false).as_deref(), Some("sid=abc"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedJar(Arc<RwLock<CookieJar>>);

impl SharedJar {
    /// Creates a shared jar with the default configuration.
    pub fn new() -> SharedJar {
        SharedJar::from_jar(CookieJar::new())
    }

    /// Creates a shared jar with the given configuration.
    pub fn with_config(config: JarConfig) -> SharedJar {
        SharedJar::from_jar(CookieJar::with_config(config))
    }

    /// Wraps an existing jar, typically one just loaded from a file.
    pub fn from_jar(jar: CookieJar) -> SharedJar {
        SharedJar(Arc::new(RwLock::new(jar)))
    }

    /// Renders the `Cookie` header value for a request, best match first,
    /// or `None` when no cookie applies.
    pub fn header_for(&self, host: &str, request_path: &str, is_secure: bool) -> Option<String> {
        let jar = self.0.read().unwrap();
        let cookies = jar.matches(host, request_path, is_secure);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|cookie| cookie.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// See [`CookieJar::add`].
    pub fn add<'c, C>(&self, cookie: C, origin: &Origin<'_>) -> Result<AddOutcome, AddError>
    where
        C: Into<SetCookie<'c>>,
    {
        self.0.write().unwrap().add(cookie, origin)
    }

    /// See [`CookieJar::add_header`].
    pub fn add_header(&self, header: &str, origin: &Origin<'_>) -> Result<AddOutcome, AddError> {
        self.0.write().unwrap().add_header(header, origin)
    }

    /// See [`CookieJar::remove`].
    pub fn remove(&self, id: &CookieId<'_>) -> Option<Cookie> {
        self.0.write().unwrap().remove(id)
    }

    /// See [`CookieJar::len`].
    pub fn len(&self) -> usize {
        self.0.read().unwrap().len()
    }

    /// See [`CookieJar::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.0.read().unwrap().is_empty()
    }

    /// See [`CookieJar::purge_expired`], evaluated at the current time.
    pub fn purge_expired(&self) -> usize {
        self.0
            .write()
            .unwrap()
            .purge_expired(OffsetDateTime::now_utc())
    }

    /// See [`CookieJar::clear`].
    pub fn clear(&self) {
        self.0.write().unwrap().clear();
    }

    /// See [`CookieJar::clear_session`].
    pub fn clear_session(&self) {
        self.0.write().unwrap().clear_session();
    }

    /// Returns a detached copy of the jar as it is right now.
    pub fn snapshot(&self) -> CookieJar {
        self.0.read().unwrap().clone()
    }

    /// Saves the jar to `path` as [`CookieJar::save_to_path`] does.
    ///
    /// The jar is snapshotted under the read lock and written with no lock
    /// held, so a slow disk never blocks other sessions.
    pub fn flush_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> {
        let snapshot = self.snapshot();
        snapshot.save_to_path(path)
    }

    /// Merges the cookie file at `path` into the jar as
    /// [`CookieJar::load_from_path`] does, returning how many cookies were
    /// added.
    ///
    /// The file is parsed into a staging jar with no lock held; the write
    /// lock is taken only for the in-memory merge, in which cookies
    /// already in the jar win over loaded ones.
    pub fn load_from_path<P: AsRef<Path>>(&self, path: P) -> Result<usize, LoadError> {
        let config = self.0.read().unwrap().config().clone();
        let mut staged = CookieJar::with_config(config);
        staged.load_from_path(path)?;
        Ok(self.0.write().unwrap().absorb(staged))
    }
}
