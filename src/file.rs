use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use time::OffsetDateTime;

use crate::{Cookie, CookieJar, Expiration};

/// Lines carrying an http-only cookie start with this marker, a convention
/// shared with every other consumer of the Netscape format.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned when writing a cookie file fails.
///
/// A failed save never touches the jar, and [`save_to_path`] never leaves
/// a half-written file behind.
///
/// [`save_to_path`]: CookieJar::save_to_path
pub enum SaveError {
    #[error("Failed to write the cookie file")]
    Io(#[source] std::io::Error),
    #[error("Failed to move the new cookie file into place at `{}`", path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned when reading a cookie file fails.
pub enum LoadError {
    #[error("Failed to read the cookie file")]
    Io(#[source] std::io::Error),
    #[error("Line {line} of the cookie file is not a valid cookie line")]
    Malformed { line: usize },
}

impl CookieJar {
    /// Writes the live cookies to `writer` in the Netscape cookie-file
    /// format: one cookie per line, seven TAB-separated fields, with a
    /// `#HttpOnly_` marker in front of http-only cookies and `0` in the
    /// expiry column of session cookies.
    ///
    /// Expired cookies are never written. Session cookies are written only
    /// when [`JarConfig::persist_session_cookies`] is set; by default they
    /// die with the session, as their name promises.
    ///
    /// [`JarConfig::persist_session_cookies`]: crate::JarConfig::persist_session_cookies
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), SaveError> {
        let now = OffsetDateTime::now_utc();
        writeln!(writer, "# Netscape HTTP Cookie File").map_err(SaveError::Io)?;
        writeln!(writer, "# This file was generated by barattolo. Edit at your own risk.")
            .map_err(SaveError::Io)?;
        writeln!(writer).map_err(SaveError::Io)?;
        for cookie in self.records() {
            if cookie.is_expired_at(now) {
                continue;
            }
            let expires = match cookie.expires().unix_timestamp() {
                Some(seconds) => seconds,
                None if self.config().persist_session_cookies => 0,
                None => continue,
            };
            writeln!(
                writer,
                "{}{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
                if cookie.http_only() { HTTP_ONLY_PREFIX } else { "" },
                if cookie.domain_specified() { "." } else { "" },
                cookie.domain(),
                if cookie.domain_specified() { "TRUE" } else { "FALSE" },
                cookie.path(),
                if cookie.secure() { "TRUE" } else { "FALSE" },
                expires,
                cookie.name(),
                cookie.value(),
            )
            .map_err(SaveError::Io)?;
        }
        Ok(())
    }

    /// Saves the jar to `path`, replacing whatever was there.
    ///
    /// The bytes go to a temporary file in the same directory first and
    /// are moved into place with a single rename, so a crash or a full
    /// disk leaves either the old file or the new one, never a torn mix.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> {
        let path = path.as_ref();
        let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut file = tempfile::NamedTempFile::new_in(directory.unwrap_or_else(|| Path::new(".")))
            .map_err(SaveError::Io)?;
        self.save(&mut file)?;
        file.persist(path).map_err(|e| SaveError::Replace {
            path: path.to_owned(),
            source: anyhow::Error::new(e),
        })?;
        trace!("saved cookie file at `{}`", path.display());
        Ok(())
    }

    /// Reads Netscape-format cookie lines from `reader` and merges them
    /// into the jar, returning how many cookies were added.
    ///
    /// This is a merge, not a replacement: a loaded record whose (name,
    /// domain, path) identity is already in the jar is skipped, because
    /// whatever the session has picked up since is fresher than the file.
    /// Records expired relative to `now` are dropped on the spot.
    ///
    /// `#`-prefixed lines (other than the `#HttpOnly_` marker) and blank
    /// lines are comments. Anything else that does not parse as a cookie
    /// line stops the load with [`LoadError::Malformed`] and its line
    /// number; cookies read before that point remain in the jar.
    pub fn load<R: BufRead>(&mut self, reader: R, now: OffsetDateTime) -> Result<usize, LoadError> {
        let mut added = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(LoadError::Io)?;
            let record = match parse_file_line(&line) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(()) => return Err(LoadError::Malformed { line: index + 1 }),
            };
            if record.is_expired_at(now) {
                debug!(
                    "dropping expired cookie `{}` from the cookie file",
                    record.name()
                );
                continue;
            }
            if self.insert_loaded(record).is_some() {
                added += 1;
            }
        }
        trace!("loaded {added} cookies");
        Ok(added)
    }

    /// Loads `path` as [`load`](CookieJar::load) does, with expiry
    /// evaluated against the current time.
    ///
    /// A missing file counts as an empty one: not having saved cookies yet
    /// is the normal state of a fresh profile.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, LoadError> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(LoadError::Io(e)),
        };
        self.load(BufReader::new(file), OffsetDateTime::now_utc())
    }
}

/// Parses one line of a cookie file. `Ok(None)` is a comment or blank
/// line; `Err(())` is a line that claims to be a cookie but is not.
fn parse_file_line(line: &str) -> Result<Option<Cookie>, ()> {
    let trimmed = line.trim_start();
    let (line, http_only) = match trimmed.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split('\t');
    let mut next = || fields.next().ok_or(());
    let domain = next()?;
    let subdomains = parse_flag(next()?)?;
    let path = next()?;
    let secure = parse_flag(next()?)?;
    let expires: i64 = next()?.parse().map_err(|_| ())?;
    let name = next()?;
    // The value column may be empty, leaving nothing after the last TAB.
    let value = fields.next().unwrap_or("");
    if fields.next().is_some() {
        // An eighth field would mean a TAB inside the value. No writer of
        // this format produces that; refuse rather than guess.
        return Err(());
    }

    if name.is_empty() || !path.starts_with('/') {
        return Err(());
    }
    let domain = domain.strip_prefix('.').unwrap_or(domain);
    if domain.is_empty() {
        return Err(());
    }

    let expires = if expires == 0 {
        Expiration::Session
    } else {
        Expiration::from_unix(expires)
    };
    Ok(Some(Cookie {
        name: name.to_owned(),
        value: value.to_owned(),
        domain: domain.to_ascii_lowercase(),
        domain_specified: subdomains,
        path: path.to_owned(),
        secure,
        http_only,
        expires,
    }))
}

fn parse_flag(field: &str) -> Result<bool, ()> {
    if field.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if field.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::LoadError;
    use crate::{CookieJar, Expiration, JarConfig, Origin, SetCookie};
    use std::io::Cursor;
    use time::macros::datetime;

    const EXPIRY: time::OffsetDateTime = datetime!(2100-01-01 00:00:00 UTC);
    const NOW: time::OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

    fn sample_jar() -> CookieJar {
        let mut jar = CookieJar::new();
        let http = Origin::new("www.example.com", "/", false);
        let https = Origin::new("www.example.com", "/", true);
        jar.add_at(
            SetCookie::new("sid", "abc")
                .set_domain("example.com")
                .set_path("/docs")
                .set_expires(EXPIRY),
            &http,
            NOW,
        )
        .unwrap();
        jar.add_at(
            SetCookie::new("tok", "xyz")
                .set_secure(true)
                .set_http_only(true)
                .set_expires(EXPIRY),
            &https,
            NOW,
        )
        .unwrap();
        jar
    }

    fn saved(jar: &CookieJar) -> String {
        let mut buffer = Vec::new();
        jar.save(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn saved_file_shape() {
        let text = saved(&sample_jar());
        let expected = format!(
            "# Netscape HTTP Cookie File\n\
             # This file was generated by barattolo. Edit at your own risk.\n\
             \n\
             .example.com\tTRUE\t/docs\tFALSE\t{ts}\tsid\tabc\n\
             #HttpOnly_www.example.com\tFALSE\t/\tTRUE\t{ts}\ttok\txyz\n",
            ts = EXPIRY.unix_timestamp()
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let original = sample_jar();
        let text = saved(&original);

        let mut reloaded = CookieJar::new();
        let added = reloaded.load(Cursor::new(text), NOW).unwrap();
        assert_eq!(added, 2);

        for (a, b) in original.iter().zip(reloaded.iter()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.value(), b.value());
            assert_eq!(a.domain(), b.domain());
            assert_eq!(a.domain_specified(), b.domain_specified());
            assert_eq!(a.path(), b.path());
            assert_eq!(a.secure(), b.secure());
            assert_eq!(a.http_only(), b.http_only());
            assert_eq!(a.expires(), b.expires());
        }
    }

    #[test]
    fn session_cookies_follow_the_config() {
        let origin = Origin::new("example.com", "/", false);

        let mut stingy = CookieJar::new();
        stingy.add(SetCookie::new("sid", "1"), &origin).unwrap();
        assert!(!saved(&stingy).contains("sid"));

        let mut config = JarConfig::default();
        config.persist_session_cookies = true;
        let mut generous = CookieJar::with_config(config);
        generous.add(SetCookie::new("sid", "1"), &origin).unwrap();
        let text = saved(&generous);
        assert!(text.contains("example.com\tFALSE\t/\tFALSE\t0\tsid\t1\n"));

        let mut reloaded = CookieJar::new();
        reloaded.load(Cursor::new(text), NOW).unwrap();
        let cookie = reloaded.iter().next().unwrap();
        assert_eq!(cookie.expires(), Expiration::Session);
    }

    #[test]
    fn expired_records_are_dropped_at_load() {
        let text = format!(
            "example.com\tFALSE\t/\tFALSE\t{past}\told\t1\n\
             example.com\tFALSE\t/\tFALSE\t{future}\tnew\t2\n",
            past = datetime!(2015-10-21 07:28:00 UTC).unix_timestamp(),
            future = EXPIRY.unix_timestamp(),
        );
        let mut jar = CookieJar::new();
        let added = jar.load(Cursor::new(text), NOW).unwrap();
        assert_eq!(added, 1);
        assert_eq!(jar.iter().next().unwrap().name(), "new");
    }

    #[test]
    fn a_live_cookie_wins_over_a_loaded_one() {
        let mut jar = CookieJar::new();
        let origin = Origin::new("www.example.com", "/", false);
        jar.add(SetCookie::new("sid", "live"), &origin).unwrap();

        let text = format!(
            "www.example.com\tFALSE\t/\tFALSE\t{ts}\tsid\tstale\n\
             www.example.com\tFALSE\t/\tFALSE\t{ts}\tother\tx\n",
            ts = EXPIRY.unix_timestamp(),
        );
        let added = jar.load(Cursor::new(text), NOW).unwrap();
        assert_eq!(added, 1);
        assert_eq!(jar.len(), 2);

        let id = crate::CookieId::new("sid", "www.example.com", "/");
        let kept = jar.remove(&id).unwrap();
        assert_eq!(kept.value(), "live");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = format!(
            "# Netscape HTTP Cookie File\n\
             # HttpOnly cookies use a marker, this is just a comment\n\
             \n\
             \t\n\
             example.com\tFALSE\t/\tFALSE\t{ts}\tsid\t1\n",
            ts = EXPIRY.unix_timestamp(),
        );
        let mut jar = CookieJar::new();
        assert_eq!(jar.load(Cursor::new(text), NOW).unwrap(), 1);
    }

    #[test]
    fn http_only_marker_is_not_a_comment() {
        let text = format!(
            "#HttpOnly_.example.com\tTRUE\t/\tFALSE\t{ts}\tsid\t1\n",
            ts = EXPIRY.unix_timestamp(),
        );
        let mut jar = CookieJar::new();
        jar.load(Cursor::new(text), NOW).unwrap();
        let cookie = jar.iter().next().unwrap();
        assert!(cookie.http_only());
        assert!(cookie.domain_specified());
        assert_eq!(cookie.domain(), "example.com");
    }

    #[test]
    fn malformed_lines_stop_the_load_with_a_line_number() {
        let text = "# header\n\
                    \n\
                    not a cookie line\n";
        let mut jar = CookieJar::new();
        let e = jar.load(Cursor::new(text), NOW).unwrap_err();
        assert!(matches!(e, LoadError::Malformed { line: 3 }));

        for bad in [
            "example.com\tYES\t/\tFALSE\t1\tsid\t1",
            "example.com\tTRUE\t/\tFALSE\tsoon\tsid\t1",
            "example.com\tTRUE\trelative\tFALSE\t1\tsid\t1",
            "example.com\tTRUE\t/\tFALSE\t1\t\t1",
            "example.com\tTRUE\t/",
        ] {
            let mut jar = CookieJar::new();
            let e = jar.load(Cursor::new(bad), NOW).unwrap_err();
            assert!(
                matches!(e, LoadError::Malformed { line: 1 }),
                "`{bad}` should be malformed"
            );
        }
    }

    #[test]
    fn control_bytes_in_a_path_cannot_poison_the_file() {
        let mut jar = CookieJar::new();
        let origin = Origin::new("www.example.com", "/shop/cart", false);
        jar.add_at(SetCookie::new("first", "1").set_expires(EXPIRY), &origin, NOW)
            .unwrap();
        // The tab-carrying attribute is discarded in favor of the default
        // path, so the saved file keeps its seven-column shape.
        jar.add_header("evil=1; Path=/a\tb; Max-Age=100000", &origin)
            .unwrap();
        jar.add_at(SetCookie::new("last", "2").set_expires(EXPIRY), &origin, NOW)
            .unwrap();

        let mut reloaded = CookieJar::new();
        assert_eq!(reloaded.load(Cursor::new(saved(&jar)), NOW).unwrap(), 3);
        let evil = reloaded.iter().find(|c| c.name() == "evil").unwrap();
        assert_eq!(evil.path(), "/shop");
    }

    #[test]
    fn an_empty_value_column_is_fine() {
        let text = format!("example.com\tFALSE\t/\tFALSE\t{ts}\tsid\t\n", ts = EXPIRY.unix_timestamp());
        let mut jar = CookieJar::new();
        jar.load(Cursor::new(text), NOW).unwrap();
        assert_eq!(jar.iter().next().unwrap().value(), "");
    }

    #[test]
    fn save_to_path_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        let jar = sample_jar();
        jar.save_to_path(&path).unwrap();

        let mut reloaded = CookieJar::new();
        assert_eq!(reloaded.load_from_path(&path).unwrap(), 2);

        // Saving over an existing file replaces it wholesale.
        reloaded.save_to_path(&path).unwrap();
        let mut third = CookieJar::new();
        assert_eq!(third.load_from_path(&path).unwrap(), 2);
    }

    #[test]
    fn a_missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut jar = CookieJar::new();
        assert_eq!(jar.load_from_path(dir.path().join("absent.txt")).unwrap(), 0);
        assert!(jar.is_empty());
    }
}
