//! A crate to store and match HTTP cookies in a Rust client.
//!
//! # Overview
//!
//! `barattolo` is the cookie engine of an HTTP client: a [`CookieJar`] that
//! stores cookies under their (name, domain, path) identity, picks the ones
//! that apply to each request, and defends itself against the usual abuses
//! of the `Set-Cookie` mechanism.
//!
//! It has support for:
//!
//! - Admitting cookies from raw `Set-Cookie`-style lines or from a typed
//!   builder, via [`CookieJar::add_header`] and [`CookieJar::add`]
//! - Selecting and ordering the cookies to send on a request, via
//!   [`CookieJar::matches`]
//! - Expiration, capacity-bounded eviction, and cursor-style enumeration
//!   with stable [`CookieHandle`]s
//! - Saving and loading Netscape-format cookie files, via
//!   [`CookieJar::save_to_path`] and [`CookieJar::load_from_path`]
//! - Sharing one jar between threads, via [`SharedJar`]
//!
//! In particular:
//!
//! - A cookie set from an unrelated origin is refused, as are dot-less
//!   domains, forged `__Secure-`/`__Host-` prefixes, and any attempt by a
//!   non-secure origin to touch a secure cookie
//! - Expired cookies vanish from every accessor the moment they expire,
//!   whether or not their physical record has been cleaned up yet
//! - `Expires` dates are parsed with the tolerant day/month/year scan that
//!   real-world servers depend on
//!
//! # Non-goals
//!
//! `barattolo` is not a server-side toolkit: it does not build `Set-Cookie`
//! response headers.
//! It does not speak HTTP either: pair the jar with whatever performs the
//! requests.
//!
//! # Quickstart
//!
//! ## Storing and sending cookies
//!
//! ```rust
//! use barattolo::{CookieJar, Origin};
//!
//! let mut jar = CookieJar::new();
//!
//! // Cookies arrive from `Set-Cookie` headers, tied to the origin that
//! // sent them.
//! let origin = Origin::new("www.example.com", "/login", true);
//! jar.add_header("sid=31d4d96e; Path=/; Secure; HttpOnly", &origin).unwrap();
//! jar.add_header("lang=en-US; Domain=example.com; Max-Age=2592000", &origin).unwrap();
//!
//! // The jar picks and orders the cookies for each request; ties between
//! // equal-length paths go to the most recently stored cookie.
//! let cookies = jar.matches("www.example.com", "/account", true);
//! let header = cookies
//!     .iter()
//!     .map(|cookie| cookie.to_string())
//!     .collect::<Vec<_>>()
//!     .join("; ");
//! assert_eq!(header, "lang=en-US; sid=31d4d96e");
//!
//! // The secure cookie stays home on a plain-http request.
//! let cookies = jar.matches("www.example.com", "/account", false);
//! assert_eq!(cookies.len(), 1);
//! assert_eq!(cookies[0].name(), "lang");
//! ```
//!
//! ## Cookie files
//!
//! ```rust
//! use barattolo::{CookieJar, Origin};
//!
//! let mut jar = CookieJar::new();
//! let origin = Origin::new("example.com", "/", false);
//! jar.add_header("theme=dark; Max-Age=2592000", &origin).unwrap();
//! jar.add_header("temp=1", &origin).unwrap();
//!
//! let mut file = Vec::new();
//! jar.save(&mut file).unwrap();
//!
//! // `theme` is written out; `temp` is a session cookie and is not
//! // persisted unless the jar is configured to do so.
//! let text = String::from_utf8(file).unwrap();
//! assert!(text.contains("theme\tdark"));
//! assert!(!text.contains("temp"));
//! ```

pub mod config;
mod cookie;
mod cookie_id;
mod date;
mod expiration;
mod file;
mod jar;
mod set_cookie;
mod shared;

pub use crate::expiration::*;
pub use config::{DomainPolicy, JarConfig};
pub use cookie::Cookie;
pub use cookie_id::CookieId;
pub use jar::{AddOutcome, CookieHandle, CookieJar};
pub use set_cookie::{Origin, SetCookie};
pub use shared::SharedJar;
pub use time;

/// Errors that can occur when using `barattolo`.
pub mod errors {
    pub use crate::file::{LoadError, SaveError};
    pub use crate::jar::AddError;
    pub use crate::set_cookie::{EmptyNameError, MissingPairError, ParseError, TooLongError};
}
