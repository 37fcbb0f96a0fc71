//! Platform session credentials.
//!
//! The cookie-file strategy authenticates its scraping session with a cookie
//! export from a logged-in browser, in the Netscape format most browser
//! extensions write.

mod cookies;

pub use cookies::{
    CookieError, CookieFile, SessionCookie, load_cookie_file, load_cookies_into_jar,
    parse_netscape_cookies,
};
