//! Transport session implementations

mod http;

pub use http::HttpSession;
