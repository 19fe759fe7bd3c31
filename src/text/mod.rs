//! Text sanitization: noise filtering, URL removal and the injection guard.

pub mod clean;
pub mod injection;
pub mod urls;

pub use clean::clean;
pub use injection::{sanitize, InjectionGuard};
pub use urls::extract_and_remove_urls;
