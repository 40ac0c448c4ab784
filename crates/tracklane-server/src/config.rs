/// Re-export `Config` from `tracklane-core` for use within this crate.
///
/// All environment-variable parsing lives in `tracklane-core` so it can be
/// shared with integration tests and future crates without depending on the
/// full server.
pub use tracklane_core::config::Config;
