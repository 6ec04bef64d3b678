//! Local persistence
//!
//! The only state this dashboard owns is the light/dark theme preference,
//! kept in a sled tree under the data directory.

pub mod theme;

pub use theme::{Theme, ThemeStore};
