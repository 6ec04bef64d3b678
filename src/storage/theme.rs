use crate::error::{DashboardError, Result};
use log::{debug, warn};
use sled::{Db, Tree};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;

const PREFERENCES_TREE: &str = "preferences";
const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// ANSI escape used for panel headings
    pub fn heading_style(&self) -> &'static str {
        match self {
            Theme::Light => "\x1b[1;34m",
            Theme::Dark => "\x1b[1;96m",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Theme {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(DashboardError::Config(format!(
                "Invalid theme: {s}. Valid options: light, dark"
            ))),
        }
    }
}

/// Persisted light/dark preference.
///
/// The stored flag is read once by [`ThemeStore::open`]; after that the
/// theme only changes through [`ThemeStore::set_theme`] or
/// [`ThemeStore::toggle`], which write through to disk.
pub struct ThemeStore {
    _db: Db,
    tree: Tree,
    current: RwLock<Theme>,
}

impl ThemeStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ThemeStore> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            DashboardError::Storage(format!(
                "Failed to open preferences at {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let tree = db.open_tree(PREFERENCES_TREE)?;
        let current = match tree.get(THEME_KEY)? {
            Some(raw) => {
                let stored = String::from_utf8_lossy(&raw).to_string();
                stored.parse().unwrap_or_else(|e| {
                    warn!("Ignoring stored theme: {e}");
                    Theme::default()
                })
            }
            None => Theme::default(),
        };
        debug!("Theme preference loaded: {current}");

        Ok(ThemeStore {
            _db: db,
            tree,
            current: RwLock::new(current),
        })
    }

    pub fn theme(&self) -> Theme {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.theme() == Theme::Dark
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.tree.insert(THEME_KEY, theme.as_str().as_bytes())?;
        self.tree.flush()?;
        match self.current.write() {
            Ok(mut guard) => *guard = theme,
            Err(poisoned) => *poisoned.into_inner() = theme,
        }
        Ok(())
    }

    pub fn toggle(&self) -> Result<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }
}
