//! Keeps the view filter and the `filter` query parameter of the current
//! view URL in step.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use reqwest::Url;
use tempfile::NamedTempFile;
use tickoff_shared::Filter;
use tracing::{debug, instrument, warn};

pub const FILTER_PARAM: &str = "filter";
pub const DEFAULT_VIEW_URL: &str = "tickoff://view/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserState {
    pub filter: Filter,
}

impl UserState {
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }
}

/// Where the current view URL lives.
pub trait Location {
    fn current(&self) -> Url;

    fn replace_state(&mut self, url: Url) -> anyhow::Result<()>;

    fn search_param(&self, key: &str) -> Option<String> {
        self.current()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The current URL with `key` set to `value`; other parameters are kept.
    fn set_search_param(&self, key: &str, value: &str) -> Url {
        let mut url = self.current();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(key, value);
        url
    }
}

#[derive(Debug, Clone)]
pub struct MemoryLocation {
    url: Url,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Url::parse(raw)
            .map(Self::new)
            .with_context(|| format!("invalid view url {raw}"))
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Url {
        self.url.clone()
    }

    fn replace_state(&mut self, url: Url) -> anyhow::Result<()> {
        self.url = url;
        Ok(())
    }
}

/// A view URL persisted in a file, so the last filter survives between runs.
#[derive(Debug, Clone)]
pub struct FileLocation {
    path: PathBuf,
    url: Url,
}

impl FileLocation {
    #[instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let url = match fs::read_to_string(path) {
            Ok(raw) => match Url::parse(raw.trim()) {
                Ok(url) => url,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "ignoring unreadable view url");
                    default_view_url()?
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => default_view_url()?,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        debug!(file = %path.display(), %url, "opened view location");
        Ok(Self {
            path: path.to_path_buf(),
            url,
        })
    }
}

impl Location for FileLocation {
    fn current(&self) -> Url {
        self.url.clone()
    }

    #[instrument(skip(self, url), fields(file = %self.path.display(), %url))]
    fn replace_state(&mut self, url: Url) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage {}", self.path.display()))?;
        writeln!(temp, "{url}")?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        self.url = url;
        Ok(())
    }
}

fn default_view_url() -> anyhow::Result<Url> {
    Url::parse(DEFAULT_VIEW_URL).context("invalid default view url")
}

pub struct UrlSync<L> {
    location: L,
}

impl<L: Location> UrlSync<L> {
    pub fn new(location: L) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// Applies a valid `filter` parameter to `state`. Missing or invalid
    /// values leave the state untouched. Returns whether the state changed.
    pub fn hydrate(&self, state: &mut UserState) -> bool {
        let Some(raw) = self.location.search_param(FILTER_PARAM) else {
            return false;
        };

        match raw.parse::<Filter>() {
            Ok(filter) if filter != state.filter => {
                debug!(%filter, "hydrating filter from url");
                state.set_filter(filter);
                true
            }
            Ok(_) => false,
            Err(err) => {
                debug!(value = %raw, error = %err, "ignoring invalid filter parameter");
                false
            }
        }
    }

    /// Updates `state` and writes the filter back to the URL in place.
    pub fn set_filter(&mut self, state: &mut UserState, filter: Filter) -> anyhow::Result<()> {
        state.set_filter(filter);
        let url = self
            .location
            .set_search_param(FILTER_PARAM, filter.as_str());
        self.location.replace_state(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrate_applies_valid_filter() {
        let sync = UrlSync::new(MemoryLocation::parse("https://app.test/?filter=completed").expect("url"));
        let mut state = UserState::default();

        assert!(sync.hydrate(&mut state));
        assert_eq!(state.filter, Filter::Completed);
        assert!(!sync.hydrate(&mut state));
    }

    #[test]
    fn hydrate_ignores_missing_and_invalid_values() {
        let mut state = UserState {
            filter: Filter::Active,
        };

        for raw in ["https://app.test/", "https://app.test/?filter=done", "https://app.test/?filter="] {
            let sync = UrlSync::new(MemoryLocation::parse(raw).expect("url"));
            assert!(!sync.hydrate(&mut state), "{raw}");
            assert_eq!(state.filter, Filter::Active);
        }
    }

    #[test]
    fn file_location_persists_filter_between_opens() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("view.url");

        let mut sync = UrlSync::new(FileLocation::open(&file).expect("open missing file"));
        assert_eq!(sync.location().current().as_str(), DEFAULT_VIEW_URL);

        let mut state = UserState::default();
        sync.set_filter(&mut state, Filter::Completed).expect("set filter");

        let reopened = UrlSync::new(FileLocation::open(&file).expect("reopen"));
        let mut fresh = UserState::default();
        assert!(reopened.hydrate(&mut fresh));
        assert_eq!(fresh.filter, Filter::Completed);
    }

    #[test]
    fn set_filter_rewrites_only_filter_param() {
        let mut sync =
            UrlSync::new(MemoryLocation::parse("https://app.test/list?page=2&filter=all").expect("url"));
        let mut state = UserState::default();

        sync.set_filter(&mut state, Filter::Active).expect("set filter");

        assert_eq!(state.filter, Filter::Active);
        let url = sync.location().current();
        assert_eq!(url.path(), "/list");
        assert_eq!(sync.location().search_param("page").as_deref(), Some("2"));
        assert_eq!(sync.location().search_param("filter").as_deref(), Some("active"));
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "filter").count(), 1);
    }
}
