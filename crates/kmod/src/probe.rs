//! Live module state.

use crate::backend::ModuleList;
use crate::error::Result;
use crate::types::ModuleName;
use std::sync::Arc;

/// Extract module names from a `/proc/modules` style listing.
///
/// Each line starts with the module name followed by whitespace. Lines
/// without a trailing field are not module entries and are skipped, so a
/// stray `foo` line never matches and `foobar ...` never matches `foo`.
pub fn parse_listing(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_once(char::is_whitespace))
        .map(|(name, _)| name)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Answers whether a module is currently loaded.
///
/// Every call reads the listing again; nothing is cached between calls.
#[derive(Clone)]
pub struct StateProbe {
    modules: Arc<dyn ModuleList>,
}

impl StateProbe {
    pub fn new(modules: Arc<dyn ModuleList>) -> Self {
        Self { modules }
    }

    /// Whether `name` appears in the live module list.
    ///
    /// Matching is exact on the whole name, with `-` and `_` treated alike.
    pub fn is_loaded(&self, name: &ModuleName) -> Result<bool> {
        let loaded = self.modules.list_loaded()?;
        let found = loaded.iter().any(|listed| name.matches(listed));
        log::trace!("probe {name}: loaded={found}");
        Ok(found)
    }
}

impl std::fmt::Debug for StateProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProbe").finish_non_exhaustive()
    }
}
