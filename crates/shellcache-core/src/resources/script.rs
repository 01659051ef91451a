//! Extraction of the resource table from a generated service worker script.
//!
//! Build tools emit the table and the app-shell list as JavaScript constants:
//!
//! ```text
//! const RESOURCES = {"index.html": "0b5d...", "/": "69e7...", ...};
//! const CORE = ["main.dart.js", "index.html", ...];
//! ```
//!
//! Both literals are valid JSON, so they are sliced out and handed to
//! `serde_json`.

use std::path::Path;

use tracing::debug;

use super::ResourceTable;
use crate::error::{CacheError, Result};

const RESOURCES_MARKER: &str = "const RESOURCES =";
const CORE_MARKER: &str = "const CORE =";

/// Resource table and app-shell list found in a worker script.
#[derive(Debug, Clone)]
pub struct ScriptResources {
    pub table: ResourceTable,
    /// `None` when the script declares no `CORE` list.
    pub app_shell: Option<Vec<String>>,
}

impl ScriptResources {
    pub fn parse(script: &str) -> Result<Self> {
        let resources = literal_after(script, RESOURCES_MARKER, '{', '}')
            .ok_or_else(|| CacheError::ScriptParse(RESOURCES_MARKER.to_string()))?;
        let table = ResourceTable::from_json(resources)?;

        let app_shell = match literal_after(script, CORE_MARKER, '[', ']') {
            Some(core) => Some(serde_json::from_str::<Vec<String>>(core)?),
            None => None,
        };

        debug!(
            resources = table.len(),
            app_shell = app_shell.as_ref().map(Vec::len).unwrap_or(0),
            "Extracted resources from worker script"
        );
        Ok(Self { table, app_shell })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let script = std::fs::read_to_string(path)?;
        Self::parse(&script)
    }
}

/// Slice the literal delimited by `open` .. `close;` that follows `marker`.
fn literal_after<'a>(script: &'a str, marker: &str, open: char, close: char) -> Option<&'a str> {
    let start = script.find(marker)? + marker.len();
    let rest = &script[start..];
    let body = &rest[rest.find(open)?..];
    let terminator = format!("{close};");
    let end = body.find(&terminator)?;
    Some(&body[..=end])
}
