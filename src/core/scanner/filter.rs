//! File filtering applied after enumeration.

use std::collections::HashSet;
use std::path::Path;

/// Suffix of in-flight encoder output; such files are never real media.
pub const PARTIAL_SUFFIX: &str = ".partial.mp4";

/// Suffix of in-flight archive copies made while filing.
pub const COPY_PARTIAL_SUFFIX: &str = ".partial";

/// Why a path was kept or dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Include,
    /// Name is on the ignore list
    Ignored,
    /// Hidden file and hidden files are excluded
    Hidden,
    /// Left behind by an interrupted encode
    PartialOutput,
    /// Extension is not allow-listed
    ExtensionNotAllowed,
}

/// Decides which discovered files are handed to callers
#[derive(Debug, Clone)]
pub struct MediaFilter {
    /// Allowed extensions, lower-cased; `None` allows everything
    extensions: Option<HashSet<String>>,
    /// Exact file names to drop (e.g. `.DS_Store`)
    ignore_names: HashSet<String>,
    include_hidden: bool,
}

impl MediaFilter {
    /// Accept every file, hidden ones included
    pub fn new() -> Self {
        Self {
            extensions: None,
            ignore_names: HashSet::new(),
            include_hidden: true,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Restrict to these extensions (case-insensitive)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    /// Drop files with these exact names
    pub fn with_ignore_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.ignore_names.contains(name)
    }

    /// Whether `extension` (any case) passes the allow-list
    pub fn allows_extension(&self, extension: &str) -> bool {
        match &self.extensions {
            Some(allowed) => allowed.contains(&extension.to_lowercase()),
            None => true,
        }
    }

    /// Classify a path.
    ///
    /// The ignore list is checked first so an ignored name is reported as
    /// such even when its extension would also be rejected.
    pub fn classify(&self, path: &Path) -> FilterDecision {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if self.is_ignored_name(name) {
            return FilterDecision::Ignored;
        }

        if is_partial_output(path) {
            return FilterDecision::PartialOutput;
        }

        if !self.include_hidden && name.starts_with('.') {
            return FilterDecision::Hidden;
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.allows_extension(extension) {
            return FilterDecision::ExtensionNotAllowed;
        }

        FilterDecision::Include
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        self.classify(path) == FilterDecision::Include
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `path` is a hidden in-flight encoder output or archive copy
pub fn is_partial_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && (n.ends_with(PARTIAL_SUFFIX) || n.ends_with(COPY_PARTIAL_SUFFIX)))
        .unwrap_or(false)
}
