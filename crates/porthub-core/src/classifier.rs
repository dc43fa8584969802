//! Location classifier: channel origin metadata -> `IdentityKey`.
//!
//! Pure function of the origin and an injected, immutable page descriptor
//! table. The table maps extension page contexts to the file name the host
//! serves them under; its declared order is the tie-break order.
//!
//! ## Rules
//!
//! 1. Owning tab + origin URL on a non-extension scheme -> `content-page`,
//!    owner = tab, sub-owner = frame (or 0).
//! 2. Origin URL on the extension scheme -> first descriptor whose file
//!    name equals the URL's last path segment, else `unknown`;
//!    owner = tab (or 0), sub-owner = frame (or 0).
//! 3. Anything else -> `unknown@0.0`.

use serde::Serialize;
use url::Url;

use crate::types::{ChannelOrigin, Context, IdentityKey};

// ─── Constants ───────────────────────────────────────────────────────

/// Scheme the host serves its own pages under.
pub const DEFAULT_EXTENSION_SCHEME: &str = "chrome-extension";

/// Default file name per page context, in tie-break order.
const DEFAULT_PAGES: [(Context, &str); 7] = [
    (Context::SidePanel, "sidepanel.html"),
    (Context::OptionsPage, "options.html"),
    (Context::Popup, "popup.html"),
    (Context::Devtools, "devtools.html"),
    (Context::NewTabOverride, "newtab.html"),
    (Context::BookmarksOverride, "bookmarks.html"),
    (Context::HistoryOverride, "history.html"),
];

// ─── Page Descriptors ────────────────────────────────────────────────

/// One known extension page: context label and the file name it is served as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDescriptor {
    pub context: Context,
    pub file: String,
}

/// Ordered table of known extension pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageDescriptors {
    entries: Vec<PageDescriptor>,
}

impl PageDescriptors {
    /// Empty table: every extension page classifies as `unknown`.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a descriptor. Later entries lose ties against earlier ones.
    pub fn with(mut self, context: Context, file: impl AsRef<str>) -> Self {
        self.push(context, file);
        self
    }

    pub fn push(&mut self, context: Context, file: impl AsRef<str>) {
        self.entries.push(PageDescriptor {
            context,
            file: file_name(file.as_ref()).to_owned(),
        });
    }

    /// Derive the table from a host manifest.
    ///
    /// Entries missing from the manifest fall back to the default file name
    /// for that context. Only the last path segment of each page is kept.
    pub fn from_manifest(manifest: &serde_json::Value) -> Self {
        let mut table = Self::empty();
        for (context, default_file) in DEFAULT_PAGES {
            let declared = match context {
                Context::SidePanel => manifest_str(manifest, &[&["side_panel", "default_path"]]),
                Context::OptionsPage => {
                    manifest_str(manifest, &[&["options_page"], &["options_ui", "page"]])
                }
                Context::Popup => manifest_str(
                    manifest,
                    &[&["action", "default_popup"], &["browser_action", "default_popup"]],
                ),
                Context::Devtools => manifest_str(manifest, &[&["devtools_page"]]),
                Context::NewTabOverride => {
                    manifest_str(manifest, &[&["chrome_url_overrides", "newtab"]])
                }
                Context::BookmarksOverride => {
                    manifest_str(manifest, &[&["chrome_url_overrides", "bookmarks"]])
                }
                Context::HistoryOverride => {
                    manifest_str(manifest, &[&["chrome_url_overrides", "history"]])
                }
                Context::ContentPage | Context::Unknown => None,
            };
            table.push(context, declared.as_deref().unwrap_or(default_file));
        }
        table
    }

    /// Prepend `explicit` entries; keep entries of `self` whose context is
    /// not overridden.
    pub fn overlay(&self, explicit: &PageDescriptors) -> Self {
        let mut entries = explicit.entries.clone();
        entries.extend(
            self.entries
                .iter()
                .filter(|e| !explicit.entries.iter().any(|x| x.context == e.context))
                .cloned(),
        );
        Self { entries }
    }

    /// First context whose file name equals `file`.
    pub fn match_file(&self, file: &str) -> Option<Context> {
        self.entries
            .iter()
            .find(|e| e.file == file)
            .map(|e| e.context)
    }

    /// File name declared for `context`, if any.
    pub fn file_for(&self, context: Context) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.context == context)
            .map(|e| e.file.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PageDescriptors {
    fn default() -> Self {
        let mut table = Self::empty();
        for (context, file) in DEFAULT_PAGES {
            table.push(context, file);
        }
        table
    }
}

fn manifest_str(manifest: &serde_json::Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(manifest, |node, segment| node.get(*segment))
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ─── Classifier ──────────────────────────────────────────────────────

/// Classifier bound to one descriptor table and extension scheme.
#[derive(Debug, Clone)]
pub struct LocationClassifier {
    descriptors: PageDescriptors,
    extension_scheme: String,
}

impl LocationClassifier {
    /// URL schemes are case-insensitive; the scheme is stored lowercased.
    pub fn new(descriptors: PageDescriptors, extension_scheme: impl Into<String>) -> Self {
        let mut extension_scheme: String = extension_scheme.into();
        extension_scheme.make_ascii_lowercase();
        Self {
            descriptors,
            extension_scheme,
        }
    }

    pub fn descriptors(&self) -> &PageDescriptors {
        &self.descriptors
    }

    pub fn extension_scheme(&self) -> &str {
        &self.extension_scheme
    }

    pub fn classify(&self, origin: &ChannelOrigin) -> IdentityKey {
        classify_with_scheme(origin, &self.descriptors, &self.extension_scheme)
    }
}

impl Default for LocationClassifier {
    fn default() -> Self {
        Self::new(PageDescriptors::default(), DEFAULT_EXTENSION_SCHEME)
    }
}

/// Classify `origin` against `descriptors` using the default extension scheme.
pub fn classify(origin: &ChannelOrigin, descriptors: &PageDescriptors) -> IdentityKey {
    classify_with_scheme(origin, descriptors, DEFAULT_EXTENSION_SCHEME)
}

pub fn classify_with_scheme(
    origin: &ChannelOrigin,
    descriptors: &PageDescriptors,
    extension_scheme: &str,
) -> IdentityKey {
    let url = origin.url.as_deref().and_then(|raw| Url::parse(raw).ok());
    let sub_owner_id = origin.frame_id.unwrap_or(0);

    match (origin.tab_id, url) {
        // 1. Content page inside a tab
        (Some(tab_id), Some(url)) if !url.scheme().eq_ignore_ascii_case(extension_scheme) => {
            IdentityKey::new(Context::ContentPage, tab_id, sub_owner_id)
        }
        // 2. Extension page
        (tab_id, Some(url)) if url.scheme().eq_ignore_ascii_case(extension_scheme) => {
            let context = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|file| !file.is_empty())
                .and_then(|file| descriptors.match_file(file))
                .unwrap_or(Context::Unknown);
            IdentityKey::new(context, tab_id.unwrap_or(0), sub_owner_id)
        }
        // 3. No usable origin
        _ => IdentityKey::new(Context::Unknown, 0, 0),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
