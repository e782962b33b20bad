//! Source-Map URL Rewriter
//!
//! Bundles reference their maps by bare file name. When the maps are served
//! from elsewhere (a dev server, a CDN), every reference gets an absolute
//! prefix so browser tooling can find them.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;

use crate::bundler::{OutputFile, Plugin};
use crate::error::BuildResult;

lazy_static! {
    static ref SOURCE_MAP_URL_RE: Regex = Regex::new(r"(?m)^(//# sourceMappingURL=)(.*)$").unwrap();
}

/// Prefixes every `//# sourceMappingURL=` reference with `prefix`.
///
/// References that already start with `prefix` are left alone, which makes the
/// rewrite idempotent. An empty prefix returns the text unchanged.
pub fn rewrite_source_map_urls<'t>(text: &'t str, prefix: &str) -> Cow<'t, str> {
    if prefix.is_empty() {
        return Cow::Borrowed(text);
    }
    SOURCE_MAP_URL_RE.replace_all(text, |caps: &Captures| {
        let path = &caps[2];
        if path.starts_with(prefix) {
            format!("{}{}", &caps[1], path)
        } else {
            format!("{}{}{}", &caps[1], prefix, path)
        }
    })
}

/// Applies [`rewrite_source_map_urls`] to every `.js` output of a build.
#[derive(Debug, Clone)]
pub struct SourceMapUrlPlugin {
    prefix: String,
}

impl SourceMapUrlPlugin {
    pub fn new(prefix: impl Into<String>) -> Self {
        SourceMapUrlPlugin {
            prefix: prefix.into(),
        }
    }
}

impl Plugin for SourceMapUrlPlugin {
    fn name(&self) -> &str {
        "source-map-url"
    }

    fn on_end(&self, outputs: &mut Vec<OutputFile>) -> BuildResult<()> {
        for file in outputs.iter_mut().filter(|f| f.is_js()) {
            let text = file.text();
            if let Cow::Owned(rewritten) = rewrite_source_map_urls(&text, &self.prefix) {
                file.contents = rewritten.into_bytes();
            }
        }
        Ok(())
    }
}
