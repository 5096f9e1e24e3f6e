//! HTML sanitization for post bodies.
//!
//! Feed content is untrusted and is embedded directly into the rendered
//! grid, so it is cleaned with a user-generated-content allow-list before
//! it is stored.

use std::fmt;

/// HTML that has been through [`sanitize`].
///
/// There is no other public constructor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedHtml(String);

impl SanitizedHtml {
    /// The sanitized markup.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip scripts, styles, event handlers and unsafe URLs from `raw`.
///
/// Text formatting, links and images are kept. Links get
/// `rel="noopener noreferrer"`.
pub fn sanitize(raw: &str) -> SanitizedHtml {
    if raw.is_empty() {
        return SanitizedHtml::default();
    }
    SanitizedHtml(ammonia::clean(raw))
}
