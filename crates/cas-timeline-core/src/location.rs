//! Where the shareable link lives.
//!
//! A terminal has no address bar, so [`MemoryLocation`] keeps a base URL plus
//! the current fragment and the TUI shows the resulting link for copying.

/// Default base URL for shareable links.
pub const DEFAULT_LINK_BASE: &str = "https://cas-timeline.local/";

/// Read/replace access to the current address.
pub trait Location {
    /// Current fragment without the leading `#`.
    fn fragment(&self) -> &str;

    /// Replace the fragment in place, without adding history.
    fn replace_fragment(&mut self, fragment: &str);

    /// Full shareable link.
    fn href(&self) -> String;
}

/// Split a link into `(base, fragment)`; the fragment excludes the `#`.
#[must_use]
pub fn split_link(link: &str) -> (&str, &str) {
    link.split_once('#').unwrap_or((link, ""))
}

/// In-memory address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLocation {
    base: String,
    fragment: String,
    replacements: usize,
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_BASE)
    }
}

impl MemoryLocation {
    /// Location at `base` with no fragment. Any fragment in `base` is dropped.
    #[must_use]
    pub fn new(base: &str) -> Self {
        let (base, _) = split_link(base);
        Self {
            base: base.to_string(),
            fragment: String::new(),
            replacements: 0,
        }
    }

    /// Location parsed from a full link, keeping its fragment.
    #[must_use]
    pub fn from_link(link: &str) -> Self {
        let (base, fragment) = split_link(link.trim());
        Self {
            base: base.to_string(),
            fragment: fragment.to_string(),
            replacements: 0,
        }
    }

    /// Follow a pasted link: a bare fragment (`#…` or `key=value…`) keeps the
    /// base, a full link replaces both.
    pub fn navigate(&mut self, link: &str) {
        let link = link.trim();
        if let Some(fragment) = link.strip_prefix('#') {
            self.fragment = fragment.to_string();
        } else if link.contains("://") {
            let (base, fragment) = split_link(link);
            self.base = base.to_string();
            self.fragment = fragment.to_string();
        } else {
            self.fragment = link.to_string();
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// How many times the fragment was rewritten by the app.
    #[must_use]
    pub const fn replacements(&self) -> usize {
        self.replacements
    }
}

impl Location for MemoryLocation {
    fn fragment(&self) -> &str {
        &self.fragment
    }

    fn replace_fragment(&mut self, fragment: &str) {
        self.fragment = fragment.to_string();
        self.replacements += 1;
    }

    fn href(&self) -> String {
        if self.fragment.is_empty() {
            self.base.clone()
        } else {
            format!("{}#{}", self.base, self.fragment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_omits_empty_fragment() {
        let mut loc = MemoryLocation::default();
        assert_eq!(loc.href(), DEFAULT_LINK_BASE);
        loc.replace_fragment("filter=Community");
        assert_eq!(loc.href(), "https://cas-timeline.local/#filter=Community");
        assert_eq!(loc.replacements(), 1);
    }

    #[test]
    fn from_link_splits_on_first_hash() {
        let loc = MemoryLocation::from_link("https://x.test/tl#q=a#b");
        assert_eq!(loc.base(), "https://x.test/tl");
        assert_eq!(loc.fragment(), "q=a#b");
    }

    #[test]
    fn navigate_handles_bare_and_full_links() {
        let mut loc = MemoryLocation::new("https://x.test/");
        loc.navigate("#sort=newest");
        assert_eq!(loc.fragment(), "sort=newest");
        loc.navigate("filter=Academics");
        assert_eq!(loc.fragment(), "filter=Academics");
        loc.navigate("https://y.test/page#year=2022");
        assert_eq!(loc.base(), "https://y.test/page");
        assert_eq!(loc.fragment(), "year=2022");
        loc.navigate("https://y.test/page");
        assert_eq!(loc.fragment(), "");
        assert_eq!(loc.replacements(), 0);
    }
}
