use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between two non-forced index rebuilds.
    pub rebuild_interval_ms: u64,
    /// Coalescing window for mutation-triggered work.
    pub debounce_ms: u64,

    /// Half-width of the locator's first, windowed search (bytes).
    pub search_window: usize,
    /// Head length tried after the full fragment fails (chars).
    pub head_prefix_chars: usize,
    /// Shrinking-prefix ladder: start, floor and step (chars).
    pub prefix_max_chars: usize,
    pub prefix_min_chars: usize,
    pub prefix_step_chars: usize,

    /// Prefix length used when re-resolving a span inside a live leaf.
    pub live_prefix_chars: usize,
    /// Wrap the whole leaf when a span cannot be re-resolved in it.
    pub widen_on_failure: bool,
    /// Inset applied to the viewport before deciding a wrapper is visible.
    pub scroll_margin: f32,
    pub wrapper_tag: String,
    pub wrapper_class: String,

    /// Containers whose text is never indexed nor substituted.
    pub excluded_tags: Vec<String>,
    /// Editable fields, skipped like excluded containers.
    pub editable_tags: Vec<String>,
    /// Attributes the substitution engine rewrites and the watcher reacts to.
    pub attribute_allowlist: Vec<String>,

    pub highlight_enabled: bool,
    pub substitution_enabled: bool,

    /// Upper bound for the compiled dictionary pattern, in bytes.
    pub regex_size_limit: usize,
    pub diagnostics_capacity: usize,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid engine config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_millis(self.rebuild_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_excluded_tag(&self, tag: &str) -> bool {
        self.excluded_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_editable_tag(&self, tag: &str) -> bool {
        self.editable_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_allowlisted_attribute(&self, name: &str) -> bool {
        self.attribute_allowlist
            .iter()
            .any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            rebuild_interval_ms: 300,
            debounce_ms: 220,
            search_window: 8_000,
            head_prefix_chars: 60,
            prefix_max_chars: 80,
            prefix_min_chars: 12,
            prefix_step_chars: 12,
            live_prefix_chars: 12,
            widen_on_failure: true,
            scroll_margin: 48.0,
            wrapper_tag: "mark".to_string(),
            wrapper_class: "livetext-highlight".to_string(),
            excluded_tags: strings(&[
                "script", "style", "noscript", "template", "iframe", "object", "embed", "video",
                "audio", "canvas", "svg", "math", "select", "head",
            ]),
            editable_tags: strings(&["textarea", "input"]),
            attribute_allowlist: strings(&[
                "alt",
                "title",
                "placeholder",
                "aria-label",
                "aria-describedby",
            ]),
            highlight_enabled: true,
            substitution_enabled: false,
            regex_size_limit: 10 * (1 << 20),
            diagnostics_capacity: 64,
        }
    }
}
