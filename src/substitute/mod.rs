pub mod case;
pub mod morphology;

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Diagnostics, EngineError};
use crate::index::LeafFilter;
use crate::ledger::Ledger;
use crate::tree::{ContentTree, NodeId, NodeKind, TreeError};

pub use case::CasePattern;
pub use morphology::{inflect, StemForm, SuffixClass};

/// Base word -> replacement. Keys are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Dictionary {
    entries: BTreeMap<String, String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str, replacement: &str) {
        self.entries.insert(word.to_lowercase(), replacement.to_string());
    }

    pub fn get(&self, word: &str) -> Option<&str> {
        self.entries.get(&word.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("dictionary must be a JSON object of strings")
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dictionary {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl From<BTreeMap<String, String>> for Dictionary {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in &map {
            dict.insert(k, v);
        }
        dict
    }
}

impl From<Dictionary> for BTreeMap<String, String> {
    fn from(dict: Dictionary) -> Self {
        dict.entries
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k.as_ref(), v.as_ref());
        }
        dict
    }
}

/// Why a key cannot take part in the pattern, if it can't.
fn key_problem(key: &str) -> Option<&'static str> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    if key.is_empty() {
        return Some("empty key");
    }
    if key.trim() != key {
        return Some("leading or trailing whitespace");
    }
    let first = key.chars().next().is_some_and(is_word);
    let last = key.chars().next_back().is_some_and(is_word);
    if !first || !last {
        return Some("must start and end with a word character");
    }
    None
}

/// A surface form the pattern can match, and the key it stands for.
#[derive(Debug, Clone)]
struct Surface {
    key: String,
    form: StemForm,
}

#[derive(Debug, Default)]
pub struct Substituter {
    pattern: Option<Regex>,
    replacements: HashMap<String, String>,
    surfaces: HashMap<String, Vec<Surface>>,
}

impl Substituter {
    /// Compile `dict`. Malformed keys are left out and recorded; an empty
    /// (or entirely malformed) dictionary yields a substituter that never
    /// matches.
    pub fn compile(dict: &Dictionary, config: &EngineConfig, diag: &mut Diagnostics) -> Self {
        let mut replacements = HashMap::new();
        let mut surfaces: HashMap<String, Vec<Surface>> = HashMap::new();

        for (key, replacement) in dict.iter() {
            if let Some(reason) = key_problem(key) {
                tracing::warn!(key, reason, "dictionary key excluded");
                diag.record(EngineError::PatternCompileFailure {
                    key: key.to_string(),
                    reason: reason.to_string(),
                });
                continue;
            }
            replacements.insert(key.to_string(), replacement.to_string());
            surfaces.entry(key.to_string()).or_default().push(Surface {
                key: key.to_string(),
                form: StemForm::Key,
            });
            for (stem, form) in morphology::derived_stems(key) {
                surfaces.entry(stem).or_default().push(Surface {
                    key: key.to_string(),
                    form,
                });
            }
        }

        if surfaces.is_empty() {
            return Self::default();
        }

        let mut alternatives: Vec<&str> = surfaces.keys().map(String::as_str).collect();
        // longest first so no key shadows a longer one containing it
        alternatives.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let alternation = alternatives
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let source = format!(
            r"\b(?P<base>{alternation})(?P<suffix>ing|est|ed|es|er|ly|st|s|d|r)?\b(?P<poss>['’]s\b|['’])?"
        );

        match RegexBuilder::new(&source)
            .case_insensitive(true)
            .size_limit(config.regex_size_limit)
            .build()
        {
            Ok(pattern) => {
                tracing::debug!(
                    keys = replacements.len(),
                    surfaces = surfaces.len(),
                    "substitution pattern compiled"
                );
                Self {
                    pattern: Some(pattern),
                    replacements,
                    surfaces,
                }
            }
            Err(err) => {
                tracing::warn!(%err, "substitution pattern failed to compile");
                diag.record(EngineError::PatternCompileFailure {
                    key: format!("<{} keys>", replacements.len()),
                    reason: err.to_string(),
                });
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Rewrite every valid match in `text`. `None` when nothing changed;
    /// otherwise the new text and the number of replacements.
    pub fn replace_text(&self, text: &str) -> Option<(String, usize)> {
        let pattern = self.pattern.as_ref()?;
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut count = 0;

        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some(replacement) = self.rewrite(&caps) else {
                continue;
            };
            if replacement == whole.as_str() {
                continue;
            }
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
            count += 1;
        }

        if count == 0 {
            return None;
        }
        out.push_str(&text[last..]);
        Some((out, count))
    }

    /// Replacement for one match, or `None` when base and suffix do not form
    /// a valid inflection of any key.
    fn rewrite(&self, caps: &Captures<'_>) -> Option<String> {
        let base = caps.name("base")?.as_str();
        let suffix = caps.name("suffix").map_or("", |m| m.as_str());
        let poss = caps.name("poss").map_or("", |m| m.as_str());

        let candidates = self.surfaces.get(&base.to_lowercase())?;
        // derived stems are the more specific reading when they accept the suffix
        let surface = candidates
            .iter()
            .filter(|s| s.form != StemForm::Key)
            .chain(candidates.iter().filter(|s| s.form == StemForm::Key))
            .find(|s| morphology::accepts(s.form, suffix, s.key.ends_with('e')))?;
        let replacement = self.replacements.get(&surface.key)?;

        let class = SuffixClass::classify(suffix)?;
        let word = &caps.get(0)?.as_str()[..base.len() + suffix.len()];
        let inflected = CasePattern::of(word).apply(&inflect(replacement, class));
        Some(format!("{inflected}{poss}"))
    }

    /// Substitute inside one text leaf, recording its original first.
    pub fn apply_leaf<T: ContentTree + ?Sized>(
        &self,
        tree: &mut T,
        leaf: NodeId,
        ledger: &mut Ledger,
    ) -> Result<usize, TreeError> {
        let text = tree.text(leaf).ok_or(TreeError::NotText(leaf))?;
        let Some((replaced, count)) = self.replace_text(text) else {
            return Ok(0);
        };
        let original = text.to_string();
        tree.set_text(leaf, &replaced)?;
        ledger.record_text(leaf, &original);
        Ok(count)
    }

    /// Substitute inside one attribute value, recording its original first.
    pub fn apply_attribute<T: ContentTree + ?Sized>(
        &self,
        tree: &mut T,
        element: NodeId,
        name: &str,
        ledger: &mut Ledger,
    ) -> Result<usize, TreeError> {
        let Some(value) = tree.attribute(element, name) else {
            return Ok(0);
        };
        let Some((replaced, count)) = self.replace_text(value) else {
            return Ok(0);
        };
        let original = value.to_string();
        tree.set_attribute(element, name, &replaced)?;
        ledger.record_attribute(element, name, &original);
        Ok(count)
    }

    /// Substitute through every qualifying leaf and allow-listed attribute
    /// under `root` (inclusive). One failing node does not stop the pass.
    pub fn apply_subtree<T: ContentTree + ?Sized>(
        &self,
        tree: &mut T,
        root: NodeId,
        config: &EngineConfig,
        ledger: &mut Ledger,
        diag: &mut Diagnostics,
    ) -> usize {
        if self.is_empty() {
            return 0;
        }
        let filter = LeafFilter::new(config);
        let mut count = 0;

        let leaves = match tree.kind(root) {
            Some(NodeKind::Text) => vec![root],
            Some(NodeKind::Element) => filter.text_leaves(tree, root),
            None => {
                diag.record(EngineError::NodeDetached(root));
                return 0;
            }
        };
        for leaf in leaves {
            if !filter.is_qualifying_leaf(tree, leaf) {
                continue;
            }
            match self.apply_leaf(tree, leaf, ledger) {
                Ok(n) => count += n,
                Err(err) => diag.record(err.into()),
            }
        }

        if tree.kind(root) == Some(NodeKind::Element) && filter.is_qualifying_element(tree, root) {
            for element in filter.attribute_elements(tree, root) {
                for name in &config.attribute_allowlist {
                    match self.apply_attribute(tree, element, name, ledger) {
                        Ok(n) => count += n,
                        Err(err) => diag.record(err.into()),
                    }
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Document, NodeSpec};

    fn compile(pairs: &[(&str, &str)]) -> (Substituter, Diagnostics) {
        let dict: Dictionary = pairs.iter().copied().collect();
        let mut diag = Diagnostics::default();
        let sub = Substituter::compile(&dict, &EngineConfig::default(), &mut diag);
        (sub, diag)
    }

    fn replace(sub: &Substituter, text: &str) -> String {
        sub.replace_text(text).map_or_else(|| text.to_string(), |(t, _)| t)
    }

    #[test]
    fn test_hate_dislike_morphology() {
        let (sub, _) = compile(&[("hate", "dislike")]);
        assert_eq!(replace(&sub, "I HATE this"), "I DISLIKE this");
        assert_eq!(replace(&sub, "hated this"), "disliked this");
        assert_eq!(replace(&sub, "hating this"), "disliking this");
        assert_eq!(replace(&sub, "hates this"), "dislikes this");
        assert_eq!(replace(&sub, "Hate it"), "Dislike it");
        assert_eq!(replace(&sub, "HATED"), "DISLIKED");
    }

    #[test]
    fn test_whole_words_only() {
        let (sub, _) = compile(&[("hate", "dislike"), ("cat", "dog")]);
        assert_eq!(replace(&sub, "whatever hateful hat"), "whatever hateful hat");
        assert_eq!(replace(&sub, "concatenate the cat"), "concatenate the dog");
        assert!(sub.replace_text("nothing here").is_none());
    }

    #[test]
    fn test_possessive_and_plural() {
        let (sub, _) = compile(&[("cat", "dog"), ("box", "crate")]);
        assert_eq!(replace(&sub, "the cat's toy"), "the dog's toy");
        assert_eq!(replace(&sub, "the cats' toys"), "the dogs' toys");
        assert_eq!(replace(&sub, "two boxes"), "two crates");
    }

    #[test]
    fn test_derived_stems_and_rules() {
        let (sub, _) = compile(&[("happy", "glad"), ("stop", "halt"), ("city", "town")]);
        assert_eq!(replace(&sub, "happier days"), "glader days");
        assert_eq!(replace(&sub, "stopping now"), "halting now");
        assert_eq!(replace(&sub, "it stopped"), "it halted");
        assert_eq!(replace(&sub, "cities"), "towns");
    }

    #[test]
    fn test_longest_key_wins() {
        let (sub, _) = compile(&[("ice", "snow"), ("ice cream", "gelato")]);
        assert_eq!(replace(&sub, "ice cream and ice"), "gelato and snow");
    }

    #[test]
    fn test_malformed_keys_excluded() {
        let (sub, diag) = compile(&[("", "x"), (" cat", "x"), ("-ish", "x"), ("dog", "wolf")]);
        assert_eq!(diag.len(), 3);
        assert!(diag
            .iter()
            .all(|e| matches!(e, EngineError::PatternCompileFailure { .. })));
        assert_eq!(replace(&sub, "a dog"), "a wolf");
    }

    #[test]
    fn test_empty_dictionary() {
        let (sub, diag) = compile(&[]);
        assert!(sub.is_empty());
        assert!(diag.is_empty());
        assert!(sub.replace_text("The quick brown fox").is_none());
    }

    #[test]
    fn test_subtree_records_originals() {
        let spec = NodeSpec::element(
            "body",
            vec![
                NodeSpec::element("p", vec![NodeSpec::text("I hate rain")]),
                NodeSpec::element("script", vec![NodeSpec::text("hate()")]),
                NodeSpec::element("img", vec![]).with_attr("alt", "hated").with_attr("src", "hate.png"),
            ],
        );
        let mut doc = Document::from_spec(&spec).unwrap();
        let root = doc.root();
        let (sub, mut diag) = compile(&[("hate", "dislike")]);
        let config = EngineConfig::default();
        let mut ledger = Ledger::new();

        let count = sub.apply_subtree(&mut doc, root, &config, &mut ledger, &mut diag);
        assert_eq!(count, 2);
        assert_eq!(doc.text_content(root), "I dislike rainhate()");
        let img = doc.children(root)[2];
        assert_eq!(doc.attribute(img, "alt"), Some("disliked"));
        assert_eq!(doc.attribute(img, "src"), Some("hate.png"));
        assert_eq!(ledger.len(), 2);

        // a second pass finds nothing new and keeps the true originals
        assert_eq!(sub.apply_subtree(&mut doc, root, &config, &mut ledger, &mut diag), 0);
        ledger.restore(&mut doc);
        assert_eq!(doc.text_content(root), "I hate rainhate()");
        assert_eq!(doc.attribute(img, "alt"), Some("hated"));
    }

    #[test]
    fn test_dictionary_json_lowercases_keys() {
        let dict = Dictionary::from_json(r#"{"Hate": "dislike"}"#).unwrap();
        assert_eq!(dict.get("HATE"), Some("dislike"));
        assert!(Dictionary::from_json("[1, 2]").is_err());
    }
}
