pub mod clock;
pub mod events;

use std::ops::Range;
use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::config::EngineConfig;
use crate::error::{Diagnostics, EngineError};
use crate::highlight::{word_bounds, HighlightResult, Highlighter, Layout};
use crate::index::{Indexer, LeafFilter, TextIndex};
use crate::ledger::{Ledger, RestoreReport};
use crate::locate::ChunkLocator;
use crate::substitute::{Dictionary, Substituter};
use crate::tree::{ContentTree, NodeId};
use crate::watch::{Invalidation, MutationWatcher};

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EngineEvent, EventBus};

/// A narration word-boundary callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryEvent {
    pub chunk_text: String,
    /// Character (not byte) offset within `chunk_text`.
    pub char_index: usize,
}

impl BoundaryEvent {
    pub fn new(chunk_text: impl Into<String>, char_index: usize) -> Self {
        Self {
            chunk_text: chunk_text.into(),
            char_index,
        }
    }
}

/// Before touching the tree, records produced by others are drained into the
/// watcher; after touching it, the records of the engine's own edits are
/// discarded. The watcher only ever sees external changes.
pub struct Engine<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,
    indexer: Indexer,
    index: Arc<TextIndex>,
    dirty: bool,
    indexed_with_wrapper: bool,
    watcher: MutationWatcher,
    locator: ChunkLocator,
    highlighter: Highlighter,
    dictionary: Dictionary,
    substituter: Substituter,
    ledger: Ledger,
    highlight_enabled: bool,
    substitution_enabled: bool,
    // last resolved narration offset, valid for one index version
    hint: Option<(u64, usize)>,
    diagnostics: Diagnostics,
    events: EventBus,
}

impl Engine<SystemClock> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        let mut diagnostics = Diagnostics::new(config.diagnostics_capacity);
        let dictionary = Dictionary::new();
        let substituter = Substituter::compile(&dictionary, &config, &mut diagnostics);
        Self {
            indexer: Indexer::new(config.rebuild_interval()),
            index: Arc::new(TextIndex::empty()),
            dirty: true,
            indexed_with_wrapper: false,
            watcher: MutationWatcher::new(&config),
            locator: ChunkLocator::new(&config),
            highlighter: Highlighter::new(&config),
            dictionary,
            substituter,
            ledger: Ledger::new(),
            highlight_enabled: config.highlight_enabled,
            substitution_enabled: config.substitution_enabled,
            hint: None,
            diagnostics,
            events: EventBus::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current snapshot.
    pub fn index(&self) -> &TextIndex {
        &self.index
    }

    /// A handle to the current snapshot that outlives later rebuilds.
    pub fn snapshot(&self) -> Arc<TextIndex> {
        Arc::clone(&self.index)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Buffer range of the live highlight.
    pub fn highlighted(&self) -> Option<Range<usize>> {
        self.highlighter.current().map(|w| w.range())
    }

    /// The wrapper element, while a highlight is live.
    pub fn highlight_element(&self) -> Option<NodeId> {
        self.highlighter.current().map(|w| w.element())
    }

    pub fn is_highlight_enabled(&self) -> bool {
        self.highlight_enabled
    }

    pub fn is_substitution_enabled(&self) -> bool {
        self.substitution_enabled
    }

    /// Whether a rebuild is owed: pending in the watcher, or skipped by the
    /// throttle.
    pub fn is_stale(&self) -> bool {
        self.dirty || self.watcher.is_pending()
    }

    /// Start working on `tree`: substitute (when enabled) and build the first
    /// index.
    pub fn attach<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        let stale = tree.take_records().len();
        tracing::debug!(stale, "attaching to tree");
        if self.substitution_enabled {
            self.substitute_everywhere(tree);
        }
        self.rebuild(tree, true);
    }

    /// Drain the tree's pending records into the watcher.
    pub fn sync<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        let records = tree.take_records();
        if records.is_empty() {
            return;
        }
        self.watcher.observe(records, self.clock.now());
    }

    /// Scheduler callback. Applies a settled invalidation (substitution on
    /// what changed, then a throttled rebuild) or retries a rebuild the
    /// throttle skipped. Returns whether the index was rebuilt.
    pub fn tick<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> bool {
        self.sync(tree);
        if let Some(invalidation) = self.watcher.poll(self.clock.now()) {
            return self.handle_invalidation(tree, invalidation, false);
        }
        if self.dirty {
            return self.rebuild(tree, false);
        }
        false
    }

    /// Narration callback: highlight the word the event points at.
    pub fn on_word_boundary<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        event: &BoundaryEvent,
    ) -> HighlightResult {
        if !self.highlight_enabled {
            return HighlightResult::Nothing;
        }
        self.refresh(tree);

        let offset = match self.resolve(event) {
            Some(offset) => offset,
            None => {
                // the text may have arrived without a record reaching us yet
                self.sync(tree);
                if let Some(invalidation) = self.watcher.flush() {
                    self.handle_invalidation(tree, invalidation, true);
                } else {
                    self.rebuild(tree, true);
                }
                match self.resolve(event) {
                    Some(offset) => offset,
                    None => {
                        self.diagnostics.record(EngineError::ChunkNotFound {
                            chunk: event.chunk_text.clone(),
                        });
                        return HighlightResult::Nothing;
                    }
                }
            }
        };
        self.hint = Some((self.index.version(), offset));

        match word_bounds(self.index.buffer(), offset) {
            Some(word) => self.apply_highlight(tree, word.start, word.end),
            None => HighlightResult::Nothing,
        }
    }

    fn resolve(&self, event: &BoundaryEvent) -> Option<usize> {
        let version = self.index.version();
        let approx = match self.hint {
            Some((v, offset)) if v == version => offset,
            _ => 0,
        };
        self.locator
            .resolve(&self.index, &event.chunk_text, event.char_index, approx)
    }

    pub fn highlight_range<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        start: usize,
        end: usize,
    ) -> HighlightResult {
        if !self.highlight_enabled {
            return HighlightResult::Nothing;
        }
        self.refresh(tree);
        self.apply_highlight(tree, start, end)
    }

    /// Highlight the whitespace-delimited word around `offset`.
    pub fn highlight_word<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        offset: usize,
    ) -> HighlightResult {
        if !self.highlight_enabled {
            return HighlightResult::Nothing;
        }
        self.refresh(tree);
        match word_bounds(self.index.buffer(), offset) {
            Some(word) => self.apply_highlight(tree, word.start, word.end),
            None => HighlightResult::Nothing,
        }
    }

    fn apply_highlight<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        start: usize,
        end: usize,
    ) -> HighlightResult {
        if self.highlighter.is_current_start(&self.index, start) {
            return HighlightResult::Unchanged;
        }
        if self.indexed_with_wrapper && self.highlighter.is_active() {
            // The map points into the wrapper's pieces; once they go, so does
            // the map. `start` was resolved against the current buffer and
            // clearing does not change the visible text, so it carries over.
            self.clear_inner(tree);
            self.rebuild(tree, true);
        }

        let was_active = self.highlighter.is_active();
        let index = Arc::clone(&self.index);
        let result =
            self.highlighter
                .highlight_range(tree, &index, start, end, &mut self.diagnostics);
        self.discard_own(tree);

        match &result {
            HighlightResult::Highlighted(range) => {
                self.events.emit(EngineEvent::HighlightChanged {
                    range: range.clone(),
                });
            }
            HighlightResult::Nothing if was_active => {
                self.events.emit(EngineEvent::HighlightCleared);
            }
            _ => {}
        }
        result
    }

    /// Remove the highlight. Safe to call when nothing is highlighted.
    pub fn clear_highlight<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> bool {
        self.sync(tree);
        self.clear_inner(tree)
    }

    fn clear_inner<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> bool {
        let cleared = self.highlighter.clear(tree, &mut self.diagnostics);
        self.discard_own(tree);
        if cleared {
            if self.indexed_with_wrapper {
                self.dirty = true;
                self.indexed_with_wrapper = false;
            }
            self.events.emit(EngineEvent::HighlightCleared);
        }
        cleared
    }

    /// Frame callback; scrolls a fresh highlight into view if it is not
    /// visible.
    pub fn on_frame<T, L>(&mut self, tree: &T, layout: &mut L) -> bool
    where
        T: ContentTree + ?Sized,
        L: Layout + ?Sized,
    {
        self.highlighter.on_frame(tree, layout)
    }

    pub fn set_highlight_enabled<T: ContentTree + ?Sized>(&mut self, tree: &mut T, enabled: bool) {
        self.highlight_enabled = enabled;
        if !enabled {
            self.clear_highlight(tree);
        }
    }

    /// Swap the dictionary. Anything the old one rewrote is restored first
    /// when substitution is on.
    pub fn set_dictionary<T: ContentTree + ?Sized>(&mut self, tree: &mut T, dictionary: Dictionary) {
        self.substituter = Substituter::compile(&dictionary, &self.config, &mut self.diagnostics);
        self.dictionary = dictionary;
        if !self.substitution_enabled {
            return;
        }
        self.sync(tree);
        self.clear_inner(tree);
        let report = self.ledger.restore(tree);
        self.discard_own(tree);
        tracing::debug!(restored = report.restored, "previous substitutions reverted");
        self.substitute_everywhere(tree);
    }

    pub fn set_substitution_enabled<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        enabled: bool,
    ) {
        if enabled == self.substitution_enabled {
            return;
        }
        self.substitution_enabled = enabled;
        if enabled {
            self.sync(tree);
            self.substitute_everywhere(tree);
        } else {
            self.restore(tree);
        }
    }

    /// Put back every original the ledger holds.
    pub fn restore<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> RestoreReport {
        self.sync(tree);
        self.clear_inner(tree);
        let report = self.ledger.restore(tree);
        self.discard_own(tree);
        if report.restored > 0 {
            self.dirty = true;
        }
        self.events.emit(EngineEvent::RestoreCompleted {
            restored: report.restored,
            dropped: report.dropped,
        });
        report
    }

    fn substitute_everywhere<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        if self.substituter.is_empty() {
            return;
        }
        self.clear_inner(tree);
        let root = tree.root();
        let count = self.substituter.apply_subtree(
            tree,
            root,
            &self.config,
            &mut self.ledger,
            &mut self.diagnostics,
        );
        self.discard_own(tree);
        if count > 0 {
            self.dirty = true;
            tracing::debug!(count, "substitution pass");
            self.events.emit(EngineEvent::SubstitutionApplied {
                replacements: count,
            });
        }
    }

    /// Substitute into what changed, then rebuild. Returns whether the
    /// rebuild ran; a throttled one leaves the index dirty for the next tick.
    fn handle_invalidation<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        inv: Invalidation,
        force: bool,
    ) -> bool {
        if self.substitution_enabled && !self.substituter.is_empty() {
            let filter = LeafFilter::new(&self.config);
            let mut count = 0;
            for &node in inv.added.iter().chain(&inv.text_changed) {
                if self.highlighter.owns(node) || !tree.is_attached(node) {
                    continue;
                }
                count += self.substituter.apply_subtree(
                    tree,
                    node,
                    &self.config,
                    &mut self.ledger,
                    &mut self.diagnostics,
                );
            }
            for (element, name) in &inv.attributes {
                if !filter.is_qualifying_element(tree, *element) {
                    continue;
                }
                match self
                    .substituter
                    .apply_attribute(tree, *element, name, &mut self.ledger)
                {
                    Ok(n) => count += n,
                    Err(err) => self.diagnostics.record(err.into()),
                }
            }
            self.discard_own(tree);
            if count > 0 {
                self.events.emit(EngineEvent::SubstitutionApplied {
                    replacements: count,
                });
            }
        }
        self.rebuild(tree, force)
    }

    /// Bring the index up to date before resolving against it.
    fn refresh<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        self.sync(tree);
        if let Some(invalidation) = self.watcher.flush() {
            self.handle_invalidation(tree, invalidation, true);
        } else if self.dirty {
            self.rebuild(tree, true);
        }
    }

    fn rebuild<T: ContentTree + ?Sized>(&mut self, tree: &T, force: bool) -> bool {
        let now = self.clock.now();
        let Some(index) = self.indexer.rebuild(tree, &self.config, now, force) else {
            self.dirty = true;
            return false;
        };
        let previous = self.index.version();
        if let Some(wrapper) = self.highlighter.current() {
            // offsets held by the live highlight now belong to an old version;
            // the next request re-resolves instead of comparing against them
            let stale = EngineError::IndexStale {
                expected: wrapper.version(),
                found: index.version(),
            };
            tracing::trace!(%stale, "highlight predates snapshot");
        }
        self.index = Arc::new(index);
        self.dirty = false;
        self.indexed_with_wrapper = self.highlighter.is_active();
        self.hint = None;
        tracing::debug!(previous, version = self.index.version(), "snapshot replaced");
        self.events.emit(EngineEvent::IndexRebuilt {
            version: self.index.version(),
            len: self.index.len(),
        });
        true
    }

    fn discard_own<T: ContentTree + ?Sized>(&mut self, tree: &mut T) {
        let own = tree.take_records().len();
        if own > 0 {
            tracing::trace!(own, "discarded own mutation records");
        }
    }
}
