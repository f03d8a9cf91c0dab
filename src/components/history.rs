use std::collections::VecDeque;

use uuid::Uuid;

use crate::canvas::{BlendMode, Document, Layer, Pixel};

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// A reversible document mutation.
///
/// Commands must be safe to `redo` even when the document no longer contains
/// the entities they reference: lookup failure degrades to a logged no-op so
/// the history stacks stay intact.
pub trait Command: Send + Sync {
    /// Forward mutation. Also used by `HistoryManager::execute` on first
    /// application — after-values are absolute, so re-applying is idempotent.
    fn redo(&self, doc: &mut Document);
    /// Reverse mutation.
    fn undo(&self, doc: &mut Document);
    fn description(&self) -> String;
    /// Estimated heap footprint, used for memory-bounded pruning.
    fn memory_size(&self) -> usize;
}

/// Estimated bytes per entry in a pixel diff list: 8 bytes of coordinates
/// plus 4 bytes of color.
const PIXEL_ENTRY_BYTES: usize = 12;

// ============================================================================
// PIXEL DIFF COMMAND — one stroke / fill / replace worth of pixel edits
// ============================================================================

/// Before/after pixel lists for a single layer. `before` is first-touch-wins,
/// `after` last-write-wins — both produced by the tool engine's per-stroke
/// bookkeeping.
pub struct PixelDiffCommand {
    description: String,
    layer_id: Uuid,
    before: Vec<Pixel>,
    after: Vec<Pixel>,
}

impl PixelDiffCommand {
    pub fn new(
        description: impl Into<String>,
        layer_id: Uuid,
        before: Vec<Pixel>,
        after: Vec<Pixel>,
    ) -> Self {
        Self {
            description: description.into(),
            layer_id,
            before,
            after,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.after.is_empty()
    }

    fn apply(&self, doc: &mut Document, pixels: &[Pixel]) {
        let Some(layer) = doc.layer_mut(self.layer_id) else {
            crate::log_warn!(
                "PixelDiffCommand: layer {} no longer exists, skipping",
                self.layer_id
            );
            return;
        };
        for p in pixels {
            layer.put_pixel(p.x as i32, p.y as i32, p.color);
        }
    }
}

impl Command for PixelDiffCommand {
    fn redo(&self, doc: &mut Document) {
        self.apply(doc, &self.after);
    }

    fn undo(&self, doc: &mut Document) {
        self.apply(doc, &self.before);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        (self.before.len() + self.after.len()) * PIXEL_ENTRY_BYTES
    }
}

// ============================================================================
// LAYER STRUCTURE COMMANDS
// ============================================================================

/// Insertion of a new layer. Holds the full layer snapshot so redo can
/// recreate it under the same id.
pub struct LayerInsertCommand {
    index: usize,
    snapshot: Layer,
    prev_active: Uuid,
}

impl LayerInsertCommand {
    pub fn new(index: usize, snapshot: Layer, prev_active: Uuid) -> Self {
        Self { index, snapshot, prev_active }
    }
}

impl Command for LayerInsertCommand {
    fn redo(&self, doc: &mut Document) {
        doc.insert_layer(self.index, self.snapshot.clone());
    }

    fn undo(&self, doc: &mut Document) {
        if doc.take_layer(self.snapshot.id).is_none() {
            crate::log_warn!("LayerInsertCommand: undo could not remove layer {}", self.snapshot.id);
        }
        if doc.layer(self.prev_active).is_some() {
            doc.active_layer_id = self.prev_active;
        }
    }

    fn description(&self) -> String {
        format!("Add Layer: {}", self.snapshot.name)
    }

    fn memory_size(&self) -> usize {
        self.snapshot.memory_bytes()
    }
}

/// Deletion of an existing layer, with the snapshot needed to restore it.
pub struct LayerRemoveCommand {
    index: usize,
    snapshot: Layer,
    prev_active: Uuid,
}

impl LayerRemoveCommand {
    pub fn new(index: usize, snapshot: Layer, prev_active: Uuid) -> Self {
        Self { index, snapshot, prev_active }
    }
}

impl Command for LayerRemoveCommand {
    fn redo(&self, doc: &mut Document) {
        if doc.take_layer(self.snapshot.id).is_none() {
            crate::log_warn!("LayerRemoveCommand: layer {} no longer exists, skipping", self.snapshot.id);
        }
    }

    fn undo(&self, doc: &mut Document) {
        doc.insert_layer(self.index, self.snapshot.clone());
        if doc.layer(self.prev_active).is_some() {
            doc.active_layer_id = self.prev_active;
        }
    }

    fn description(&self) -> String {
        format!("Delete Layer: {}", self.snapshot.name)
    }

    fn memory_size(&self) -> usize {
        self.snapshot.memory_bytes()
    }
}

/// Reorder of one layer by a single slot.
pub struct LayerMoveCommand {
    layer_id: Uuid,
    up: bool,
}

impl LayerMoveCommand {
    pub fn new(layer_id: Uuid, up: bool) -> Self {
        Self { layer_id, up }
    }
}

impl Command for LayerMoveCommand {
    fn redo(&self, doc: &mut Document) {
        if !doc.shift_layer(self.layer_id, self.up) {
            crate::log_warn!("LayerMoveCommand: move failed for layer {}", self.layer_id);
        }
    }

    fn undo(&self, doc: &mut Document) {
        if !doc.shift_layer(self.layer_id, !self.up) {
            crate::log_warn!("LayerMoveCommand: reverse move failed for layer {}", self.layer_id);
        }
    }

    fn description(&self) -> String {
        if self.up {
            "Move Layer Up".to_string()
        } else {
            "Move Layer Down".to_string()
        }
    }

    fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

// ============================================================================
// PROPERTY CHANGE COMMAND
// ============================================================================

/// Which layer property changed, with old and new values.
#[derive(Clone, Debug)]
pub enum LayerProperty {
    Opacity { old: f32, new: f32 },
    Visible { old: bool, new: bool },
    Locked { old: bool, new: bool },
    Blend { old: BlendMode, new: BlendMode },
    Name { old: String, new: String },
}

pub struct PropertyCommand {
    layer_id: Uuid,
    property: LayerProperty,
}

impl PropertyCommand {
    pub fn new(layer_id: Uuid, property: LayerProperty) -> Self {
        Self { layer_id, property }
    }

    fn apply(&self, doc: &mut Document, forward: bool) {
        let Some(layer) = doc.layer_mut(self.layer_id) else {
            crate::log_warn!("PropertyCommand: layer {} no longer exists, skipping", self.layer_id);
            return;
        };
        match &self.property {
            LayerProperty::Opacity { old, new } => {
                layer.opacity = if forward { *new } else { *old };
            }
            LayerProperty::Visible { old, new } => {
                layer.visible = if forward { *new } else { *old };
            }
            LayerProperty::Locked { old, new } => {
                layer.locked = if forward { *new } else { *old };
            }
            LayerProperty::Blend { old, new } => {
                layer.blend_mode = if forward { *new } else { *old };
            }
            LayerProperty::Name { old, new } => {
                layer.name = if forward { new.clone() } else { old.clone() };
            }
        }
    }
}

impl Command for PropertyCommand {
    fn redo(&self, doc: &mut Document) {
        self.apply(doc, true);
    }

    fn undo(&self, doc: &mut Document) {
        self.apply(doc, false);
    }

    fn description(&self) -> String {
        match &self.property {
            LayerProperty::Opacity { new, .. } => format!("Layer Opacity: {:.0}%", new * 100.0),
            LayerProperty::Visible { new, .. } => {
                if *new { "Show Layer".to_string() } else { "Hide Layer".to_string() }
            }
            LayerProperty::Locked { new, .. } => {
                if *new { "Lock Layer".to_string() } else { "Unlock Layer".to_string() }
            }
            LayerProperty::Blend { new, .. } => format!("Blend Mode: {}", new.label()),
            LayerProperty::Name { old, new } => format!("Rename: {} → {}", old, new),
        }
    }

    fn memory_size(&self) -> usize {
        let names = match &self.property {
            LayerProperty::Name { old, new } => old.len() + new.len(),
            _ => 0,
        };
        std::mem::size_of::<Self>() + names
    }
}

// ============================================================================
// STACK SNAPSHOT COMMAND — whole-stack undo for merge/flatten
// ============================================================================

/// Captures the full layer stack before and after a destructive structural
/// operation (merge-down, flatten). Construct before the operation, run it,
/// then call `set_after`.
pub struct StackSnapshotCommand {
    description: String,
    before: (Vec<Layer>, Uuid),
    after: Option<(Vec<Layer>, Uuid)>,
}

impl StackSnapshotCommand {
    pub fn new(description: impl Into<String>, doc: &Document) -> Self {
        Self {
            description: description.into(),
            before: (doc.layers.clone(), doc.active_layer_id),
            after: None,
        }
    }

    pub fn set_after(&mut self, doc: &Document) {
        self.after = Some((doc.layers.clone(), doc.active_layer_id));
    }

    fn restore(doc: &mut Document, snapshot: &(Vec<Layer>, Uuid)) {
        doc.layers = snapshot.0.clone();
        doc.active_layer_id = snapshot.1;
    }
}

impl Command for StackSnapshotCommand {
    fn redo(&self, doc: &mut Document) {
        if let Some(after) = &self.after {
            Self::restore(doc, after);
        } else {
            crate::log_warn!("StackSnapshotCommand: redo without captured after-state");
        }
    }

    fn undo(&self, doc: &mut Document) {
        Self::restore(doc, &self.before);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        let stack_bytes = |s: &(Vec<Layer>, Uuid)| s.0.iter().map(Layer::memory_bytes).sum::<usize>();
        stack_bytes(&self.before) + self.after.as_ref().map_or(0, stack_bytes)
    }
}

// ============================================================================
// COMPOSITE COMMAND
// ============================================================================

/// A group of sub-commands executed as one undoable unit: forward in order,
/// reverse in reverse order.
pub struct CompositeCommand {
    description: String,
    children: Vec<Box<dyn Command>>,
}

impl CompositeCommand {
    pub fn new(description: impl Into<String>, children: Vec<Box<dyn Command>>) -> Self {
        Self { description: description.into(), children }
    }
}

impl Command for CompositeCommand {
    fn redo(&self, doc: &mut Document) {
        for child in &self.children {
            child.redo(doc);
        }
    }

    fn undo(&self, doc: &mut Document) {
        for child in self.children.iter().rev() {
            child.undo(doc);
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.children.iter().map(|c| c.memory_size()).sum()
    }
}

// ============================================================================
// HISTORY MANAGER — undo/redo stacks with a memory ceiling
// ============================================================================

/// Default history memory ceiling: 50 MB.
pub const DEFAULT_MEMORY_LIMIT: usize = 50 * 1024 * 1024;

/// Undo/redo history with bounded memory.
///
/// Executing a new command clears the redo stack (branch invalidation for
/// linear history). When the running memory total exceeds the ceiling, the
/// oldest undo entries are evicted — but never the most recent one, so the
/// last edit always stays undoable even under extreme pressure.
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_memory_bytes: usize,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(max_memory_bytes: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_memory_bytes,
            total_memory: 0,
        }
    }

    /// Run the command's forward mutation and record it.
    pub fn execute(&mut self, command: Box<dyn Command>, doc: &mut Document) {
        command.redo(doc);
        self.record(command);
    }

    /// Record an already-applied command (e.g. a stroke diff whose pixels the
    /// tool engine wrote during the drag).
    pub fn record(&mut self, command: Box<dyn Command>) {
        // New edit invalidates any undone branch
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    pub fn undo(&mut self, doc: &mut Document) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(doc);
        // Memory ownership transfers between stacks; the total is unchanged
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, doc: &mut Document) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.redo(doc);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Current history memory usage (O(1), cached).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Evict oldest undo entries while over the ceiling, always keeping at
    /// least one entry so the latest edit remains undoable. A single oversized
    /// command can therefore still exceed the ceiling.
    fn prune(&mut self) {
        while self.total_memory > self.max_memory_bytes && self.undo_stack.len() > 1 {
            if let Some(evicted) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(evicted.memory_size());
            }
        }
    }
}
