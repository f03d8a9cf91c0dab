//! The editor session: one open document plus everything that edits it.
//!
//! All state is explicit — the session owns the document, the undo history,
//! the tool engine, the sync queue, and the cached composite. Hosts construct
//! one session per open document and drive it with pointer events and a
//! per-frame [`EditorSession::tick`].

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::canvas::{BlendMode, Document, Layer, Pixel, PlayerModel, SkinFormat};
use crate::components::history::{
    HistoryManager, LayerInsertCommand, LayerMoveCommand, LayerProperty, LayerRemoveCommand,
    PixelDiffCommand, PropertyCommand, StackSnapshotCommand,
};
use crate::components::tools::{Selection, ToolContext, ToolEngine, ToolKind, ToolResult};
use crate::geometry::SymmetryMode;
use crate::regions::SkinRegion;
use crate::sync::{SyncEvent, SyncManager, ViewOrigin};

pub struct EditorSession {
    pub document: Document,
    pub history: HistoryManager,
    pub sync: SyncManager,
    engine: ToolEngine,

    pub primary_color: Rgba<u8>,
    pub secondary_color: Rgba<u8>,
    pub brush_size: u32,
    pub brush_opacity: f32,
    pub symmetry: SymmetryMode,
    pub paint_target: SkinRegion,
    pub selection: Option<Selection>,

    /// Flattened document, refreshed lazily in [`Self::tick`].
    composite_cache: RgbaImage,
    composite_requested: bool,
    /// Transient overlay from the in-flight shape tool, cleared on commit.
    pub preview_pixels: Vec<Pixel>,
    /// Whether the in-flight stroke paints with the secondary color.
    stroke_secondary: bool,
}

impl EditorSession {
    pub fn new(format: SkinFormat, model: PlayerModel, name: impl Into<String>) -> Self {
        Self::with_document(Document::new(format, model, name))
    }

    pub fn with_document(document: Document) -> Self {
        let composite_cache = document.composite();
        Self {
            document,
            history: HistoryManager::default(),
            sync: SyncManager::new(),
            engine: ToolEngine::default(),
            primary_color: Rgba([0, 0, 0, 255]),
            secondary_color: Rgba([255, 255, 255, 255]),
            brush_size: 1,
            brush_opacity: 1.0,
            symmetry: SymmetryMode::None,
            paint_target: SkinRegion::Base,
            selection: None,
            composite_cache,
            composite_requested: false,
            preview_pixels: Vec::new(),
            stroke_secondary: false,
        }
    }

    // ---- tool selection -----------------------------------------------------

    pub fn tool(&self) -> ToolKind {
        self.engine.kind()
    }

    /// Switch tools, aborting any in-flight gesture first.
    pub fn set_tool(&mut self, kind: ToolKind) {
        if self.engine.is_stroke_active() {
            self.cancel_stroke();
        }
        self.engine.set_kind(kind);
        self.preview_pixels.clear();
    }

    // ---- pointer lifecycle --------------------------------------------------

    pub fn pointer_down(&mut self, x: i32, y: i32, use_secondary: bool) {
        match self.document.active_layer() {
            Some(layer) if layer.locked => {
                crate::log_warn!("pointer_down: active layer '{}' is locked", layer.name);
                return;
            }
            None => return,
            _ => {}
        }
        self.stroke_secondary = use_secondary;
        self.dispatch(x, y, PointerPhase::Down);
    }

    pub fn pointer_move(&mut self, x: i32, y: i32) {
        if !self.engine.is_stroke_active() {
            return;
        }
        self.dispatch(x, y, PointerPhase::Move);
    }

    pub fn pointer_up(&mut self, x: i32, y: i32) {
        if !self.engine.is_stroke_active() {
            return;
        }
        self.dispatch(x, y, PointerPhase::Up);
    }

    fn dispatch(&mut self, x: i32, y: i32, phase: PointerPhase) {
        let (primary, secondary) = if self.stroke_secondary {
            (self.secondary_color, self.primary_color)
        } else {
            (self.primary_color, self.secondary_color)
        };
        let brush_size = self.brush_size;
        let brush_opacity = self.brush_opacity;
        let symmetry = self.symmetry;
        let paint_target = self.paint_target;
        let (width, height) = (self.document.width, self.document.height);

        let Some(layer) = self.document.active_layer_mut() else {
            return;
        };
        let layer_id = layer.id;
        let mut ctx = ToolContext {
            layer_id,
            pixels: &mut layer.pixels,
            composite: Some(&self.composite_cache),
            primary_color: primary,
            secondary_color: secondary,
            brush_size,
            brush_opacity,
            symmetry,
            paint_target,
            width,
            height,
        };
        let result = match phase {
            PointerPhase::Down => self.engine.on_start(&mut ctx, x, y),
            PointerPhase::Move => self.engine.on_move(&mut ctx, x, y),
            PointerPhase::Up => self.engine.on_end(&mut ctx, x, y),
        };
        self.apply_result(result, layer_id);
    }

    fn apply_result(&mut self, result: ToolResult, layer_id: Uuid) {
        if let Some(color) = result.picked_color {
            if self.stroke_secondary {
                self.secondary_color = color;
            } else {
                self.primary_color = color;
            }
        }
        if let Some(preview) = result.preview_pixels {
            self.preview_pixels = preview;
        }
        if result.selection_changed {
            self.selection = result.selection;
            self.sync.emit(SyncEvent::SelectionChange { selection: result.selection });
        }

        if result.changed_pixels.is_empty() {
            return;
        }

        if result.is_complete {
            // The engine already wrote the pixels; record the diff without
            // re-applying it
            let command = PixelDiffCommand::new(
                self.engine.kind().label(),
                layer_id,
                result.original_pixels,
                result.changed_pixels.clone(),
            );
            self.history.record(Box::new(command));
        }
        self.sync.emit(SyncEvent::PixelChange { pixels: result.changed_pixels });
        self.request_composite();
        self.document.touch();
    }

    /// Abort the in-flight stroke, restoring every pixel it wrote. Nothing
    /// reaches history.
    pub fn cancel_stroke(&mut self) {
        if !self.engine.is_stroke_active() {
            return;
        }
        let originals = self.engine.stroke_originals(self.document.width);
        self.engine.reset();
        self.preview_pixels.clear();
        if originals.is_empty() {
            return;
        }
        if let Some(layer) = self.document.active_layer_mut() {
            for p in &originals {
                layer.put_pixel(p.x as i32, p.y as i32, p.color);
            }
        }
        self.sync.emit(SyncEvent::PixelChange { pixels: originals });
        self.request_composite();
    }

    // ---- frame loop ---------------------------------------------------------

    /// Per-frame maintenance: recomposite if anything changed, then deliver
    /// queued sync events coalesced.
    pub fn tick(&mut self) {
        if self.composite_requested {
            self.composite_cache = self.document.composite();
            self.composite_requested = false;
        }
        self.sync.flush();
    }

    pub fn composite(&self) -> &RgbaImage {
        &self.composite_cache
    }

    pub fn request_composite(&mut self) {
        self.composite_requested = true;
    }

    // ---- selection ----------------------------------------------------------

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.sync.emit(SyncEvent::SelectionChange { selection: None });
        }
    }

    /// Forward a camera move from one view so the other can follow.
    pub fn notify_viewport(&mut self, origin: ViewOrigin) {
        self.sync.emit(SyncEvent::ViewportChange { origin });
    }

    // ---- undo / redo --------------------------------------------------------

    pub fn undo(&mut self) -> Option<String> {
        let description = self.history.undo(&mut self.document)?;
        self.after_history_jump();
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        let description = self.history.redo(&mut self.document)?;
        self.after_history_jump();
        Some(description)
    }

    fn after_history_jump(&mut self) {
        // Structural commands may have reshaped the layer stack; a full
        // refresh is the only safe notification
        self.sync.emit(SyncEvent::FullUpdate);
        self.request_composite();
        self.document.touch();
    }

    // ---- layer operations ---------------------------------------------------

    pub fn add_layer(&mut self, name: impl Into<String>) -> Uuid {
        let layer = Layer::new(name, self.document.width, self.document.height);
        let id = layer.id;
        let index = self
            .document
            .layer_index(self.document.active_layer_id)
            .map_or(self.document.layers.len(), |i| i + 1);
        let command = LayerInsertCommand::new(index, layer, self.document.active_layer_id);
        self.history.execute(Box::new(command), &mut self.document);
        self.after_layer_change();
        id
    }

    pub fn delete_layer(&mut self, id: Uuid) {
        if self.document.layers.len() <= 1 {
            crate::log_warn!("delete_layer: refusing to remove the last layer");
            return;
        }
        let Some(index) = self.document.layer_index(id) else {
            return;
        };
        let snapshot = self.document.layers[index].clone();
        let command = LayerRemoveCommand::new(index, snapshot, self.document.active_layer_id);
        self.history.execute(Box::new(command), &mut self.document);
        self.after_layer_change();
    }

    pub fn duplicate_layer(&mut self, id: Uuid) -> Option<Uuid> {
        let index = self.document.layer_index(id)?;
        let copy = self.document.layers[index].duplicate();
        let copy_id = copy.id;
        let command = LayerInsertCommand::new(index + 1, copy, self.document.active_layer_id);
        self.history.execute(Box::new(command), &mut self.document);
        self.after_layer_change();
        Some(copy_id)
    }

    pub fn move_layer(&mut self, id: Uuid, up: bool) {
        let Some(index) = self.document.layer_index(id) else {
            return;
        };
        // No command for moves that would fall off the stack
        if up && index + 1 >= self.document.layers.len() || !up && index == 0 {
            return;
        }
        let command = LayerMoveCommand::new(id, up);
        self.history.execute(Box::new(command), &mut self.document);
        self.after_layer_change();
    }

    pub fn set_active_layer(&mut self, id: Uuid) {
        if self.document.layer(id).is_some() && self.document.active_layer_id != id {
            self.document.active_layer_id = id;
            self.sync.emit(SyncEvent::LayerChange);
        }
    }

    pub fn set_layer_opacity(&mut self, id: Uuid, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let Some(layer) = self.document.layer(id) else { return };
        if layer.opacity == opacity {
            return;
        }
        let property = LayerProperty::Opacity { old: layer.opacity, new: opacity };
        self.history
            .execute(Box::new(PropertyCommand::new(id, property)), &mut self.document);
        self.after_layer_change();
    }

    pub fn set_layer_visible(&mut self, id: Uuid, visible: bool) {
        let Some(layer) = self.document.layer(id) else { return };
        if layer.visible == visible {
            return;
        }
        let property = LayerProperty::Visible { old: layer.visible, new: visible };
        self.history
            .execute(Box::new(PropertyCommand::new(id, property)), &mut self.document);
        self.after_layer_change();
    }

    pub fn set_layer_locked(&mut self, id: Uuid, locked: bool) {
        let Some(layer) = self.document.layer(id) else { return };
        if layer.locked == locked {
            return;
        }
        let property = LayerProperty::Locked { old: layer.locked, new: locked };
        self.history
            .execute(Box::new(PropertyCommand::new(id, property)), &mut self.document);
        self.after_layer_change();
    }

    pub fn set_layer_blend_mode(&mut self, id: Uuid, mode: BlendMode) {
        let Some(layer) = self.document.layer(id) else { return };
        if layer.blend_mode == mode {
            return;
        }
        let property = LayerProperty::Blend { old: layer.blend_mode, new: mode };
        self.history
            .execute(Box::new(PropertyCommand::new(id, property)), &mut self.document);
        self.after_layer_change();
    }

    pub fn rename_layer(&mut self, id: Uuid, name: impl Into<String>) {
        let name = name.into();
        let Some(layer) = self.document.layer(id) else { return };
        if layer.name == name {
            return;
        }
        let property = LayerProperty::Name { old: layer.name.clone(), new: name };
        self.history
            .execute(Box::new(PropertyCommand::new(id, property)), &mut self.document);
        self.after_layer_change();
    }

    pub fn merge_layer_down(&mut self, id: Uuid) {
        let mut command = StackSnapshotCommand::new("Merge Down", &self.document);
        if !self.document.merge_down(id) {
            return;
        }
        command.set_after(&self.document);
        self.history.record(Box::new(command));
        self.after_layer_change();
    }

    pub fn flatten_document(&mut self) {
        if self.document.layers.len() <= 1 {
            return;
        }
        let mut command = StackSnapshotCommand::new("Flatten", &self.document);
        self.document.flatten();
        command.set_after(&self.document);
        self.history.record(Box::new(command));
        self.after_layer_change();
    }

    fn after_layer_change(&mut self) {
        self.sync.emit(SyncEvent::LayerChange);
        self.request_composite();
        self.document.touch();
    }

    // ---- document swap ------------------------------------------------------

    /// Replace the open document wholesale (new/open/import). History and
    /// selection reset; views are notified immediately, not on the next tick.
    pub fn replace_document(&mut self, document: Document) {
        if self.engine.is_stroke_active() {
            self.engine.reset();
        }
        self.document = document;
        self.history.clear();
        self.selection = None;
        self.preview_pixels.clear();
        self.composite_cache = self.document.composite();
        self.composite_requested = false;
        self.sync.emit_immediate(SyncEvent::FullUpdate);
    }
}

enum PointerPhase {
    Down,
    Move,
    Up,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::canvas::DEFAULT_SEED_COLOR;

    fn session() -> EditorSession {
        EditorSession::new(SkinFormat::Modern, PlayerModel::Classic, "test")
    }

    fn layer_pixel(s: &EditorSession, x: u32, y: u32) -> Rgba<u8> {
        *s.document.active_layer().unwrap().pixels.get_pixel(x, y)
    }

    #[test]
    fn pencil_stroke_commits_and_undoes() {
        let mut s = session();
        s.paint_target = SkinRegion::Overlay;
        s.primary_color = Rgba([255, 0, 0, 255]);

        // (40, 0) is hat overlay, transparent in a fresh document
        s.pointer_down(40, 0, false);
        s.pointer_up(40, 0);
        assert_eq!(layer_pixel(&s, 40, 0), Rgba([255, 0, 0, 255]));
        assert!(s.history.can_undo());

        s.undo().expect("undoable");
        assert_eq!(layer_pixel(&s, 40, 0), Rgba([0, 0, 0, 0]));

        s.redo().expect("redoable");
        assert_eq!(layer_pixel(&s, 40, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn secondary_button_paints_secondary_color() {
        let mut s = session();
        s.secondary_color = Rgba([0, 200, 0, 255]);
        s.pointer_down(10, 10, true);
        s.pointer_up(10, 10);
        assert_eq!(layer_pixel(&s, 10, 10), Rgba([0, 200, 0, 255]));
    }

    #[test]
    fn locked_layer_rejects_strokes() {
        let mut s = session();
        let id = s.document.active_layer_id;
        s.document.layer_mut(id).unwrap().locked = true;

        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);
        assert_eq!(layer_pixel(&s, 10, 10), DEFAULT_SEED_COLOR);
        assert!(!s.history.can_undo());
    }

    #[test]
    fn cancel_stroke_restores_pixels_without_history() {
        let mut s = session();
        s.primary_color = Rgba([255, 0, 0, 255]);
        s.pointer_down(10, 10, false);
        s.pointer_move(12, 10);
        assert_eq!(layer_pixel(&s, 10, 10), Rgba([255, 0, 0, 255]));

        s.cancel_stroke();
        assert_eq!(layer_pixel(&s, 10, 10), DEFAULT_SEED_COLOR);
        assert_eq!(layer_pixel(&s, 12, 10), DEFAULT_SEED_COLOR);
        assert!(!s.history.can_undo());
    }

    #[test]
    fn eyedropper_updates_primary_color() {
        let mut s = session();
        s.set_tool(ToolKind::Eyedropper);
        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);
        assert_eq!(s.primary_color, DEFAULT_SEED_COLOR);
        assert!(!s.history.can_undo());
    }

    #[test]
    fn stroke_emits_one_coalesced_pixel_batch_per_tick() {
        let mut s = session();
        s.primary_color = Rgba([255, 0, 0, 255]);

        let batches = Rc::new(RefCell::new(Vec::new()));
        {
            let batches = Rc::clone(&batches);
            s.sync.subscribe(
                "canvas",
                Box::new(move |event| {
                    if let SyncEvent::PixelChange { pixels } = event {
                        batches.borrow_mut().push(pixels.len());
                    }
                }),
            );
        }

        s.pointer_down(10, 10, false);
        s.pointer_move(13, 10);
        s.pointer_up(13, 10);
        s.tick();

        // Down, move, and the release diff coalesce into one delivery
        assert_eq!(batches.borrow().len(), 1);
        assert!(batches.borrow()[0] >= 4);
    }

    #[test]
    fn undo_notifies_views_with_full_update() {
        let mut s = session();
        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);
        s.tick();

        let full = Rc::new(RefCell::new(0));
        {
            let full = Rc::clone(&full);
            s.sync.subscribe(
                "model",
                Box::new(move |event| {
                    if matches!(event, SyncEvent::FullUpdate) {
                        *full.borrow_mut() += 1;
                    }
                }),
            );
        }
        s.undo();
        s.tick();
        assert_eq!(*full.borrow(), 1);
    }

    #[test]
    fn layer_lifecycle_is_undoable() {
        let mut s = session();
        let base_id = s.document.active_layer_id;

        let new_id = s.add_layer("Detail");
        assert_eq!(s.document.layers.len(), 2);
        assert_eq!(s.document.active_layer_id, new_id);

        s.rename_layer(new_id, "Shading");
        assert_eq!(s.document.layer(new_id).unwrap().name, "Shading");

        s.delete_layer(new_id);
        assert_eq!(s.document.layers.len(), 1);
        assert_eq!(s.document.active_layer_id, base_id);

        s.undo(); // delete
        assert_eq!(s.document.layers.len(), 2);
        s.undo(); // rename
        assert_eq!(s.document.layer(new_id).unwrap().name, "Detail");
        s.undo(); // add
        assert_eq!(s.document.layers.len(), 1);
        assert_eq!(s.document.active_layer_id, base_id);
    }

    #[test]
    fn merge_down_is_undoable() {
        let mut s = session();
        let top_id = s.add_layer("Top");
        s.primary_color = Rgba([0, 0, 255, 255]);
        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);

        s.merge_layer_down(top_id);
        assert_eq!(s.document.layers.len(), 1);
        assert_eq!(layer_pixel(&s, 10, 10), Rgba([0, 0, 255, 255]));

        s.undo();
        assert_eq!(s.document.layers.len(), 2);
        assert_eq!(
            *s.document.layers[0].pixels.get_pixel(10, 10),
            DEFAULT_SEED_COLOR
        );
    }

    #[test]
    fn selection_drag_updates_state_and_zero_drag_clears() {
        let mut s = session();
        s.set_tool(ToolKind::Select);
        s.pointer_down(5, 5, false);
        s.pointer_up(12, 9);
        assert!(s.selection.is_some());
        assert_eq!(s.selection.unwrap().bounds, crate::geometry::Rect::new(5, 5, 8, 5));

        s.pointer_down(20, 20, false);
        s.pointer_up(20, 20);
        assert!(s.selection.is_none());
    }

    #[test]
    fn replace_document_resets_history_and_notifies_immediately() {
        let mut s = session();
        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);
        assert!(s.history.can_undo());

        let full = Rc::new(RefCell::new(0));
        {
            let full = Rc::clone(&full);
            s.sync.subscribe(
                "view",
                Box::new(move |event| {
                    if matches!(event, SyncEvent::FullUpdate) {
                        *full.borrow_mut() += 1;
                    }
                }),
            );
        }
        s.replace_document(Document::new(SkinFormat::Legacy, PlayerModel::Slim, "other"));
        // Immediate, before any tick
        assert_eq!(*full.borrow(), 1);
        assert!(!s.history.can_undo());
        assert_eq!(s.document.height, 32);
    }

    #[test]
    fn composite_cache_refreshes_on_tick() {
        let mut s = session();
        s.primary_color = Rgba([255, 0, 0, 255]);
        s.pointer_down(10, 10, false);
        s.pointer_up(10, 10);
        // Stale until the frame boundary
        assert_eq!(*s.composite().get_pixel(10, 10), DEFAULT_SEED_COLOR);
        s.tick();
        assert_eq!(*s.composite().get_pixel(10, 10), Rgba([255, 0, 0, 255]));
    }
}
