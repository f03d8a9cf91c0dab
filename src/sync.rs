//! Batched pub/sub bridge between the editing core and its views.
//!
//! Both the 2D canvas and the 3D preview render from the same document, so
//! every mutation publishes a [`SyncEvent`]. Events queue up during a frame
//! and [`SyncManager::flush`] delivers them coalesced: a full update
//! supersedes any queued incremental pixel or layer events, and consecutive
//! pixel batches merge into one.

use crate::canvas::Pixel;
use crate::components::tools::Selection;

/// Which view originated a viewport move, so the other can follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewOrigin {
    Canvas2d,
    Model3d,
}

/// A document change notification.
#[derive(Clone, Debug)]
pub enum SyncEvent {
    /// Incremental pixel edits on the composited result.
    PixelChange { pixels: Vec<Pixel> },
    /// Layer list or layer property changed; views refresh layer UI.
    LayerChange,
    /// Document replaced or changed wholesale; views must re-read everything.
    FullUpdate,
    /// Selection created, moved, or cleared.
    SelectionChange { selection: Option<Selection> },
    /// One view moved its camera/viewport.
    ViewportChange { origin: ViewOrigin },
}

impl SyncEvent {
    fn is_superseded_by_full_update(&self) -> bool {
        matches!(self, SyncEvent::PixelChange { .. } | SyncEvent::LayerChange)
    }
}

pub type Subscriber = Box<dyn FnMut(&SyncEvent)>;

/// Event queue plus subscriber registry. Single-threaded by design — the
/// session owns it and flushes once per frame.
#[derive(Default)]
pub struct SyncManager {
    subscribers: Vec<(String, Subscriber)>,
    queue: Vec<SyncEvent>,
}

impl SyncManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named subscriber. Re-subscribing under an existing name
    /// replaces the previous callback.
    pub fn subscribe(&mut self, name: impl Into<String>, callback: Subscriber) {
        let name = name.into();
        if let Some(entry) = self.subscribers.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = callback;
        } else {
            self.subscribers.push((name, callback));
        }
    }

    pub fn unsubscribe(&mut self, name: &str) {
        self.subscribers.retain(|(n, _)| n != name);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Queue an event for the next flush.
    pub fn emit(&mut self, event: SyncEvent) {
        self.queue.push(event);
    }

    /// Bypass the queue and notify subscribers now. For events that must not
    /// wait a frame, like a document swap invalidating everything a view holds.
    pub fn emit_immediate(&mut self, event: SyncEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver the queued events, coalesced.
    ///
    /// If any full update is queued it is delivered first and every queued
    /// pixel/layer event is dropped — the full refresh covers them. Selection
    /// and viewport events survive in their original order because a full
    /// update does not carry that state. Without a full update, all pixel
    /// batches merge into a single event, queued at the position of the first.
    pub fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.queue);

        let mut delivery: Vec<SyncEvent> = Vec::new();
        if queue.iter().any(|e| matches!(e, SyncEvent::FullUpdate)) {
            delivery.push(SyncEvent::FullUpdate);
            for event in queue {
                if !event.is_superseded_by_full_update()
                    && !matches!(event, SyncEvent::FullUpdate)
                {
                    delivery.push(event);
                }
            }
        } else {
            let mut merged_pixels: Vec<Pixel> = Vec::new();
            let mut others: Vec<SyncEvent> = Vec::new();
            for event in queue {
                match event {
                    // Later writes append after earlier ones so consumers
                    // applying in order land on the final colors
                    SyncEvent::PixelChange { pixels } => merged_pixels.extend(pixels),
                    other => others.push(other),
                }
            }
            // The merged batch goes out before everything else
            if !merged_pixels.is_empty() {
                delivery.push(SyncEvent::PixelChange { pixels: merged_pixels });
            }
            delivery.extend(others);
        }

        for event in &delivery {
            for (_, callback) in &mut self.subscribers {
                callback(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use image::Rgba;

    fn px(x: u32, y: u32) -> Pixel {
        Pixel::new(x, y, Rgba([x as u8, y as u8, 0, 255]))
    }

    /// Records a compact tag per delivered event.
    fn recorder(log: &Rc<RefCell<Vec<String>>>) -> Subscriber {
        let log = Rc::clone(log);
        Box::new(move |event| {
            let tag = match event {
                SyncEvent::PixelChange { pixels } => format!("pixels:{}", pixels.len()),
                SyncEvent::LayerChange => "layers".to_string(),
                SyncEvent::FullUpdate => "full".to_string(),
                SyncEvent::SelectionChange { .. } => "selection".to_string(),
                SyncEvent::ViewportChange { .. } => "viewport".to_string(),
            };
            log.borrow_mut().push(tag);
        })
    }

    #[test]
    fn full_update_supersedes_pixel_and_layer_events() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("view", recorder(&log));

        sync.emit(SyncEvent::PixelChange { pixels: vec![px(1, 1)] });
        sync.emit(SyncEvent::PixelChange { pixels: vec![px(2, 2)] });
        sync.emit(SyncEvent::LayerChange);
        sync.emit(SyncEvent::PixelChange { pixels: vec![px(3, 3)] });
        sync.emit(SyncEvent::FullUpdate);
        sync.flush();

        assert_eq!(*log.borrow(), vec!["full"]);
    }

    #[test]
    fn selection_and_viewport_survive_full_update_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("view", recorder(&log));

        sync.emit(SyncEvent::SelectionChange { selection: None });
        sync.emit(SyncEvent::FullUpdate);
        sync.emit(SyncEvent::ViewportChange { origin: ViewOrigin::Model3d });
        sync.flush();

        assert_eq!(*log.borrow(), vec!["full", "selection", "viewport"]);
    }

    #[test]
    fn pixel_batches_merge_preserving_write_order() {
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        {
            let delivered = Rc::clone(&delivered);
            sync.subscribe(
                "view",
                Box::new(move |event| {
                    if let SyncEvent::PixelChange { pixels } = event {
                        delivered.borrow_mut().extend(pixels.iter().copied());
                    }
                }),
            );
        }

        sync.emit(SyncEvent::PixelChange { pixels: vec![px(1, 1), px(2, 2)] });
        sync.emit(SyncEvent::LayerChange);
        sync.emit(SyncEvent::PixelChange { pixels: vec![px(3, 3)] });
        sync.flush();

        assert_eq!(*delivered.borrow(), vec![px(1, 1), px(2, 2), px(3, 3)]);
    }

    #[test]
    fn merged_pixel_event_is_delivered_once_and_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("view", recorder(&log));

        // Pixels queued after the layer event still deliver ahead of it
        sync.emit(SyncEvent::LayerChange);
        sync.emit(SyncEvent::PixelChange { pixels: vec![px(1, 1)] });
        sync.emit(SyncEvent::PixelChange { pixels: vec![px(2, 2)] });
        sync.flush();

        assert_eq!(*log.borrow(), vec!["pixels:2", "layers"]);
    }

    #[test]
    fn flush_drains_the_queue() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("view", recorder(&log));

        sync.emit(SyncEvent::LayerChange);
        sync.flush();
        sync.flush();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(sync.pending(), 0);
    }

    #[test]
    fn emit_immediate_bypasses_queue() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("view", recorder(&log));

        sync.emit(SyncEvent::LayerChange);
        sync.emit_immediate(SyncEvent::FullUpdate);
        assert_eq!(*log.borrow(), vec!["full"]);
        // The queued layer event is still pending
        assert_eq!(sync.pending(), 1);
    }

    #[test]
    fn unsubscribe_and_resubscribe_by_name() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sync = SyncManager::new();
        sync.subscribe("a", recorder(&log));
        sync.subscribe("b", recorder(&log));
        assert_eq!(sync.subscriber_count(), 2);

        sync.unsubscribe("a");
        assert_eq!(sync.subscriber_count(), 1);

        // Same-name resubscribe replaces rather than duplicates
        sync.subscribe("b", recorder(&log));
        assert_eq!(sync.subscriber_count(), 1);

        sync.emit(SyncEvent::LayerChange);
        sync.flush();
        assert_eq!(log.borrow().len(), 1);
    }
}
