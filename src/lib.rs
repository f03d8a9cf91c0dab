//! skinpaint — editing core for a fixed-format (64×64 / 64×32) skin texture
//! editor.
//!
//! The crate owns everything between raw pointer events and the flattened
//! pixel buffer handed to renderers:
//!
//! * [`geometry`] / [`color`] — pure raster and compositing primitives
//! * [`regions`] — the static base/overlay UV rectangle tables that gate
//!   every paint operation
//! * [`canvas`] — the layered [`Document`] model and CPU compositor
//! * [`components::tools`] — the stateful tool engine (pencil, eraser, fill,
//!   line, gradient, …) with per-stroke undo bookkeeping
//! * [`components::history`] — reversible commands and the memory-bounded
//!   undo/redo stacks
//! * [`sync`] — the per-frame coalescing event broker that keeps the 2D and
//!   3D views consistent
//! * [`session`] — [`EditorSession`], the explicit state object the host
//!   threads through input handling, ticking, and rendering
//!
//! Rendering widgets, persistence backends, and network clients are external
//! consumers; the core exposes buffers and events, never draws.

pub mod canvas;
pub mod color;
pub mod components;
pub mod geometry;
pub mod io;
pub mod logger;
pub mod regions;
pub mod session;
pub mod sync;

pub use canvas::{BlendMode, Document, Layer, Pixel, PlayerModel, SkinFormat};
pub use components::history::HistoryManager;
pub use components::tools::{Selection, ToolContext, ToolEngine, ToolKind, ToolResult};
pub use geometry::{Rect, SymmetryMode};
pub use io::DocumentSnapshot;
pub use regions::SkinRegion;
pub use session::EditorSession;
pub use sync::{SyncEvent, SyncManager};
