//! Scene-side data: drawables, their render state and transforms.
//!
//! Responsibilities:
//! - own drawables and the transform hierarchy (`Scene`)
//! - derive the composite `SortKey` each drawable is indexed under
//! - stage render-state writes and publish them once per frame
//! - diff consecutive render states (`StateDiff`)

mod context;
mod diff;
mod drawable;
mod key;
mod state;
mod store;
mod transform;

pub use context::RenderContext;
pub use diff::{StateChanges, StateDiff};
pub use drawable::{quad, Drawable, DrawableId, Vertex};
pub(crate) use drawable::StaticUpload;
pub use key::{PrimitiveType, ShaderId, SortKey, TextureId};
pub use state::{RenderState, StagedState, StateAttr};
pub use store::Scene;
pub use transform::{TransformArena, TransformId};
