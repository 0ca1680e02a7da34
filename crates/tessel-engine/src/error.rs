use thiserror::Error;

use crate::render::BatcherId;
use crate::scene::{DrawableId, TransformId};

/// Errors produced by the batching core.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A single drawable cannot fit in the staging arrays.
    ///
    /// A primitive's vertices must stay contiguous within one draw, so the
    /// drawable cannot be split across flushes. The frame is aborted.
    #[error("drawable {id:?} has {vertices} vertices but the batcher holds at most {capacity}")]
    DrawableTooLarge {
        id: DrawableId,
        vertices: usize,
        capacity: usize,
    },

    #[error("unknown drawable {0:?}")]
    UnknownDrawable(DrawableId),

    #[error("unknown batcher {0:?}")]
    UnknownBatcher(BatcherId),

    #[error("unknown transform {0:?}")]
    UnknownTransform(TransformId),

    /// Re-parenting would make a transform its own ancestor.
    #[error("transform {child:?} cannot be parented under its descendant {parent:?}")]
    TransformCycle {
        child: TransformId,
        parent: TransformId,
    },

    /// The GPU backend rejected an operation.
    #[error("gpu backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;
