//! JSON interchange documents for skeletons and motions

mod document;
mod loader;

pub use document::{FrameDocument, MotionDocument, SegmentDocument, SkeletonDocument};
pub use loader::{LoadError, load_motion, load_motion_document, save_motion_document};
