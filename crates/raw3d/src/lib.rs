//! In-memory consolidation of skinned meshes, skeletons and animations.
//!
//! Two aggregates hold all data:
//!
//! - [`Anim`]: a bone hierarchy with bind pose and a frames-by-bones grid of
//!   local key frames. Operations reorder bones into LOD groups, delete
//!   bones while preserving the world pose, retarget onto a reference
//!   skeleton and edit frame ranges.
//! - [`Geom`]: a bind skeleton, vertices with optional channels, facets,
//!   meshes and material instances. Operations weld and compact the mesh,
//!   compute bone bounds, isolate meshes and rebind skin weights.
//!
//! Both aggregates are read from and written to named records through the
//! [`records::RecordReader`] and [`records::RecordWriter`] traits.
//!
//! # Example
//!
//! ```rust
//! use raw3d::anim::{Anim, AnimBone};
//! use raw3d::math::Transform3;
//! use raw3d::records::MemoryRecords;
//!
//! let bones = vec![
//!     AnimBone::new("Root", None, Transform3::IDENTITY),
//!     AnimBone::new("Spine", Some(0), Transform3::IDENTITY),
//! ];
//! let anim = Anim::with_skeleton("idle", bones, 4);
//!
//! let mut store = MemoryRecords::new();
//! anim.write_records(&mut store)?;
//! let restored = Anim::read_records(&mut store)?;
//! assert_eq!(restored.keys.len(), 8);
//! # Ok::<(), raw3d::Raw3dError>(())
//! ```
//!
//! # Features
//!
//! - `parallel`: candidate matching of the vertex weld and normal collapsing
//!   run on rayon. Results are identical to the sequential build.
//! - `serde-support`: serde derives on every data type.

pub mod anim;
pub mod error;
pub mod geom;
pub mod hierarchy;
pub mod material;
pub mod math;
pub mod parallel;
pub mod records;

// Re-export common types
pub use anim::{Anim, AnimBone};
pub use error::{Raw3dError, Result};
pub use geom::{CleanOptions, CleanStats, Geom};
pub use material::MaterialInstance;
pub use math::{KeyFrame, Transform3};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
