use thiserror::Error;

/// Error types for mesh, skeleton and animation processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Raw3dError {
    /// An index stored in one array points outside another
    #[error("Invalid reference: {what} {index} refers to {value}, but only {len} exist")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        value: usize,
        len: usize,
    },

    /// A bone name carries a `LOD[` tag that cannot be parsed
    #[error("Bone {bone} '{name}' has a malformed LOD tag: {reason}")]
    MalformedLodTag {
        bone: usize,
        name: String,
        reason: String,
    },

    /// Sorting bones by LOD group produced a forward parent reference
    #[error("Bone LOD sort has failed: bone {bone} ended up before its parent {parent}")]
    LodSortFailed { bone: usize, parent: usize },

    /// Walking the parent chain did not reach a root
    #[error("Bone hierarchy is cyclic at bone {0}")]
    CyclicHierarchy(usize),

    /// A bone references a parent that is not retained by the operation
    #[error("Bone {bone} references parent {parent:?} which is outside the retained hierarchy")]
    DanglingParent { bone: usize, parent: Option<usize> },

    /// The root bone of the reference skeleton does not exist in the source
    #[error("Unable to find root bone '{0}' in the animation")]
    RootNotFound(String),

    /// The operation would leave a skeleton without bones
    #[error("Skeleton '{0}' has no bones in the bind skeleton")]
    EmptyBindSkeleton(String),

    /// The named bone does not exist
    #[error("Bone '{0}' not found")]
    BoneNotFound(String),

    /// Normal, tangent and binormal channel counts disagree
    #[error("Vertex {vertex} has {binormals} binormals, {tangents} tangents and {normals} normals")]
    ChannelMismatch {
        vertex: usize,
        binormals: usize,
        tangents: usize,
        normals: usize,
    },

    /// Too many vertices lie far outside the bulk of the mesh to weld safely
    #[error("Found {0} vertices far outside the mesh bounds, the geometry is unusable")]
    TooManyOutliers(usize),

    /// Cleanup removed every vertex
    #[error("Geometry has no vertices left")]
    NoVertices,

    /// Cleanup removed every facet
    #[error("Geometry has no facets left")]
    NoFacets,

    /// A frame range or frame index is outside the animation
    #[error("Invalid frame range {start}..{end} for an animation of {frames} frames")]
    InvalidFrameRange {
        start: usize,
        end: usize,
        frames: usize,
    },

    /// A block of key frames does not hold whole frames
    #[error("{keys} key frames do not divide into frames of {bones} bones")]
    PartialFrame { keys: usize, bones: usize },

    /// Explicit validation found a bad element
    #[error("Sanity check failed for {element} {index}: {reason}")]
    Sanity {
        element: &'static str,
        index: usize,
        reason: String,
    },

    /// A serialized record is missing a field or holds the wrong type
    #[error("Record error: {0}")]
    Record(String),
}

/// Result type using `Raw3dError`
pub type Result<T> = std::result::Result<T, Raw3dError>;
