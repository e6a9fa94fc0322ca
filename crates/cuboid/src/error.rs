use crate::aspect::AspectKind;

/// Errors from decoding (and, for object aspects, encoding) cuboid data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("input ended inside a value")]
    Truncated,
    #[error("unknown aspect tag {0}")]
    UnknownAspect(u8),
    #[error("expected aspect {expected:?}, found {found:?}")]
    UnexpectedAspect {
        expected: AspectKind,
        found: AspectKind,
    },
    #[error("aspect body of {0} bytes exceeds the limit")]
    AspectTooLarge(usize),
    #[error("invalid octree node tag {0}")]
    InvalidNodeTag(u8),
    #[error("octree branches below single-block depth")]
    OctreeTooDeep,
    #[error("{0} trailing bytes after complete value")]
    TrailingBytes(usize),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
}
