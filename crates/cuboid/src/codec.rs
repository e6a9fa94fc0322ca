//! Resumable, chunked cuboid encoding.
//!
//! Layout, little endian:
//! ```text
//! [x:i16][y:i16][z:i16]                      cuboid header
//! ([tag:u8][len:u32][octree body]) x 5       one block per aspect, in AspectKind::ALL order
//! ```
//! An encoded cuboid can exceed one network frame, so both directions work in
//! slices of arbitrary size and hand back a resume token. Encoding never
//! re-emits or re-scans bytes produced by an earlier call: a partially written
//! aspect travels in the token as its unsent tail.

use crate::aspect::AspectKind;
use crate::cuboid::CuboidData;
use crate::error::CodecError;
use crate::octree::Octree;
use cubeworld_common::{BlockType, CuboidAddress};
use std::sync::Arc;

pub const CUBOID_HEADER_BYTES: usize = 6;
const ASPECT_HEADER_BYTES: usize = 5;
/// Upper bound on one aspect body; a fully expanded plane of the largest value
/// type stays far below this.
const MAX_ASPECT_BYTES: usize = 16 * 1024 * 1024;

/// Where an interrupted encode picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeResume {
    /// Inside the cuboid header.
    Header { offset: usize },
    /// At the first byte of an aspect that has not been encoded yet.
    AspectStart { aspect: usize },
    /// Inside an aspect already encoded into `pending`.
    AspectTail {
        aspect: usize,
        pending: Vec<u8>,
        offset: usize,
    },
}

/// Position of an interrupted decode within the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Header,
    AspectHeader { aspect: usize },
    AspectBody { aspect: usize, len: usize },
}

/// Where an interrupted decode picks up: the stage, the bytes of the current
/// stage received so far, and the cuboid assembled from completed aspects.
#[derive(Debug, Clone)]
pub struct DecodeResume {
    stage: DecodeStage,
    scratch: Vec<u8>,
    building: Option<CuboidData>,
}

impl DecodeResume {
    pub fn stage(&self) -> DecodeStage {
        self.stage
    }
}

impl Default for DecodeResume {
    fn default() -> Self {
        Self {
            stage: DecodeStage::Header,
            scratch: Vec::new(),
            building: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DecodeProgress {
    Complete(CuboidData),
    Incomplete(DecodeResume),
}

impl CuboidData {
    fn header_bytes(&self) -> [u8; CUBOID_HEADER_BYTES] {
        let a = self.address();
        let mut out = [0u8; CUBOID_HEADER_BYTES];
        out[0..2].copy_from_slice(&a.x.to_le_bytes());
        out[2..4].copy_from_slice(&a.y.to_le_bytes());
        out[4..6].copy_from_slice(&a.z.to_le_bytes());
        out
    }

    fn encode_aspect(&self, kind: AspectKind, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.push(kind.tag());
        let len_at = out.len();
        out.extend_from_slice(&[0; 4]);
        match kind {
            AspectKind::BlockType => self.block_type.encode(out)?,
            AspectKind::Damage => self.damage.encode(out)?,
            AspectKind::Light => self.light.encode(out)?,
            AspectKind::Logic => self.logic.encode(out)?,
            AspectKind::Inventory => self.inventory.encode(out)?,
        }
        let body_len = (out.len() - len_at - 4) as u32;
        out[len_at..len_at + 4].copy_from_slice(&body_len.to_le_bytes());
        Ok(())
    }

    fn install_aspect(&mut self, kind: AspectKind, mut body: &[u8]) -> Result<(), CodecError> {
        let input = &mut body;
        match kind {
            AspectKind::BlockType => self.block_type = Arc::new(Octree::decode(input)?),
            AspectKind::Damage => self.damage = Arc::new(Octree::decode(input)?),
            AspectKind::Light => self.light = Arc::new(Octree::decode(input)?),
            AspectKind::Logic => self.logic = Arc::new(Octree::decode(input)?),
            AspectKind::Inventory => self.inventory = Arc::new(Octree::decode(input)?),
        }
        if !input.is_empty() {
            return Err(CodecError::TrailingBytes(input.len()));
        }
        Ok(())
    }

    /// Append at most `limit` bytes of this cuboid's encoding to `out`.
    ///
    /// Pass `None` to start. Returns the token to continue with, or `None`
    /// once the final byte has been written.
    pub fn serialize_resumable(
        &self,
        resume: Option<EncodeResume>,
        out: &mut Vec<u8>,
        limit: usize,
    ) -> Result<Option<EncodeResume>, CodecError> {
        let mut budget = limit;
        let mut state = resume.unwrap_or(EncodeResume::Header { offset: 0 });
        loop {
            state = match state {
                EncodeResume::Header { offset } => {
                    let header = self.header_bytes();
                    let n = budget.min(CUBOID_HEADER_BYTES - offset);
                    out.extend_from_slice(&header[offset..offset + n]);
                    budget -= n;
                    if offset + n < CUBOID_HEADER_BYTES {
                        return Ok(Some(EncodeResume::Header { offset: offset + n }));
                    }
                    EncodeResume::AspectStart { aspect: 0 }
                }
                EncodeResume::AspectStart { aspect } => {
                    if aspect == AspectKind::ALL.len() {
                        return Ok(None);
                    }
                    if budget == 0 {
                        return Ok(Some(EncodeResume::AspectStart { aspect }));
                    }
                    let mut pending = Vec::new();
                    self.encode_aspect(AspectKind::ALL[aspect], &mut pending)?;
                    EncodeResume::AspectTail {
                        aspect,
                        pending,
                        offset: 0,
                    }
                }
                EncodeResume::AspectTail {
                    aspect,
                    pending,
                    offset,
                } => {
                    let n = budget.min(pending.len() - offset);
                    out.extend_from_slice(&pending[offset..offset + n]);
                    budget -= n;
                    if offset + n < pending.len() {
                        return Ok(Some(EncodeResume::AspectTail {
                            aspect,
                            pending,
                            offset: offset + n,
                        }));
                    }
                    EncodeResume::AspectStart { aspect: aspect + 1 }
                }
            };
        }
    }

    /// Feed the next slice of an encoded cuboid.
    ///
    /// Pass `None` for the first slice. Bytes beyond the end of the cuboid are
    /// an error rather than silently ignored.
    pub fn deserialize_resumable(
        resume: Option<DecodeResume>,
        mut input: &[u8],
    ) -> Result<DecodeProgress, CodecError> {
        let mut state = resume.unwrap_or_default();
        loop {
            let need = match state.stage {
                DecodeStage::Header => CUBOID_HEADER_BYTES,
                DecodeStage::AspectHeader { .. } => ASPECT_HEADER_BYTES,
                DecodeStage::AspectBody { len, .. } => len,
            };
            let take = input.len().min(need - state.scratch.len());
            state.scratch.extend_from_slice(&input[..take]);
            input = &input[take..];
            if state.scratch.len() < need {
                return Ok(DecodeProgress::Incomplete(state));
            }

            state.stage = match state.stage {
                DecodeStage::Header => {
                    let s = &state.scratch;
                    let address = CuboidAddress::new(
                        i16::from_le_bytes([s[0], s[1]]),
                        i16::from_le_bytes([s[2], s[3]]),
                        i16::from_le_bytes([s[4], s[5]]),
                    );
                    state.building = Some(CuboidData::filled(address, BlockType::AIR));
                    DecodeStage::AspectHeader { aspect: 0 }
                }
                DecodeStage::AspectHeader { aspect } => {
                    let s = &state.scratch;
                    let found = AspectKind::from_tag(s[0]).ok_or(CodecError::UnknownAspect(s[0]))?;
                    let expected = AspectKind::ALL[aspect];
                    if found != expected {
                        return Err(CodecError::UnexpectedAspect { expected, found });
                    }
                    let len = u32::from_le_bytes([s[1], s[2], s[3], s[4]]) as usize;
                    if len > MAX_ASPECT_BYTES {
                        return Err(CodecError::AspectTooLarge(len));
                    }
                    DecodeStage::AspectBody { aspect, len }
                }
                DecodeStage::AspectBody { aspect, .. } => {
                    let Some(building) = state.building.as_mut() else {
                        unreachable!("aspect body decoded before header");
                    };
                    building.install_aspect(AspectKind::ALL[aspect], &state.scratch)?;
                    if aspect + 1 == AspectKind::ALL.len() {
                        if !input.is_empty() {
                            return Err(CodecError::TrailingBytes(input.len()));
                        }
                        let Some(done) = state.building.take() else {
                            unreachable!("cuboid present after header");
                        };
                        return Ok(DecodeProgress::Complete(done));
                    }
                    DecodeStage::AspectHeader { aspect: aspect + 1 }
                }
            };
            state.scratch.clear();
        }
    }

    /// Split the encoding into payloads of at most `max_frame` bytes. The
    /// first is the start packet, the rest are fragments.
    pub fn frames(&self, max_frame: usize) -> Result<Vec<Vec<u8>>, CodecError> {
        assert!(max_frame > 0, "frame size must be positive");
        let mut frames = Vec::new();
        let mut resume = None;
        loop {
            let mut frame = Vec::with_capacity(max_frame);
            resume = self.serialize_resumable(resume, &mut frame, max_frame)?;
            if !frame.is_empty() {
                frames.push(frame);
            }
            if resume.is_none() {
                return Ok(frames);
            }
        }
    }

    /// Reassemble a cuboid from frames produced by [`CuboidData::frames`].
    pub fn from_frames<'a>(
        frames: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<CuboidData, CodecError> {
        let mut resume = None;
        for frame in frames {
            match CuboidData::deserialize_resumable(resume.take(), frame)? {
                DecodeProgress::Complete(cuboid) => return Ok(cuboid),
                DecodeProgress::Incomplete(next) => resume = Some(next),
            }
        }
        Err(CodecError::Truncated)
    }

    /// The complete encoding in one buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let rest = self.serialize_resumable(None, &mut out, usize::MAX)?;
        debug_assert!(rest.is_none());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;
    use crate::{BlockTypeAspect, DamageAspect, InventoryAspect, LightAspect};
    use cubeworld_common::{BlockAddress, ItemType};

    fn sample() -> CuboidData {
        let mut cuboid = CuboidData::filled(CuboidAddress::new(-3, 7, 1), BlockType::STONE);
        for i in 0..20u8 {
            cuboid.set::<BlockTypeAspect>(BlockAddress::new(i, i, 0), BlockType::AIR);
            cuboid.set::<DamageAspect>(BlockAddress::new(i, 0, i), u16::from(i) * 10);
        }
        cuboid.set::<LightAspect>(BlockAddress::new(31, 31, 31), 15);
        let mut inv = Inventory::with_capacity(64);
        inv.add(ItemType(1), 12);
        cuboid.set::<InventoryAspect>(BlockAddress::new(2, 3, 4), Some(inv));
        cuboid
    }

    #[test]
    fn tiny_frames_reassemble() {
        let cuboid = sample();
        let whole = cuboid.to_bytes().unwrap();
        for size in [1, 2, 5, 7, 64, 1000] {
            let frames = cuboid.frames(size).unwrap();
            assert!(frames.iter().all(|f| f.len() <= size));
            // no byte is emitted twice
            assert_eq!(frames.iter().map(Vec::len).sum::<usize>(), whole.len());
            assert_eq!(frames.concat(), whole);
            let decoded = CuboidData::from_frames(frames.iter().map(Vec::as_slice)).unwrap();
            assert_eq!(decoded, cuboid);
        }
    }

    #[test]
    fn resume_token_points_inside_aspect() {
        let cuboid = sample();
        let mut out = Vec::new();
        let token = cuboid
            .serialize_resumable(None, &mut out, CUBOID_HEADER_BYTES + 3)
            .unwrap();
        assert!(matches!(
            token,
            Some(EncodeResume::AspectTail {
                aspect: 0,
                offset: 3,
                ..
            })
        ));
    }

    #[test]
    fn zero_budget_makes_no_progress() {
        let cuboid = sample();
        let mut out = Vec::new();
        let token = cuboid
            .serialize_resumable(Some(EncodeResume::AspectStart { aspect: 2 }), &mut out, 0)
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(token, Some(EncodeResume::AspectStart { aspect: 2 }));
    }

    #[test]
    fn decode_reports_stage_when_starved() {
        let bytes = sample().to_bytes().unwrap();
        let progress = CuboidData::deserialize_resumable(None, &bytes[..CUBOID_HEADER_BYTES + 2])
            .unwrap();
        let DecodeProgress::Incomplete(resume) = progress else {
            panic!("expected incomplete decode");
        };
        assert_eq!(resume.stage(), DecodeStage::AspectHeader { aspect: 0 });
    }

    #[test]
    fn unknown_aspect_tag_is_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[CUBOID_HEADER_BYTES] = 42;
        assert!(matches!(
            CuboidData::deserialize_resumable(None, &bytes),
            Err(CodecError::UnknownAspect(42))
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            CuboidData::deserialize_resumable(None, &bytes),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn missing_frames_report_truncation() {
        let frames = sample().frames(16).unwrap();
        let partial = frames[..frames.len() - 1].iter().map(Vec::as_slice);
        assert!(matches!(
            CuboidData::from_frames(partial),
            Err(CodecError::Truncated)
        ));
    }
}
