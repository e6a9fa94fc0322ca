use crate::error::CodecError;
use crate::inventory::Inventory;
use cubeworld_common::BlockType;
use std::fmt::Debug;

/// A value that can be stored in one octree leaf and encoded to bytes.
pub trait PlaneValue: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError>;
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError>;
}

/// Split `n` bytes off the front of `input`.
pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::Truncated);
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

pub(crate) fn take_u8(input: &mut &[u8]) -> Result<u8, CodecError> {
    Ok(take(input, 1)?[0])
}

pub(crate) fn take_u16(input: &mut &[u8]) -> Result<u16, CodecError> {
    let bytes = take(input, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn take_u32(input: &mut &[u8]) -> Result<u32, CodecError> {
    let bytes = take(input, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl PlaneValue for u8 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.push(*self);
        Ok(())
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        take_u8(input)
    }
}

impl PlaneValue for u16 {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        take_u16(input)
    }
}

impl PlaneValue for BlockType {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.0.encode(out)
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        take_u16(input).map(BlockType)
    }
}

/// Object values are CBOR behind a presence byte and a length prefix, so an
/// absent inventory costs one byte and never needs a sentinel object.
impl PlaneValue for Option<Inventory> {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            None => out.push(0),
            Some(inventory) => {
                let mut body = Vec::new();
                ciborium::into_writer(inventory, &mut body)
                    .map_err(|e| CodecError::CborEncode(e.to_string()))?;
                out.push(1);
                out.extend_from_slice(&(body.len() as u32).to_le_bytes());
                out.extend_from_slice(&body);
            }
        }
        Ok(())
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        match take_u8(input)? {
            0 => Ok(None),
            1 => {
                let len = take_u32(input)? as usize;
                let body = take(input, len)?;
                ciborium::from_reader(body)
                    .map(Some)
                    .map_err(|e| CodecError::CborDecode(e.to_string()))
            }
            other => Err(CodecError::InvalidNodeTag(other)),
        }
    }
}
