//! Octree aspect plane.
//!
//! A plane is either one inline value covering the whole cuboid or a branch of
//! eight sub-trees, recursively down to single blocks. Branches whose children
//! are all equal leaves are collapsed after every write, so a given content has
//! exactly one tree shape and therefore exactly one encoding.

use crate::error::CodecError;
use crate::value::{PlaneValue, take_u8};
use cubeworld_common::{BlockAddress, CUBOID_EDGE};

/// log2 of the cuboid edge: the number of branch levels above a single block.
const DEPTH: u32 = CUBOID_EDGE.trailing_zeros();

const TAG_LEAF: u8 = 0;
const TAG_BRANCH: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
enum Node<T> {
    Leaf(T),
    Branch(Box<[Node<T>; 8]>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Octree<T> {
    root: Node<T>,
}

fn child_index(block: BlockAddress, shift: u32) -> usize {
    let bit = |v: u8| usize::from((v >> shift) & 1);
    bit(block.x) | (bit(block.y) << 1) | (bit(block.z) << 2)
}

impl<T: PlaneValue> Octree<T> {
    /// A plane holding `value` for every block.
    pub fn filled(value: T) -> Self {
        Self {
            root: Node::Leaf(value),
        }
    }

    pub fn get(&self, block: BlockAddress) -> &T {
        let mut node = &self.root;
        let mut shift = DEPTH;
        loop {
            match node {
                Node::Leaf(value) => return value,
                Node::Branch(children) => {
                    shift -= 1;
                    node = &children[child_index(block, shift)];
                }
            }
        }
    }

    /// Store `value` at `block`. Returns whether the plane content changed.
    pub fn set(&mut self, block: BlockAddress, value: T) -> bool {
        set_in(&mut self.root, block, DEPTH, value)
    }

    /// The single value of a compact plane, if the plane is compact.
    pub fn uniform(&self) -> Option<&T> {
        match &self.root {
            Node::Leaf(value) => Some(value),
            Node::Branch(_) => None,
        }
    }

    pub fn node_count(&self) -> usize {
        fn count<T>(node: &Node<T>) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Branch(children) => 1 + children.iter().map(count).sum::<usize>(),
            }
        }
        count(&self.root)
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_node(&self.root, out)
    }

    pub fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            root: decode_node(input, DEPTH)?,
        })
    }

    /// Append every block whose value differs between `self` and `other`.
    pub fn diff_into(&self, other: &Self, out: &mut Vec<BlockAddress>) {
        diff_nodes(&self.root, &other.root, (0, 0, 0), DEPTH, out);
    }
}

fn set_in<T: PlaneValue>(node: &mut Node<T>, block: BlockAddress, shift: u32, value: T) -> bool {
    if let Node::Leaf(current) = node {
        if *current == value {
            return false;
        }
        if shift == 0 {
            *current = value;
            return true;
        }
        let fill = current.clone();
        *node = Node::Branch(Box::new(std::array::from_fn(|_| Node::Leaf(fill.clone()))));
    }
    let Node::Branch(children) = node else {
        unreachable!("leaf was expanded above");
    };
    let next = shift - 1;
    let changed = set_in(&mut children[child_index(block, next)], block, next, value);
    if changed {
        if let Some(collapsed) = uniform_children(children) {
            *node = Node::Leaf(collapsed);
        }
    }
    changed
}

fn uniform_children<T: PlaneValue>(children: &[Node<T>; 8]) -> Option<T> {
    let Node::Leaf(first) = &children[0] else {
        return None;
    };
    children[1..]
        .iter()
        .all(|c| matches!(c, Node::Leaf(v) if v == first))
        .then(|| first.clone())
}

fn encode_node<T: PlaneValue>(node: &Node<T>, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match node {
        Node::Leaf(value) => {
            out.push(TAG_LEAF);
            value.encode(out)
        }
        Node::Branch(children) => {
            out.push(TAG_BRANCH);
            for child in children.iter() {
                encode_node(child, out)?;
            }
            Ok(())
        }
    }
}

fn decode_node<T: PlaneValue>(input: &mut &[u8], shift: u32) -> Result<Node<T>, CodecError> {
    match take_u8(input)? {
        TAG_LEAF => Ok(Node::Leaf(T::decode(input)?)),
        TAG_BRANCH => {
            if shift == 0 {
                return Err(CodecError::OctreeTooDeep);
            }
            let mut children = Vec::with_capacity(8);
            for _ in 0..8 {
                children.push(decode_node(input, shift - 1)?);
            }
            let children: [Node<T>; 8] = children
                .try_into()
                .unwrap_or_else(|_| unreachable!("exactly eight children decoded"));
            Ok(Node::Branch(Box::new(children)))
        }
        other => Err(CodecError::InvalidNodeTag(other)),
    }
}

fn diff_nodes<T: PlaneValue>(
    a: &Node<T>,
    b: &Node<T>,
    origin: (u8, u8, u8),
    shift: u32,
    out: &mut Vec<BlockAddress>,
) {
    match (a, b) {
        (Node::Leaf(before), Node::Leaf(after)) => {
            if before != after {
                let size = 1u8 << shift;
                for z in 0..size {
                    for y in 0..size {
                        for x in 0..size {
                            out.push(BlockAddress::new(origin.0 + x, origin.1 + y, origin.2 + z));
                        }
                    }
                }
            }
        }
        _ => {
            let next = shift - 1;
            let half = 1u8 << next;
            for i in 0..8 {
                let child_origin = (
                    origin.0 + (i & 1) as u8 * half,
                    origin.1 + ((i >> 1) & 1) as u8 * half,
                    origin.2 + ((i >> 2) & 1) as u8 * half,
                );
                let child_a = match a {
                    Node::Branch(children) => &children[i],
                    leaf => leaf,
                };
                let child_b = match b {
                    Node::Branch(children) => &children[i],
                    leaf => leaf,
                };
                diff_nodes(child_a, child_b, child_origin, next, out);
            }
        }
    }
}
