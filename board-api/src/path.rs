//! Materialized comment paths
//!
//! A path is the concatenation of fixed-width base-62 chunks, one per level of
//! the reply tree. Chunk `n` is the position of the ancestor at depth `n + 1`
//! among its siblings. Because the alphabet is in ASCII order, sorting paths
//! as plain strings lists a whole tree depth-first, with siblings in creation
//! order, and every subtree is a contiguous prefix range.

use std::{fmt, str::FromStr};

use crate::Error;

/// Number of characters in one chunk
pub const CHUNK_SIZE: usize = 5;

/// Maximum number of chunks in a path
pub const MAX_DEPTH: usize = 5;

pub mod chunk {
    use super::CHUNK_SIZE;
    use crate::Error;

    /// Digits in increasing value. This is also their ASCII order, which the
    /// storage layer relies upon for range scans: never reorder it.
    pub const ALPHABET: &[u8; 62] =
        b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

    const BASE: u64 = ALPHABET.len() as u64;

    /// Number of distinct chunks
    pub const CAPACITY: u64 = BASE.pow(CHUNK_SIZE as u32);

    pub const MIN: &str = "00000";
    pub const MAX: &str = "zzzzz";

    pub(crate) const fn digit(b: u8) -> Option<u64> {
        match b {
            b'0'..=b'9' => Some((b - b'0') as u64),
            b'A'..=b'Z' => Some((b - b'A') as u64 + 10),
            b'a'..=b'z' => Some((b - b'a') as u64 + 36),
            _ => None,
        }
    }

    pub fn is_valid(chunk: &str) -> bool {
        chunk.len() == CHUNK_SIZE && chunk.bytes().all(|b| digit(b).is_some())
    }

    /// Most significant digit first
    pub fn decode(chunk: &str) -> Result<u64, Error> {
        if chunk.len() != CHUNK_SIZE {
            return Err(Error::InvalidPathFormat(String::from(chunk)));
        }
        chunk.bytes().try_fold(0, |acc, b| {
            digit(b)
                .map(|d| acc * BASE + d)
                .ok_or_else(|| Error::InvalidPathFormat(String::from(chunk)))
        })
    }

    /// Left-pads with `0` up to `CHUNK_SIZE` characters
    pub fn encode(value: u64) -> Result<String, Error> {
        if value >= CAPACITY {
            return Err(Error::PathOverflow(format!("{value}")));
        }
        let mut res = [ALPHABET[0]; CHUNK_SIZE];
        let mut rest = value;
        for c in res.iter_mut().rev() {
            *c = ALPHABET[(rest % BASE) as usize];
            rest /= BASE;
        }
        Ok(res.iter().map(|&b| b as char).collect())
    }

    pub fn increment(chunk: &str) -> Result<String, Error> {
        let value = decode(chunk)?;
        encode(value + 1).map_err(|_| Error::PathOverflow(String::from(chunk)))
    }

    /// The chunk to allocate after `previous`, or the first one if there is no
    /// previous chunk
    pub fn next(previous: Option<&str>) -> Result<String, Error> {
        match previous {
            None | Some("") => Ok(String::from(MIN)),
            Some(previous) => increment(previous),
        }
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CommentPath(String);

impl CommentPath {
    pub fn new(path: impl Into<String>) -> Result<CommentPath, Error> {
        let path = path.into();
        if path.is_empty()
            || path.len() % CHUNK_SIZE != 0
            || !path.bytes().all(|b| chunk::digit(b).is_some())
        {
            return Err(Error::InvalidPathFormat(path));
        }
        let depth = path.len() / CHUNK_SIZE;
        if depth > MAX_DEPTH {
            return Err(Error::PathDepthExceeded(depth));
        }
        Ok(CommentPath(path))
    }

    /// Path of the first root of a scope
    pub fn first_root() -> CommentPath {
        CommentPath(String::from(chunk::MIN))
    }

    /// Root path to allocate after `last_root`, the greatest root path
    /// currently used in the scope
    pub fn next_root(last_root: Option<&CommentPath>) -> Result<CommentPath, Error> {
        let previous = last_root.map(|p| p.chunk(0));
        Ok(CommentPath(chunk::next(previous)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len() / CHUNK_SIZE
    }

    pub fn is_root(&self) -> bool {
        self.depth() == 1
    }

    /// `None` for roots
    pub fn parent(&self) -> Option<CommentPath> {
        match self.is_root() {
            true => None,
            false => Some(CommentPath(String::from(
                &self.0[..self.0.len() - CHUNK_SIZE],
            ))),
        }
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = CommentPath> {
        std::iter::successors(self.parent(), |p| p.parent())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        (0..self.depth()).map(move |i| self.chunk(i))
    }

    pub fn last_chunk(&self) -> &str {
        self.chunk(self.depth() - 1)
    }

    fn chunk(&self, i: usize) -> &str {
        &self.0[i * CHUNK_SIZE..(i + 1) * CHUNK_SIZE]
    }

    pub fn is_ancestor_of(&self, other: &CommentPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// Path for a new child of `self`
    ///
    /// `last_descendant` is the greatest path currently stored below `self`,
    /// at any depth. Only its chunk one level below `self` matters: the new
    /// child is the sibling right after the child that contains it.
    pub fn create_child_path(
        &self,
        last_descendant: Option<&CommentPath>,
    ) -> Result<CommentPath, Error> {
        if self.depth() >= MAX_DEPTH {
            return Err(Error::PathDepthExceeded(self.depth() + 1));
        }
        let child_chunk = match last_descendant {
            None => String::from(chunk::MIN),
            Some(desc) => {
                if !self.is_ancestor_of(desc) {
                    return Err(Error::InvalidPathFormat(desc.0.clone()));
                }
                chunk::increment(desc.chunk(self.depth()))?
            }
        };
        CommentPath::new(format!("{}{}", self.0, child_chunk))
    }
}

impl fmt::Display for CommentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommentPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<CommentPath, Error> {
        CommentPath::new(s)
    }
}

impl TryFrom<String> for CommentPath {
    type Error = Error;

    fn try_from(s: String) -> Result<CommentPath, Error> {
        CommentPath::new(s)
    }
}

impl From<CommentPath> for String {
    fn from(p: CommentPath) -> String {
        p.0
    }
}

impl AsRef<str> for CommentPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
