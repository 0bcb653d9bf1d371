use crate::{Comment, Error, MAX_DEPTH};

/// Business rules on top of what paths can encode
///
/// Paths go down to `MAX_DEPTH` levels but conversations are usually kept
/// shallower. `max_reply_depth` counts the root as depth 1, so the default of
/// 2 only allows replies directly under root comments.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "RawTreePolicy")]
pub struct TreePolicy {
    max_reply_depth: usize,
}

#[derive(serde::Deserialize)]
#[serde(default)]
struct RawTreePolicy {
    max_reply_depth: usize,
}

impl Default for RawTreePolicy {
    fn default() -> RawTreePolicy {
        RawTreePolicy {
            max_reply_depth: TreePolicy::DEFAULT_MAX_REPLY_DEPTH,
        }
    }
}

impl TryFrom<RawTreePolicy> for TreePolicy {
    type Error = Error;

    fn try_from(raw: RawTreePolicy) -> Result<TreePolicy, Error> {
        TreePolicy::new(raw.max_reply_depth)
    }
}

impl Default for TreePolicy {
    fn default() -> TreePolicy {
        TreePolicy {
            max_reply_depth: TreePolicy::DEFAULT_MAX_REPLY_DEPTH,
        }
    }
}

impl TreePolicy {
    pub const DEFAULT_MAX_REPLY_DEPTH: usize = 2;

    pub fn new(max_reply_depth: usize) -> Result<TreePolicy, Error> {
        if max_reply_depth == 0 || max_reply_depth > MAX_DEPTH {
            return Err(Error::InvalidPolicy(format!(
                "max reply depth must be between 1 and {MAX_DEPTH}, got {max_reply_depth}"
            )));
        }
        Ok(TreePolicy { max_reply_depth })
    }

    pub fn max_reply_depth(&self) -> usize {
        self.max_reply_depth
    }

    /// Checks that a reply to `parent` would not be nested too deep
    pub fn check_reply(&self, parent: &Comment) -> Result<(), Error> {
        match parent.depth() < self.max_reply_depth {
            true => Ok(()),
            false => Err(Error::NotRootReply {
                parent: parent.id(),
                max_reply_depth: self.max_reply_depth,
            }),
        }
    }
}
