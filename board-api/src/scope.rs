use uuid::Uuid;

use crate::STUB_UUID;

/// Opaque key grouping comments together, eg. the article they are about
///
/// Two scopes never share siblings: paths are only unique within a scope.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ScopeId(pub Uuid);

impl ScopeId {
    pub fn stub() -> ScopeId {
        ScopeId(STUB_UUID)
    }
}
