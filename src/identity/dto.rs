use serde::{Deserialize, Serialize};

use crate::identity::{Profile, Role};

/// Identity as returned by the identity service. The profile row is optional
/// upstream and is settled once in `Identity::provision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub profile: Option<Profile>,
}
