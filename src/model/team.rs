use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Role of a user inside a team roster. Rosters are owned by the team
/// service; this core only reads them for authority and membership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TeamRole {
    Creator,
    Captain,
    ViceCaptain,
    Moderator,
    Member,
}

impl TeamRole {
    pub const MANAGERS: [TeamRole; 4] = [
        TeamRole::Creator,
        TeamRole::Captain,
        TeamRole::ViceCaptain,
        TeamRole::Moderator,
    ];

    pub fn is_manager(self) -> bool {
        Self::MANAGERS.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_do_not_manage() {
        assert!(TeamRole::ViceCaptain.is_manager());
        assert!(!TeamRole::Member.is_manager());
        assert_eq!("vice_captain".parse::<TeamRole>().unwrap(), TeamRole::ViceCaptain);
    }
}
