use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;

/// The five court roles. Holding a role's card is what makes a claim
/// truthful; everyone may still claim any role.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Duke,
    Assassin,
    Captain,
    Ambassador,
    Contessa,
}

pub static ROLE_VARIANTS: [Role; 5] = [
    Role::Duke,
    Role::Assassin,
    Role::Captain,
    Role::Ambassador,
    Role::Contessa,
];

impl Role {
    /// The action this role lets its holder claim, if any.
    pub fn action(self) -> Option<ActionKind> {
        match self {
            Role::Duke => Some(ActionKind::Tax),
            Role::Assassin => Some(ActionKind::Assassinate),
            Role::Captain => Some(ActionKind::Steal),
            Role::Ambassador => Some(ActionKind::Exchange),
            Role::Contessa => None,
        }
    }

    /// Whether a claim of this role blocks the given action.
    pub fn blocks(self, kind: ActionKind) -> bool {
        kind.blocking_roles().contains(&self)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Duke => "Duke",
            Role::Assassin => "Assassin",
            Role::Captain => "Captain",
            Role::Ambassador => "Ambassador",
            Role::Contessa => "Contessa",
        };
        f.write_str(name)
    }
}
