// Entity Models
//
// Each registry is built once per run from its listing and then only read:
// - Roster: rider identity is the normalized key, ownership has a date window
// - Race catalog: race name → tier + date

pub mod race;
pub mod roster;

pub use race::{Race, RaceCatalog};
pub use roster::{
    ConflictKind, MatchStrategy, Owner, Resolution, Rider, RosterConflict, RosterEntry,
    RosterRegistry, RosterRow,
};
