//! Parties domain module (suppliers and customers).

pub mod party;

pub use party::{
    ContactInfo, Party, PartyId, PartyKind, PartyStatus, RegisterParty, SuspendParty, UpdateDetails,
};
