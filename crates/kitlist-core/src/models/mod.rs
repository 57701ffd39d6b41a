//! Data models for Kitlist

mod change;
mod conflict;
mod item;
mod person;
mod rules;
mod trip;

pub use change::{Change, ChangePayload, EntityKind, Operation};
pub use conflict::{ConflictType, SyncConflict};
pub use item::Item;
pub use person::Person;
pub use rules::{DefaultItemRule, RuleCalculation, RuleConditions, RuleOverride, RulePack, TripRule};
pub use trip::Trip;
