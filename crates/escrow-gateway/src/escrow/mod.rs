//! Escrow core: token codec, stored-entry format, and the decision engine.

pub mod engine;
pub mod entry;
pub mod token;
