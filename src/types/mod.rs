//! Data types shared by the client and the relay
//!
//! This module contains the update batch model and the wire envelope.

mod envelope;
mod update;

pub use envelope::{Envelope, CMD_JSON_DATA, CMD_SUBSCRIBE, CMD_UNSUBSCRIBE};
pub use update::{UpdateBatch, UpdateKey};
