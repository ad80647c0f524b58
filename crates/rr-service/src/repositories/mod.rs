//! Repository layer for the Room Registry.
//!
//! Provides room storage following the Handler -> Service -> Repository
//! architecture. Backends implement [`RoomStore`]; the compare-and-update
//! retry loop is shared by all of them.

pub mod memory;
pub mod room_store;
pub mod rooms;

pub use memory::InMemoryRoomStore;
pub use room_store::{
    compare_and_update, get, insert_if_absent, Mutation, RoomStore, Versioned,
    MAX_UPDATE_ATTEMPTS,
};
pub use rooms::PgRoomStore;
