/*
[INPUT]:  Stream payload schemas and serde requirements
[OUTPUT]: Typed Rust event structs with serialization support
[POS]:    Data layer - type definitions for stream communication
[UPDATE]: When the stream schema changes or new event types are added
*/

pub mod events;

pub use events::*;
