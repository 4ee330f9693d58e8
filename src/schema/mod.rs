//! study.frame.v1 input schema
//!
//! One record per evaluated video frame: either a pre-computed studying
//! signal or the detector output the heuristic classifies. Records arrive as
//! NDJSON (streaming) or a JSON array (batch).

mod adapter;
mod frame_record;

pub use adapter::*;
pub use frame_record::*;
