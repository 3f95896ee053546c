//! This library contains the per-frame image work: taking raw YUV 4:2:0 camera
//! frames, converting them to RGBA, and (optionally) running an edge filter
//! over the result.
//!
//! [processor::FrameProcessor] ties the steps together and is what a producer
//! thread should hold onto.

pub mod convert;
pub mod edge;
pub mod frame;
pub mod processor;
