//! `tomoframe` is a Rust library for pattern-based decomposition of
//! tomography datasets into independent work units.
//!
//! A pipeline is a chain of processing stages over N-dimensional datasets.
//! Each stage names the [`Pattern`](tomoframe_pattern::Pattern) it wants its
//! data in (projections, sinograms, reconstruction volumes), a frame budget,
//! and optionally boundary [`Padding`](tomoframe_pattern::Padding); the
//! framework turns that into a deterministic
//! [`SliceList`](tomoframe_pattern::SliceList) of rectangular work units that
//! workers process independently. Dataset geometry flows through the chain by
//! pure [`shape inference`](shape_inference): each stage declares how its
//! outputs derive from its inputs and the framework sizes and labels the
//! output datasets before any data moves.
//!
//! Parameter sweeps come for free: a `;`-separated parameter value expands
//! into extra output dimensions, one result hyperplane per value
//! combination.
//!
//! ## Licence
//! `tomoframe` is licensed under either of
//!  - the Apache License, Version 2.0 ([LICENSE-APACHE](https://www.apache.org/licenses/LICENSE-2.0) or <http://www.apache.org/licenses/LICENSE-2.0>) or
//!  - the MIT license ([LICENSE-MIT](https://opensource.org/licenses/MIT) or <http://opensource.org/licenses/MIT>), at your option.

pub mod axis;
pub mod dataset;
pub mod parameters;
pub mod shape_inference;
pub mod stage;
pub mod storage;

pub use tomoframe_pattern as pattern;
pub use tomoframe_plugin as plugin;
