// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end scenarios for the hot reload gate and the generation pass.
//!
//! - `hotload` - gate decisions over whole compilation sets
//! - `generation` - parallel generation through the public API
//! - `cycles` - several compile cycles through one `HotpatchSession`
//! - `common` - fixtures shared by the scenarios
//!
//! ```bash
//! cargo test -p hotpatch --test scenarios
//! ```

#[path = "scenarios/common/mod.rs"]
mod common;

#[path = "scenarios/hotload.rs"]
mod hotload;

#[path = "scenarios/generation.rs"]
mod generation;

#[path = "scenarios/cycles.rs"]
mod cycles;
