#![doc = r"Worklet ref registries and first-screen hydration.

Worklets running on the main thread keep state in refs. Refs touched during
the synchronous first render live in a first-screen registry until the
background context catches up; [`WorkletRuntime::hydrate_ctx`] links them to
the background's persistent refs so no main-thread write is lost."]

pub mod cell;
pub mod descriptor;
pub mod error;
pub mod hydrate;
pub mod runtime;

pub use cell::WorkletRef;
pub use descriptor::{
    decode_init_patch, encode_init_patch, WorkletRefDescriptor, WORKLET_VALUE_ID_KEY,
};
pub use error::WorkletError;
pub use hydrate::HydrationReport;
pub use runtime::{HydrationPhase, WorkletConfig, WorkletRuntime};

/// Worklet value id. Negative ids were minted during first-screen rendering.
pub type WorkletValueId = i64;

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod runtime_tests;

#[cfg(test)]
#[path = "tests/hydrate_tests.rs"]
mod hydrate_tests;
