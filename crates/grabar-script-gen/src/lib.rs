//! Grabar Script Generator: Recorded Actions to Automation Scripts
//!
//! Compiles a recorded browser session (a list of [`grabar::model::Action`]
//! values) into one deterministic Playwright-style script that leans on the
//! `grabar` runtime helpers for ambiguity resolution, idle detection, forced
//! interaction and evidence export.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 GRABAR-SCRIPT-GEN Pipeline                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Recorded   │    │ Per-step   │    │ Assembled  │            │
//! │   │ Actions    │───►│ Emitters   │───►│ Script +   │            │
//! │   │ (JSON)     │    │ (lossy-    │    │ Diagnostics│            │
//! │   └────────────┘    │  tolerant) │    └────────────┘            │
//! │                     └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compilation never fails on bad input: steps that cannot be translated
//! degrade to empty output plus a [`Diagnostic`], so one malformed recording
//! entry never discards the rest of the session.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Per-action emitters covering every recorded interaction kind.
pub mod actions;
/// Assertion emitters and expected-value sourcing.
pub mod asserts;
/// Error and diagnostic types.
pub mod error;
/// JavaScript and JSON literal rendering.
pub mod literal;
/// Script assembly: header, imports, state declarations, step sequencing.
pub mod orchestrator;
/// Selector-candidate array rendering for `resolveTarget` calls.
pub mod selector_literal;
/// Side-effect step bodies: database queries, API calls, storage seeding.
pub mod sideeffect;
/// The `test.step` wrapper shared by every emitted step.
pub mod step;

pub use actions::{page_var, promise_var, EmitContext, FileMapping, Fragment};
pub use error::{Diagnostic, Result, ScriptGenError};
pub use literal::{js_str, json_literal};
pub use orchestrator::{CompiledScript, ScriptCompiler};
pub use selector_literal::{candidates_literal, CandidateArray};
pub use step::Step;
