//! Grabar: runtime support for replaying recorded browser interactions.
//!
//! Grabar (Spanish: "to record") is the run-time half of a record-and-replay
//! pipeline: the companion `grabar-script-gen` crate compiles a recorded
//! interaction trace into an automation script, and this crate supplies what
//! that script leans on while it runs.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     GRABAR Runtime Support                     │
//! ├────────────────────────────────────────────────────────────────┤
//! │   ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐  │
//! │   │ Locator   │   │ App-Idle  │   │ Forced    │   │ API +   │  │
//! │   │ Resolver  │   │ Wait      │   │ Actions   │   │ Evidence│  │
//! │   └─────┬─────┘   └─────┬─────┘   └─────┬─────┘   └────┬────┘  │
//! │         └───────────────┴───── PageDriver ─────────────┘       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything page-facing goes through the [`page::PageDriver`] trait:
//! [`mock::MockPage`] answers from an in-memory DOM snapshot, and the
//! `browser` feature adds a CDP-backed driver over a real Chromium.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod api;
#[cfg(feature = "browser")]
pub mod cdp;
pub mod evidence;
pub mod force;
pub mod idle;
pub mod mock;
pub mod model;
pub mod page;
pub mod resolve;
pub mod result;
pub mod selector;

pub use api::{ApiRequestExecutor, ApiResponse};
#[cfg(feature = "browser")]
pub use cdp::{BrowserOptions, BrowserSession, CdpPage};
pub use evidence::EvidenceExporter;
pub use force::{force_action, ForceActionKind, ForceFailure};
pub use idle::{wait_for_app_idle, IdleOptions, IdleOutcome, PendingRequests};
pub use model::{Action, ActionType, AssertType, BasicAuthentication};
pub use page::{DomMutation, DomNode, NodeId, PageDriver};
pub use resolve::{resolve_target, Resolved};
pub use result::{GrabarError, GrabarResult};
pub use selector::SelectorSpec;
