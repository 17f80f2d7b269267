//! Script assembly.
//!
//! The orchestrator scans the action list once to decide the dependency set
//! (which runtime helpers and DB clients the script imports), declares the
//! shared mutable state (page handles, popup promises), runs the AI-predicate
//! collection pass, then emits each step in recorded order handing every
//! emitter a lookahead reference to its successor. Emission is sequential
//! and pure: identical input produces byte-identical output, which the
//! header's input hash makes checkable.

use std::path::Path;

use grabar::model::{Action, ActionType, BasicAuthentication, DbEngine};

use crate::actions::{self, page_var, promise_var, EmitContext, FileMapping};
use crate::asserts;
use crate::error::{Diagnostic, Result};
use crate::literal::js_str;

/// A compiled script plus everything the compiler had to report.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// Complete generated source text
    pub source: String,
    /// Per-step notices, in step order
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledScript {
    /// Write the source to a file.
    ///
    /// # Errors
    ///
    /// IO failures.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.source)?;
        Ok(())
    }

    /// Diagnostics rendered as a JSON array.
    ///
    /// # Errors
    ///
    /// Serialization failures.
    pub fn diagnostics_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.diagnostics)?)
    }
}

/// Compiles recorded actions into one automation script.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    /// New compiler. Stateless; one instance can compile any number of
    /// inputs.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compile an action list into a complete script.
    ///
    /// Never fails: untranslatable steps become empty fragments with
    /// diagnostics, and malformed payloads degrade to safe defaults.
    #[must_use]
    pub fn compile(
        &self,
        actions: &[Action],
        auth: Option<&BasicAuthentication>,
        files: Option<&FileMapping>,
    ) -> CompiledScript {
        let capabilities = Capabilities::scan(actions);
        let ctx = EmitContext { files };
        let mut diagnostics = Vec::new();

        let mut source = String::new();
        source.push_str(&header(actions, auth, &capabilities));

        // Collection pass: one predicate function per AI assertion, before
        // the test body so every step can call its own.
        for (ordinal, action) in actions.iter().enumerate() {
            if let Some(predicate) = asserts::predicate_function(action, ordinal) {
                source.push_str(&predicate);
                source.push('\n');
            }
        }

        source.push_str("test('Recorded flow', async ({ browser }) => {\n");
        source.push_str(&context_line(auth));
        source.push_str("  const page = await context.newPage();\n");
        for declaration in state_declarations(actions) {
            source.push_str(&declaration);
        }
        source.push('\n');

        for (ordinal, action) in actions.iter().enumerate() {
            let fragment = actions::emit(action, ordinal, actions.get(ordinal + 1), &ctx);
            diagnostics.extend(fragment.diagnostics);
            if !fragment.code.is_empty() {
                source.push_str(&fragment.code);
                source.push('\n');
            }
        }

        source.push_str("  await context.close();\n");
        source.push_str("});\n");

        CompiledScript {
            source,
            diagnostics,
        }
    }
}

// ============================================================================
// Capability scan
// ============================================================================

/// What the script needs imported, decided by one pass over the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Capabilities {
    resolver: bool,
    force: bool,
    api: bool,
    db_evidence: bool,
    api_evidence: bool,
    postgres: bool,
    mysql: bool,
    mssql: bool,
}

impl Capabilities {
    fn scan(actions: &[Action]) -> Self {
        let mut caps = Self::default();
        for action in actions {
            if !action.elements.is_empty() {
                caps.resolver = true;
                // Plain interactions emit a synthetic-event retry path.
                if matches!(
                    action.action_type,
                    ActionType::Click
                        | ActionType::DoubleClick
                        | ActionType::Input
                        | ActionType::Select
                ) {
                    caps.force = true;
                }
            }
            if let Some(statement) = action.statement() {
                caps.db_evidence = true;
                match statement.connection.engine {
                    DbEngine::Postgres => caps.postgres = true,
                    DbEngine::Mysql => caps.mysql = true,
                    DbEngine::Mssql => caps.mssql = true,
                }
            }
            if action.api_request().is_some() {
                caps.api = true;
                caps.api_evidence = true;
            }
        }
        caps
    }

    /// Runtime helper names, in fixed order for determinism.
    fn runtime_imports(self) -> Vec<&'static str> {
        let mut names = vec!["waitForAppIdle"];
        if self.resolver {
            names.push("resolveTarget");
        }
        if self.force {
            names.push("forceAction");
        }
        if self.api {
            names.push("apiRequest");
        }
        if self.db_evidence {
            names.push("exportDbEvidence");
        }
        if self.api_evidence {
            names.push("exportApiEvidence");
        }
        names
    }
}

// ============================================================================
// Assembly pieces
// ============================================================================

fn header(
    actions: &[Action],
    auth: Option<&BasicAuthentication>,
    capabilities: &Capabilities,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "// Generated by grabar-script-gen {} - do not edit\n",
        env!("CARGO_PKG_VERSION")
    ));
    out.push_str(&format!("// Input hash: blake3:{}\n", input_hash(actions, auth)));
    out.push_str("'use strict';\n\n");
    out.push_str("const { test, expect } = require('@playwright/test');\n");
    out.push_str(&format!(
        "const {{ {} }} = require('grabar-runtime');\n",
        capabilities.runtime_imports().join(", ")
    ));
    if capabilities.postgres {
        out.push_str("const { Client } = require('pg');\n");
    }
    if capabilities.mysql {
        out.push_str("const mysql = require('mysql2/promise');\n");
    }
    if capabilities.mssql {
        out.push_str("const mssql = require('mssql');\n");
    }
    out.push('\n');
    out
}

fn input_hash(actions: &[Action], auth: Option<&BasicAuthentication>) -> String {
    let serialized = serde_json::to_vec(&(actions, auth)).unwrap_or_default();
    blake3::hash(&serialized).to_hex().to_string()
}

fn context_line(auth: Option<&BasicAuthentication>) -> String {
    match auth {
        Some(auth) => format!(
            "  const context = await browser.newContext({{ httpCredentials: {{ username: {}, password: {} }} }});\n",
            js_str(&auth.username),
            js_str(&auth.password)
        ),
        None => "  const context = await browser.newContext();\n".to_string(),
    }
}

/// `let` declarations for created pages and popup promises: one page handle
/// per distinct non-zero `page_index` referenced by a `page_create`, one
/// promise per distinct created index arriving through an opener.
fn state_declarations(actions: &[Action]) -> Vec<String> {
    let mut page_indexes = Vec::new();
    let mut promise_indexes = Vec::new();
    for action in actions {
        if action.action_type != ActionType::PageCreate {
            continue;
        }
        let index = action.page_index();
        if index == 0 {
            continue;
        }
        if !page_indexes.contains(&index) {
            page_indexes.push(index);
        }
        if action.opener_index().is_some() && !promise_indexes.contains(&index) {
            promise_indexes.push(index);
        }
    }
    page_indexes.sort_unstable();
    promise_indexes.sort_unstable();

    let mut out = Vec::new();
    for index in page_indexes {
        out.push(format!("  let {};\n", page_var(index)));
    }
    for index in promise_indexes {
        out.push(format!("  let {};\n", promise_var(index)));
    }
    out
}
