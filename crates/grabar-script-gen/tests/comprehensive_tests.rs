//! End-to-end compilation tests for grabar-script-gen.
//!
//! Each test feeds a recording (as the JSON shape recordings actually use)
//! through `ScriptCompiler` and checks the assembled script text.

use grabar::model::{Action, BasicAuthentication};
use grabar_script_gen::{FileMapping, ScriptCompiler};
use serde_json::json;

fn actions(value: serde_json::Value) -> Vec<Action> {
    serde_json::from_value(value).expect("recording parses")
}

fn compile(value: serde_json::Value) -> grabar_script_gen::CompiledScript {
    ScriptCompiler::new().compile(&actions(value), None, None)
}

// ============================================================================
// Whole-session assembly
// ============================================================================

#[test]
fn full_session_compiles_in_recorded_order() {
    let script = compile(json!([
        {
            "action_type": "navigate",
            "description": "Open the dashboard",
            "data": [{"value": "https://app.test/login"}]
        },
        {
            "action_type": "input",
            "elements": [{"selectors": [{"value": "getByLabel('Email')"}], "position": 0}],
            "data": [{"value": "qa@app.test"}]
        },
        {
            "action_type": "click",
            "elements": [{"selectors": [{"value": "getByRole('button', { name: 'Sign in' })"}], "position": 0}]
        },
        {
            "action_type": "assert",
            "assert_type": "text_equals",
            "elements": [{"selectors": [{"value": "locator('.welcome')"}], "position": 0}],
            "data": [{"value": "Welcome back"}]
        }
    ]));

    assert!(script.diagnostics.is_empty(), "{:?}", script.diagnostics);

    let goto = script.source.find("await page.goto('https://app.test/login');");
    let fill = script.source.find("await target.fill('qa@app.test');");
    let click = script.source.find("await target.click();");
    let expect = script.source.find("await expect(target).toHaveText(");
    let (goto, fill, click, expect) = (
        goto.expect("goto"),
        fill.expect("fill"),
        click.expect("click"),
        expect.expect("assert"),
    );
    assert!(goto < fill && fill < click && click < expect);

    // Step titles are 1-based and carry the recorded description when present.
    assert!(script.source.contains("test.step('Step 1: Open the dashboard'"));
    assert!(script.source.contains("test.step('Step 2: input'"));
    // Every interactive step settles before the next begins.
    assert!(script.source.contains("await waitForAppIdle(page);"));
    // Assertions screenshot into the 1-based evidence slot.
    assert!(script
        .source
        .contains("await page.screenshot({ path: 'images/Step_4.png', fullPage: true });"));
}

#[test]
fn compiled_script_opens_and_closes_one_context() {
    let script = compile(json!([
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]}
    ]));
    assert!(script.source.contains("'use strict';"));
    assert!(script
        .source
        .contains("const { test, expect } = require('@playwright/test');"));
    assert!(script.source.contains("const context = await browser.newContext();"));
    assert!(script.source.contains("const page = await context.newPage();"));
    assert!(script.source.trim_end().ends_with("});"));
    assert!(script.source.contains("await context.close();"));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_input_produces_byte_identical_output() {
    let recording = json!([
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]},
        {
            "action_type": "click",
            "elements": [{"selectors": [{"value": "getByTestId('save')"}], "position": 0}]
        },
        {"action_type": "wait", "data": [{"value": 1500}]}
    ]);
    let first = compile(recording.clone());
    let second = compile(recording);
    assert_eq!(first.source, second.source);
}

#[test]
fn different_input_changes_the_header_hash() {
    let a = compile(json!([{"action_type": "navigate", "data": [{"value": "https://a.test"}]}]));
    let b = compile(json!([{"action_type": "navigate", "data": [{"value": "https://b.test"}]}]));
    let hash_line = |source: &str| {
        source
            .lines()
            .find(|l| l.starts_with("// Input hash:"))
            .map(ToOwned::to_owned)
            .expect("hash line")
    };
    assert_ne!(hash_line(&a.source), hash_line(&b.source));
}

// ============================================================================
// Capability-driven imports
// ============================================================================

#[test]
fn imports_track_what_the_recording_uses() {
    let minimal = compile(json!([
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]}
    ]));
    assert!(minimal
        .source
        .contains("const { waitForAppIdle } = require('grabar-runtime');"));
    assert!(!minimal.source.contains("require('pg')"));
    assert!(!minimal.source.contains("resolveTarget,"));

    let with_db = compile(json!([
        {
            "action_type": "database_execution",
            "data": [{"statement": {
                "query": "SELECT status FROM orders WHERE id = 7",
                "database_connection": {
                    "host": "db.internal", "port": 5432, "database": "shop",
                    "username": "svc", "password": "pw", "engine": "postgres"
                }
            }}]
        }
    ]));
    assert!(with_db.source.contains("const { Client } = require('pg');"));
    assert!(with_db
        .source
        .contains("const { waitForAppIdle, exportDbEvidence } = require('grabar-runtime');"));
}

#[test]
fn each_engine_pulls_its_own_client() {
    let mysql = compile(json!([
        {"action_type": "database_execution", "data": [{"statement": {
            "query": "SELECT 1",
            "connection": {"host": "h", "port": 3306, "database": "d",
                           "username": "u", "password": "p", "engine": "mysql"}
        }}]}
    ]));
    assert!(mysql
        .source
        .contains("const mysql = require('mysql2/promise');"));
    assert!(!mysql.source.contains("require('pg')"));

    let mssql = compile(json!([
        {"action_type": "database_execution", "data": [{"statement": {
            "query": "SELECT 1",
            "connection": {"host": "h", "port": 1433, "database": "d",
                           "username": "u", "password": "p", "engine": "mssql"}
        }}]}
    ]));
    assert!(mssql.source.contains("const mssql = require('mssql');"));
}

// ============================================================================
// Multi-page flows
// ============================================================================

#[test]
fn popup_flow_arms_before_click_and_resumes_on_create() {
    let script = compile(json!([
        {
            "action_type": "click",
            "elements": [{"selectors": [{"value": "getByText('Open invoice')"}], "position": 0}]
        },
        {
            "action_type": "page_create",
            "data": [{"value": {"page_index": 1, "opener_index": 0}}]
        },
        {
            "action_type": "click",
            "elements": [{"selectors": [{"value": "locator('#print')"}], "position": 0}],
            "data": [{"value": {"page_index": 1}}]
        },
        {
            "action_type": "page_close",
            "data": [{"value": {"page_index": 1}}]
        }
    ]));

    assert!(script.diagnostics.is_empty(), "{:?}", script.diagnostics);
    assert!(script.source.contains("  let page2;\n"));
    assert!(script.source.contains("  let page2Promise;\n"));

    let armed = script
        .source
        .find("page2Promise = page.waitForEvent('popup');")
        .expect("armed");
    let clicked = script.source.find("await target.click();").expect("click");
    let resumed = script
        .source
        .find("page2 = await page2Promise;")
        .expect("resumed");
    assert!(armed < clicked && clicked < resumed);

    // Steps on the popup address it, and closing skips the idle wait.
    assert!(script.source.contains("await resolveTarget(page2, "));
    assert!(script.source.contains("await page2.close();"));
}

// ============================================================================
// Expected-value sourcing
// ============================================================================

#[test]
fn db_sourced_assertion_queries_then_compares() {
    let script = compile(json!([
        {
            "action_type": "assert",
            "assert_type": "text_equals",
            "elements": [{"selectors": [{"value": "getByTestId('order-status')"}], "position": 0}],
            "data": [{"statement": {
                "query": "SELECT status FROM orders WHERE id = 7",
                "connection": {"host": "db.internal", "port": 5432, "database": "shop",
                               "username": "svc", "password": "pw", "engine": "postgres"}
            }}]
        }
    ]));

    let query = script
        .source
        .find("await client1.query('SELECT status FROM orders WHERE id = 7')")
        .expect("query runs");
    let evidence = script
        .source
        .find("await exportDbEvidence(1, rows1);")
        .expect("evidence exported");
    let compare = script
        .source
        .find("await expect(target).toHaveText(expected1);")
        .expect("comparison");
    assert!(query < evidence && evidence < compare);
}

#[test]
fn api_sourced_assertion_extracts_the_named_field() {
    let script = compile(json!([
        {
            "action_type": "assert",
            "assert_type": "value_equals",
            "elements": [{"selectors": [{"value": "locator('#total')"}], "position": 0}],
            "data": [
                {"api_request": {"url": "https://api.test/orders/7", "method": "GET"}},
                {"value": {"field": "total"}}
            ]
        }
    ]));
    assert!(script.source.contains("const response1 = await apiRequest(page, "));
    assert!(script.source.contains("await exportApiEvidence(1, response1);"));
    assert!(script
        .source
        .contains("const expected1 = String(response1.body['total'] ?? '');"));
    assert!(script
        .source
        .contains("await expect(target).toHaveValue(expected1);"));
}

// ============================================================================
// AI assertions
// ============================================================================

#[test]
fn ai_assertion_defines_predicate_before_the_test_body() {
    let script = compile(json!([
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]},
        {
            "action_type": "assert",
            "assert_type": "ai",
            "description": "Order summary looks complete",
            "elements": [{"selectors": [{"value": "locator('.summary')"}], "position": 0}]
        }
    ]));
    let predicate = script
        .source
        .find("function aiPredicate2(...evidence)")
        .expect("predicate defined");
    let body = script.source.find("test('Recorded flow'").expect("body");
    assert!(predicate < body);
    assert!(script.source.contains("// Order summary looks complete"));
    assert!(script
        .source
        .contains("expect(aiPredicate2(...evidence2)).toBe(true);"));
}

// ============================================================================
// Credentials and files
// ============================================================================

#[test]
fn basic_auth_and_file_mapping_flow_through() {
    let auth = BasicAuthentication {
        username: "qa".to_string(),
        password: "pa'ss".to_string(),
    };
    let mut files = FileMapping::new();
    files.insert("upload-1", "/fixtures/contract.pdf");
    let recording = actions(json!([
        {
            "action_type": "upload",
            "elements": [{"selectors": [{"value": "locator('input[type=file]')"}], "position": 0}],
            "data": [{"file_upload": {"file_id": "upload-1", "file_name": "contract.pdf"}}]
        }
    ]));
    let script = ScriptCompiler::new().compile(&recording, Some(&auth), Some(&files));
    assert!(script
        .source
        .contains(r"httpCredentials: { username: 'qa', password: 'pa\'ss' }"));
    assert!(script
        .source
        .contains("await target.setInputFiles('/fixtures/contract.pdf');"));
}

// ============================================================================
// Degradation
// ============================================================================

#[test]
fn bad_steps_degrade_to_diagnostics_without_poisoning_the_rest() {
    let script = compile(json!([
        {"action_type": "teleport"},
        {"action_type": "click"},
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]}
    ]));
    assert_eq!(script.diagnostics.len(), 2);
    assert_eq!(script.diagnostics[0].ordinal, 0);
    assert_eq!(script.diagnostics[1].ordinal, 1);
    // The healthy step still compiled.
    assert!(script.source.contains("await page.goto('https://app.test');"));
}

#[test]
fn unparseable_selector_candidates_are_reported_and_skipped() {
    let script = compile(json!([
        {
            "action_type": "click",
            "elements": [{"selectors": [
                {"value": "not a playwright call at all((("},
                {"value": "locator('#fallback')"}
            ], "position": 0}]
        }
    ]));
    assert_eq!(script.diagnostics.len(), 1);
    assert!(script.source.contains(r##"{"kind":"css","value":"#fallback"}"##));
}

// ============================================================================
// Output plumbing
// ============================================================================

#[test]
fn write_to_persists_the_exact_source() {
    let script = compile(json!([
        {"action_type": "navigate", "data": [{"value": "https://app.test"}]}
    ]));
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("flow.spec.js");
    script.write_to(&path).expect("write");
    let read_back = std::fs::read_to_string(&path).expect("read");
    assert_eq!(read_back, script.source);
}

#[test]
fn diagnostics_serialize_as_json() {
    let script = compile(json!([{"action_type": "teleport"}]));
    let rendered = script.diagnostics_json().expect("serializes");
    assert!(rendered.contains("\"ordinal\": 0"));
}
