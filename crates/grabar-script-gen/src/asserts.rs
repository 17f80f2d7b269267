//! Assertion emitters, one per assertion kind.
//!
//! Every assertion captures a full-page screenshot before evaluating its
//! check, so a failure always leaves visual evidence. Expected values come
//! from a fixed sourcing priority: a carried DB statement first, then a
//! carried API request, then the recorded literal. Structural kinds are
//! direct predicate checks. The `ai` kind harvests DOM, DB, and API
//! evidence in that order and feeds it positionally into a predicate
//! function generated earlier by the orchestrator's collection pass.

use grabar::model::{Action, AssertType};
use grabar::selector::SelectorSpec;
use serde_json::Value;

use crate::actions::{page_var, Fragment};
use crate::error::Diagnostic;
use crate::literal::js_str;
use crate::selector_literal::{candidates_literal, locator_chain};
use crate::sideeffect;
use crate::step::Step;

/// Emit one assert action as a complete step fragment.
#[must_use]
pub fn emit(action: &Action, ordinal: usize) -> Fragment {
    let Some(assert_type) = action.assert_type else {
        return Fragment {
            code: String::new(),
            diagnostics: vec![Diagnostic::new(
                ordinal,
                "assert step carries no assert_type",
            )],
        };
    };

    let n = ordinal + 1;
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();

    let mut lines = vec![screenshot_line(&page, n, None)];

    let body = match assert_type {
        AssertType::TextEquals => {
            expectation(action, n, &page, ordinal, "toHaveText", &mut diagnostics)
        }
        AssertType::TextContains => {
            expectation(action, n, &page, ordinal, "toContainText", &mut diagnostics)
        }
        AssertType::ValueEquals => {
            expectation(action, n, &page, ordinal, "toHaveValue", &mut diagnostics)
        }
        AssertType::AttributeEquals => attribute_equals(action, n, &page, ordinal, &mut diagnostics),
        AssertType::UrlEquals => page_expectation(action, n, &page, "toHaveURL"),
        AssertType::TitleEquals => page_expectation(action, n, &page, "toHaveTitle"),
        AssertType::ElementCount => element_count(action, &page, ordinal, &mut diagnostics),
        AssertType::Ai => ai(action, n, &page, ordinal, &mut diagnostics),
        structural => structural_check(action, &page, ordinal, structural, &mut diagnostics),
    };

    let Some(body) = body else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    lines.extend(body);

    Fragment {
        code: Step::new(ordinal, action.description.as_deref(), "assert")
            .on_page(&page)
            .lines(lines)
            .render(),
        diagnostics,
    }
}

/// The predicate function for an `ai` assertion, emitted once before the
/// test body by the orchestrator's collection pass.
#[must_use]
pub fn predicate_function(action: &Action, ordinal: usize) -> Option<String> {
    if action.assert_type != Some(AssertType::Ai) {
        return None;
    }
    let n = ordinal + 1;
    let description = action
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("recorded check");
    // Evidence arrives positionally: DOM markup, then DB rows, then API body.
    Some(format!(
        "function aiPredicate{n}(...evidence) {{\n  // {}\n  return evidence.length > 0 && evidence.every(item => item !== null && item !== undefined && item !== '');\n}}\n",
        description.replace('\n', " ")
    ))
}

// ============================================================================
// Expected-value sourcing
// ============================================================================

/// Prelude lines plus the expression holding the expected value, chosen by
/// priority: DB statement, then API request, then recorded literal.
fn expected_value(action: &Action, n: usize, page: &str) -> (Vec<String>, String) {
    if let Some(statement) = action.statement() {
        let mut lines = sideeffect::db_lines(statement, n);
        lines.push(sideeffect::db_expected_line(n));
        return (lines, format!("expected{n}"));
    }
    if let Some(request) = action.api_request() {
        let mut lines = sideeffect::api_lines(request, n, page);
        let field = action
            .value_field("field")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        lines.push(sideeffect::api_expected_line(n, field.as_deref()));
        return (lines, format!("expected{n}"));
    }
    let literal = action.first_value_str().unwrap_or_default();
    (Vec::new(), js_str(&literal))
}

// ============================================================================
// Per-kind bodies
// ============================================================================

fn expectation(
    action: &Action,
    n: usize,
    page: &str,
    ordinal: usize,
    matcher: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    let resolve = resolve_target(action, 0, "target", page, ordinal, diagnostics)?;
    let (mut lines, expected) = expected_value(action, n, page);
    lines.insert(0, resolve);
    lines.push(format!("await expect(target).{matcher}({expected});"));
    Some(lines)
}

fn attribute_equals(
    action: &Action,
    n: usize,
    page: &str,
    ordinal: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    let resolve = resolve_target(action, 0, "target", page, ordinal, diagnostics)?;
    let name = action
        .value_field("attribute_name")
        .and_then(Value::as_str)
        .unwrap_or("value");
    let (mut lines, expected) = expected_value(action, n, page);
    lines.insert(0, resolve);
    lines.push(format!(
        "await expect(target).toHaveAttribute({}, {expected});",
        js_str(name)
    ));
    Some(lines)
}

fn page_expectation(action: &Action, n: usize, page: &str, matcher: &str) -> Option<Vec<String>> {
    let (mut lines, expected) = expected_value(action, n, page);
    lines.push(format!("await expect({page}).{matcher}({expected});"));
    Some(lines)
}

fn structural_check(
    action: &Action,
    page: &str,
    ordinal: usize,
    kind: AssertType,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    let resolve = resolve_target(action, 0, "target", page, ordinal, diagnostics)?;
    let check = match kind {
        AssertType::Visible => "await expect(target).toBeVisible();",
        AssertType::Hidden => "await expect(target).toBeHidden();",
        AssertType::Enabled => "await expect(target).toBeEnabled();",
        AssertType::Disabled => "await expect(target).toBeDisabled();",
        AssertType::Checked => "await expect(target).toBeChecked();",
        AssertType::Unchecked => "await expect(target).not.toBeChecked();",
        AssertType::Focused => "await expect(target).toBeFocused();",
        AssertType::Empty => "await expect(target).toBeEmpty();",
        AssertType::NotEmpty => "await expect(target).not.toBeEmpty();",
        AssertType::Editable => "await expect(target).toBeEditable();",
        AssertType::ReadOnly => "await expect(target).toHaveJSProperty('readOnly', true);",
        _ => {
            diagnostics.push(Diagnostic::new(
                ordinal,
                format!("assertion kind {kind:?} has no structural check"),
            ));
            return None;
        }
    };
    Some(vec![resolve, check.to_string()])
}

fn element_count(
    action: &Action,
    page: &str,
    ordinal: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    // Counting needs a plain locator, not a resolved single target.
    let ordered = action.elements_in_dom_order();
    let candidate = ordered.first().and_then(|e| e.selectors.first());
    let Some(candidate) = candidate else {
        diagnostics.push(Diagnostic::new(ordinal, "element_count needs a selector"));
        return None;
    };
    let spec = match SelectorSpec::parse(&candidate.value) {
        Ok(spec) => spec,
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                ordinal,
                format!("selector '{}': {err}", candidate.value),
            ));
            return None;
        }
    };
    let expected = action.first_value_u64().unwrap_or(0);
    Some(vec![format!(
        "await expect({}).toHaveCount({expected});",
        locator_chain(page, &spec)
    )])
}

fn ai(
    action: &Action,
    n: usize,
    page: &str,
    ordinal: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    let mut lines = vec![format!("const evidence{n} = [];")];

    // DOM evidence first, in document position order.
    for (i, element) in action.elements_in_dom_order().into_iter().enumerate() {
        let idx = i + 1;
        let candidates = candidates_literal(element);
        for dropped in candidates.dropped {
            diagnostics.push(Diagnostic::new(ordinal, dropped));
        }
        let var = format!("target{n}_{idx}");
        lines.push(format!(
            "const {var} = await resolveTarget({page}, {});",
            candidates.expression
        ));
        lines.push(format!(
            "await {var}.screenshot({{ path: 'images/Step_{n}_{idx}.png' }});"
        ));
        lines.push(format!(
            "evidence{n}.push(await {var}.evaluate(el => el.outerHTML));"
        ));
    }

    // Then DB evidence.
    if let Some(statement) = action.statement() {
        lines.extend(sideeffect::db_lines(statement, n));
        lines.push(format!("evidence{n}.push(rows{n});"));
    }

    // Then API evidence.
    if let Some(request) = action.api_request() {
        lines.extend(sideeffect::api_lines(request, n, page));
        lines.push(format!("evidence{n}.push(response{n}.body);"));
    }

    lines.push(format!("expect(aiPredicate{n}(...evidence{n})).toBe(true);"));
    Some(lines)
}

// ============================================================================
// Helpers
// ============================================================================

fn screenshot_line(page: &str, n: usize, element_index: Option<usize>) -> String {
    let name = match element_index {
        Some(i) => format!("Step_{n}_{i}"),
        None => format!("Step_{n}"),
    };
    format!("await {page}.screenshot({{ path: 'images/{name}.png', fullPage: true }});")
}

fn resolve_target(
    action: &Action,
    element_index: usize,
    var: &str,
    page: &str,
    ordinal: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    let ordered = action.elements_in_dom_order();
    let Some(element) = ordered.get(element_index).copied() else {
        diagnostics.push(Diagnostic::new(
            ordinal,
            "assertion references an element it does not carry",
        ));
        return None;
    };
    let candidates = candidates_literal(element);
    for dropped in candidates.dropped {
        diagnostics.push(Diagnostic::new(ordinal, dropped));
    }
    Some(format!(
        "const {var} = await resolveTarget({page}, {});",
        candidates.expression
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabar::model::{
        ActionData, ActionType, ApiRequest, Connection, DbEngine, Element, SelectorCandidate,
        Statement,
    };
    use serde_json::json;

    fn assert_action(kind: AssertType) -> Action {
        let mut action = Action::new(ActionType::Assert);
        action.assert_type = Some(kind);
        action.elements.push(Element {
            selectors: vec![SelectorCandidate {
                value: "locator('#status')".to_string(),
            }],
            position: 0,
        });
        action
    }

    fn statement() -> Statement {
        Statement {
            query: "SELECT status FROM orders".to_string(),
            connection: Connection {
                host: "db".to_string(),
                port: 5432,
                database: "app".to_string(),
                username: "svc".to_string(),
                password: "pw".to_string(),
                engine: DbEngine::Postgres,
            },
        }
    }

    #[test]
    fn test_screenshot_precedes_check() {
        let action = assert_action(AssertType::Visible);
        let fragment = emit(&action, 2);
        let shot = fragment
            .code
            .find("images/Step_3.png")
            .expect("screenshot");
        let check = fragment.code.find("toBeVisible").expect("check");
        assert!(shot < check);
    }

    #[test]
    fn test_literal_expected_value() {
        let mut action = assert_action(AssertType::TextEquals);
        action.data.push(ActionData {
            value: Some(json!("Shipped")),
            ..ActionData::default()
        });
        let fragment = emit(&action, 0);
        assert!(fragment.code.contains("await expect(target).toHaveText('Shipped');"));
    }

    #[test]
    fn test_db_beats_api_when_both_present() {
        let mut action = assert_action(AssertType::TextEquals);
        action.data.push(ActionData {
            statement: Some(statement()),
            ..ActionData::default()
        });
        action.data.push(ActionData {
            api_request: Some(ApiRequest {
                url: "https://api.local/orders/1".to_string(),
                ..ApiRequest::default()
            }),
            ..ActionData::default()
        });
        let fragment = emit(&action, 0);
        assert!(fragment.code.contains("client1.query"), "DB path taken");
        assert!(
            !fragment.code.contains("apiRequest("),
            "API path must not run when a statement is present"
        );
        assert!(fragment.code.contains("await expect(target).toHaveText(expected1);"));
    }

    #[test]
    fn test_api_sourcing_exports_and_extracts_field() {
        let mut action = assert_action(AssertType::ValueEquals);
        action.data.push(ActionData {
            api_request: Some(ApiRequest {
                url: "https://api.local/orders/1".to_string(),
                ..ApiRequest::default()
            }),
            ..ActionData::default()
        });
        action.data.push(ActionData {
            value: Some(json!({"field": "status"})),
            ..ActionData::default()
        });
        let fragment = emit(&action, 3);
        assert!(fragment.code.contains("await exportApiEvidence(4, response4);"));
        assert!(fragment
            .code
            .contains("const expected4 = String(response4.body['status'] ?? '');"));
    }

    #[test]
    fn test_structural_kinds_take_no_expected_value() {
        let fragment = emit(&assert_action(AssertType::Unchecked), 0);
        assert!(fragment.code.contains("await expect(target).not.toBeChecked();"));
        assert!(!fragment.code.contains("expected1"));
    }

    #[test]
    fn test_element_count_uses_plain_locator() {
        let mut action = assert_action(AssertType::ElementCount);
        action.data.push(ActionData {
            value: Some(json!(3)),
            ..ActionData::default()
        });
        let fragment = emit(&action, 0);
        assert!(fragment
            .code
            .contains("await expect(page.locator('#status')).toHaveCount(3);"));
    }

    #[test]
    fn test_ai_orders_evidence_dom_then_db_then_api() {
        let mut action = assert_action(AssertType::Ai);
        action.data.push(ActionData {
            statement: Some(statement()),
            ..ActionData::default()
        });
        action.data.push(ActionData {
            api_request: Some(ApiRequest {
                url: "https://api.local/orders".to_string(),
                ..ApiRequest::default()
            }),
            ..ActionData::default()
        });
        let fragment = emit(&action, 4);
        let dom = fragment.code.find("el.outerHTML").expect("dom evidence");
        let db = fragment.code.find("evidence5.push(rows5)").expect("db evidence");
        let api = fragment
            .code
            .find("evidence5.push(response5.body)")
            .expect("api evidence");
        assert!(dom < db && db < api);
        assert!(fragment.code.contains("expect(aiPredicate5(...evidence5)).toBe(true);"));
        assert!(fragment.code.contains("images/Step_5_1.png"));
    }

    #[test]
    fn test_ai_evidence_follows_dom_position_order() {
        let mut action = assert_action(AssertType::Ai);
        // assert_action seeds #status at position 0; this one records
        // earlier but sits later in the document.
        action.elements.insert(
            0,
            Element {
                selectors: vec![SelectorCandidate {
                    value: "locator('#footer')".to_string(),
                }],
                position: 1,
            },
        );
        let fragment = emit(&action, 2);
        let status = fragment
            .code
            .find(r##"const target3_1 = await resolveTarget(page, [{"kind":"css","value":"#status"}]);"##)
            .expect("first evidence target");
        let footer = fragment
            .code
            .find(r##"const target3_2 = await resolveTarget(page, [{"kind":"css","value":"#footer"}]);"##)
            .expect("second evidence target");
        assert!(status < footer);
    }

    #[test]
    fn test_predicate_function_only_for_ai() {
        let ai_action = assert_action(AssertType::Ai);
        let f = predicate_function(&ai_action, 4).expect("predicate");
        assert!(f.starts_with("function aiPredicate5(...evidence)"));
        assert!(predicate_function(&assert_action(AssertType::Visible), 4).is_none());
    }

    #[test]
    fn test_missing_assert_type_is_diagnosed() {
        let action = Action::new(ActionType::Assert);
        let fragment = emit(&action, 7);
        assert!(fragment.code.is_empty());
        assert_eq!(fragment.diagnostics[0].ordinal, 7);
    }
}
