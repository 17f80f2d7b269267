//! Action emitters, one per recorded action kind.
//!
//! Contract: `emit(action, ordinal, next, ctx) -> Fragment`. Emitters never
//! fail: a kind the compiler cannot translate yields an empty fragment plus
//! a [`Diagnostic`], and malformed payloads degrade to safe literal defaults
//! so one bad step cannot sink the batch.
//!
//! The single cross-step dependency lives here: a click whose successor is a
//! `page_create` carrying an `opener_index` arms a popup promise before the
//! click fires, and the page-create step resolves that promise into its page
//! variable.

use std::collections::HashMap;

use grabar::model::{Action, ActionType};
use serde_json::Value;

use crate::asserts;
use crate::error::Diagnostic;
use crate::literal::{js_str, parse_packed_pair};
use crate::selector_literal::candidates_literal;
use crate::sideeffect;
use crate::step::Step;

/// Maps recorded `file_id`s to local paths for upload steps.
#[derive(Debug, Clone, Default)]
pub struct FileMapping {
    paths: HashMap<String, String>,
}

impl FileMapping {
    /// Empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local path for a recorded file id.
    pub fn insert(&mut self, file_id: impl Into<String>, path: impl Into<String>) {
        self.paths.insert(file_id.into(), path.into());
    }

    /// Local path for a file id, if registered.
    #[must_use]
    pub fn path_for(&self, file_id: &str) -> Option<&str> {
        self.paths.get(file_id).map(String::as_str)
    }
}

/// Shared emitter inputs beyond the action itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitContext<'a> {
    /// Upload path mapping, when the caller has one
    pub files: Option<&'a FileMapping>,
}

/// One emitted step: source text plus anything the compiler had to report.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    /// Generated source, empty for untranslatable steps
    pub code: String,
    /// Per-step notices
    pub diagnostics: Vec<Diagnostic>,
}

impl Fragment {
    fn empty(diagnostic: Diagnostic) -> Self {
        Self {
            code: String::new(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// Variable name for a page index. The root page is `page`; created pages
/// are numbered from 2 to match how a reader counts tabs.
#[must_use]
pub fn page_var(index: u32) -> String {
    if index == 0 {
        "page".to_string()
    } else {
        format!("page{}", index + 1)
    }
}

/// Popup-promise variable for a created page index.
#[must_use]
pub fn promise_var(index: u32) -> String {
    format!("{}Promise", page_var(index))
}

/// Emit one action as a complete step fragment.
#[must_use]
pub fn emit(action: &Action, ordinal: usize, next: Option<&Action>, ctx: &EmitContext) -> Fragment {
    match action.action_type {
        ActionType::Navigate => navigate(action, ordinal),
        ActionType::Click
        | ActionType::DoubleClick
        | ActionType::RightClick
        | ActionType::ShiftClick => click(action, ordinal, next),
        ActionType::Input => fill(action, ordinal),
        ActionType::Select => select(action, ordinal),
        ActionType::Checkbox => checkbox(action, ordinal),
        ActionType::Change => change(action, ordinal),
        ActionType::DragAndDrop => drag_and_drop(action, ordinal),
        ActionType::Keyboard => keyboard(action, ordinal),
        ActionType::Upload => upload(action, ordinal, ctx),
        ActionType::Scroll => scroll(action, ordinal),
        ActionType::WindowResize => window_resize(action, ordinal),
        ActionType::Wait => wait(action, ordinal),
        ActionType::Reload => history(action, ordinal, "reload"),
        ActionType::Back => history(action, ordinal, "goBack"),
        ActionType::Forward => history(action, ordinal, "goForward"),
        ActionType::DatabaseExecution => database_execution(action, ordinal),
        ActionType::AddBrowserStorage => add_browser_storage(action, ordinal),
        ActionType::ApiRequest => api_request(action, ordinal),
        ActionType::PageCreate => page_create(action, ordinal),
        ActionType::PageClose => page_close(action, ordinal),
        ActionType::PageFocus => page_focus(action, ordinal),
        ActionType::Assert => asserts::emit(action, ordinal),
        ActionType::Unknown => Fragment::empty(Diagnostic::new(
            ordinal,
            "unrecognized action kind; step omitted",
        )),
    }
}

// ============================================================================
// Target resolution
// ============================================================================

/// Resolver call for one element plus the candidate array it passes, so
/// callers can replay the same candidates through the fallback path.
struct ResolvedTarget {
    line: String,
    candidates: String,
}

/// Binds `<var>` to the element at `element_index`, counting elements in
/// DOM position order rather than recording order. `None` (plus a
/// diagnostic) when the action has no element at that position.
fn resolve_line(
    action: &Action,
    ordinal: usize,
    element_index: usize,
    var: &str,
    page: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ResolvedTarget> {
    let ordered = action.elements_in_dom_order();
    let Some(element) = ordered.get(element_index).copied() else {
        diagnostics.push(Diagnostic::new(
            ordinal,
            format!(
                "{} step needs an element at position {element_index}",
                action.action_type.as_str()
            ),
        ));
        return None;
    };
    let candidates = candidates_literal(element);
    for dropped in candidates.dropped {
        diagnostics.push(Diagnostic::new(ordinal, dropped));
    }
    let line = format!(
        "const {var} = await resolveTarget({page}, {});",
        candidates.expression
    );
    Some(ResolvedTarget {
        line,
        candidates: candidates.expression,
    })
}

/// Retries `call` through the synthetic-event fallback when the locator
/// refuses it, replaying the same candidate set.
fn with_force_fallback(
    step: Step,
    call: &str,
    page: &str,
    candidates: &str,
    kind: &str,
    payload: Option<&str>,
) -> Step {
    let args = match payload {
        Some(payload) => format!("{page}, {candidates}, '{kind}', {payload}"),
        None => format!("{page}, {candidates}, '{kind}'"),
    };
    step.line("try {")
        .line(format!("  {call}"))
        .line("} catch {")
        .line(format!("  await forceAction({args});"))
        .line("}")
}

fn step(action: &Action, ordinal: usize) -> Step {
    Step::new(ordinal, action.description.as_deref(), action.action_type.as_str())
        .on_page(&page_var(action.page_index()))
}

// ============================================================================
// Emitters
// ============================================================================

fn navigate(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let url = action.first_value_str().unwrap_or_default();
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.goto({});", js_str(&url)))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn click(action: &Action, ordinal: usize, next: Option<&Action>) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };

    let mut s = step(action, ordinal).line(resolve.line);

    // A popup opened by this click must have its wait armed before the
    // click fires, or the event is lost.
    if let Some(created) = next.filter(|n| {
        n.action_type == ActionType::PageCreate && n.opener_index().is_some()
    }) {
        s = s.line(format!(
            "{} = {page}.waitForEvent('popup');",
            promise_var(created.page_index())
        ));
    }

    // Modifier clicks have no synthetic-event equivalent and stay plain.
    let s = match action.action_type {
        ActionType::DoubleClick => with_force_fallback(
            s,
            "await target.dblclick();",
            &page,
            &resolve.candidates,
            "double_click",
            None,
        ),
        ActionType::RightClick => s.line("await target.click({ button: 'right' });"),
        ActionType::ShiftClick => s.line("await target.click({ modifiers: ['Shift'] });"),
        _ => with_force_fallback(
            s,
            "await target.click();",
            &page,
            &resolve.candidates,
            "click",
            None,
        ),
    };
    Fragment {
        code: s.render(),
        diagnostics,
    }
}

fn fill(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    let value = js_str(&action.first_value_str().unwrap_or_default());
    Fragment {
        code: with_force_fallback(
            step(action, ordinal).line(resolve.line),
            &format!("await target.fill({value});"),
            &page,
            &resolve.candidates,
            "input",
            Some(&value),
        )
        .render(),
        diagnostics,
    }
}

fn select(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    let value = js_str(
        &action
            .value_field("selected_value_id")
            .and_then(value_as_string)
            .or_else(|| action.first_value_str())
            .unwrap_or_default(),
    );
    Fragment {
        code: with_force_fallback(
            step(action, ordinal).line(resolve.line),
            &format!("await target.selectOption({value});"),
            &page,
            &resolve.candidates,
            "select_option",
            Some(&value),
        )
        .render(),
        diagnostics,
    }
}

fn checkbox(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    let checked = action.first_value_bool().unwrap_or(true);
    Fragment {
        code: step(action, ordinal)
            .line(resolve.line)
            .line(format!("await target.setChecked({checked});"))
            .render(),
        diagnostics,
    }
}

fn change(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    Fragment {
        code: step(action, ordinal)
            .line(resolve.line)
            .line("await target.dispatchEvent('change');")
            .render(),
        diagnostics,
    }
}

fn drag_and_drop(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let source = resolve_line(action, ordinal, 0, "source", &page, &mut diagnostics);
    let dest = resolve_line(action, ordinal, 1, "dest", &page, &mut diagnostics);
    let (Some(source), Some(dest)) = (source, dest) else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    Fragment {
        code: step(action, ordinal)
            .line(source.line)
            .line(dest.line)
            .line("await source.dragTo(dest);")
            .render(),
        diagnostics,
    }
}

fn keyboard(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let key = action.first_value_str().unwrap_or_default();
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.keyboard.press({});", js_str(&key)))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn upload(action: &Action, ordinal: usize, ctx: &EmitContext) -> Fragment {
    let page = page_var(action.page_index());
    let mut diagnostics = Vec::new();
    let Some(resolve) = resolve_line(action, ordinal, 0, "target", &page, &mut diagnostics)
    else {
        return Fragment {
            code: String::new(),
            diagnostics,
        };
    };
    let path = action.file_upload().map_or_else(String::new, |f| {
        ctx.files
            .and_then(|m| m.path_for(&f.file_id))
            .map_or_else(|| f.file_name.clone(), ToString::to_string)
    });
    Fragment {
        code: step(action, ordinal)
            .line(resolve.line)
            .line(format!("await target.setInputFiles({});", js_str(&path)))
            .render(),
        diagnostics,
    }
}

fn scroll(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let packed = action.first_value_str().unwrap_or_default();
    let (x, y) = parse_packed_pair(&packed, "X", "Y");
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.evaluate(() => window.scrollTo({x}, {y}));"))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn window_resize(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let explicit = (
        action.value_field("width").and_then(Value::as_u64),
        action.value_field("height").and_then(Value::as_u64),
    );
    let (width, height) = match explicit {
        (Some(w), Some(h)) => (w as i64, h as i64),
        _ => {
            let packed = action.first_value_str().unwrap_or_default();
            parse_packed_pair(&packed, "Width", "Height")
        }
    };
    Fragment {
        code: step(action, ordinal)
            .line(format!(
                "await {page}.setViewportSize({{ width: {width}, height: {height} }});"
            ))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn wait(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let ms = action
        .first_value_u64()
        .or_else(|| action.first_value_str()?.trim().parse().ok())
        .unwrap_or(0);
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.waitForTimeout({ms});"))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn history(action: &Action, ordinal: usize, method: &str) -> Fragment {
    let page = page_var(action.page_index());
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.{method}();"))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn database_execution(action: &Action, ordinal: usize) -> Fragment {
    let Some(statement) = action.statement() else {
        return Fragment::empty(Diagnostic::new(
            ordinal,
            "database_execution step carries no statement payload",
        ));
    };
    Fragment {
        code: step(action, ordinal)
            .lines(sideeffect::db_lines(statement, ordinal + 1))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn add_browser_storage(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let Some(storage) = action.browser_storage() else {
        return Fragment::empty(Diagnostic::new(
            ordinal,
            "add_browser_storage step carries no storage payload",
        ));
    };
    let lines = sideeffect::storage_lines(storage, &page);
    if lines.is_empty() {
        return Fragment::empty(Diagnostic::new(
            ordinal,
            "storage payload has no usable entries",
        ));
    }
    Fragment {
        code: step(action, ordinal).lines(lines).render(),
        diagnostics: Vec::new(),
    }
}

fn api_request(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    let Some(request) = action.api_request() else {
        return Fragment::empty(Diagnostic::new(
            ordinal,
            "api_request step carries no request payload",
        ));
    };
    Fragment {
        code: step(action, ordinal)
            .lines(sideeffect::api_lines(request, ordinal + 1, &page))
            .render(),
        diagnostics: Vec::new(),
    }
}

/// Three-way branch: popup resume, direct-URL page, blank page.
fn page_create(action: &Action, ordinal: usize) -> Fragment {
    let index = action.page_index();
    if index == 0 {
        return Fragment::empty(Diagnostic::new(
            ordinal,
            "page_create targets the root page index",
        ));
    }
    let var = page_var(index);
    let s = step(action, ordinal);
    let s = if action.opener_index().is_some() {
        s.line(format!("{var} = await {};", promise_var(index)))
            .line(format!("await {var}.waitForLoadState();"))
    } else if let Some(url) = action.first_value_str().filter(|u| !u.trim().is_empty()) {
        s.line(format!("{var} = await context.newPage();"))
            .line(format!("await {var}.goto({});", js_str(&url)))
    } else {
        s.line(format!("{var} = await context.newPage();"))
    };
    Fragment {
        code: s.render(),
        diagnostics: Vec::new(),
    }
}

fn page_close(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.close();"))
            .without_idle_wait()
            .render(),
        diagnostics: Vec::new(),
    }
}

fn page_focus(action: &Action, ordinal: usize) -> Fragment {
    let page = page_var(action.page_index());
    Fragment {
        code: step(action, ordinal)
            .line(format!("await {page}.bringToFront();"))
            .render(),
        diagnostics: Vec::new(),
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
