//! Forced-action DOM interpreter.
//!
//! Fallback path for elements the standard automation surface cannot drive,
//! typically nodes behind shadow boundaries. Works on a [`DomNode`] snapshot:
//! candidate selectors are interpreted directly against the tree (no CSS
//! engine: simple selectors plus one descendant level only), the target is
//! located by a breadth-first walk that pushes both light children and
//! shadow-root children, and the interaction is synthesized as a sequence of
//! [`DomMutation`]s applied through the driver.
//!
//! Per-candidate failures are structured [`ForceFailure`] values; the
//! interpreter only errors once every candidate has been tried.

use std::collections::VecDeque;

use crate::page::{DomMutation, DomNode, PageDriver};
use crate::result::{GrabarError, GrabarResult};
use crate::selector::SelectorSpec;

/// Interactions the interpreter can synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceActionKind {
    /// pointerdown → mousedown → mouseup → click
    Click,
    /// The click sequence twice, then dblclick
    DoubleClick,
    /// Direct value assignment plus input/change events
    Input,
    /// Option selection by value, visible text, or first option
    SelectOption,
}

impl ForceActionKind {
    /// Tag for failure messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "double_click",
            Self::Input => "input",
            Self::SelectOption => "select_option",
        }
    }
}

/// Why one candidate attempt failed. Reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceFailure {
    /// No element in the tree matched the selector
    ElementNotFound,
    /// The matched element cannot receive this action kind
    UnsupportedAction {
        /// Tag of the matched element
        tag: String,
    },
    /// No option matched the requested value or text
    OptionNotFound {
        /// What was requested
        wanted: String,
    },
}

impl std::fmt::Display for ForceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElementNotFound => write!(f, "element not found"),
            Self::UnsupportedAction { tag } => write!(f, "action unsupported for <{tag}>"),
            Self::OptionNotFound { wanted } => write!(f, "option '{wanted}' not found"),
        }
    }
}

/// Try each candidate selector in order and synthesize the interaction on
/// the first one that works.
///
/// # Errors
///
/// [`GrabarError::ForceActionExhausted`] once every candidate has failed;
/// driver errors propagate as-is.
pub async fn force_action(
    page: &dyn PageDriver,
    candidates: &[SelectorSpec],
    kind: ForceActionKind,
    payload: Option<&str>,
) -> GrabarResult<()> {
    let doc = page.document().await?;
    let mut last_failure = ForceFailure::ElementNotFound;

    for spec in candidates {
        match plan_action(&doc, spec, kind, payload) {
            Ok(plan) => {
                for (node, mutation) in &plan {
                    page.apply(*node, mutation).await?;
                }
                return Ok(());
            }
            Err(failure) => {
                tracing::debug!(selector = %spec, %failure, "forced action candidate failed");
                last_failure = failure;
            }
        }
    }

    Err(GrabarError::ForceActionExhausted {
        action: kind.as_str().to_string(),
        attempts: candidates.len(),
        last_reason: last_failure.to_string(),
    })
}

/// Resolve one candidate to a mutation plan without touching the driver.
pub fn plan_action(
    doc: &DomNode,
    spec: &SelectorSpec,
    kind: ForceActionKind,
    payload: Option<&str>,
) -> Result<Vec<(u64, DomMutation)>, ForceFailure> {
    let target = find_all(doc, spec)
        .into_iter()
        .next()
        .ok_or(ForceFailure::ElementNotFound)?;

    match kind {
        ForceActionKind::Click => Ok(click_sequence(target.id)),
        ForceActionKind::DoubleClick => {
            let mut plan = click_sequence(target.id);
            plan.extend(click_sequence(target.id));
            plan.push((target.id, DomMutation::event("dblclick")));
            Ok(plan)
        }
        ForceActionKind::Input => {
            if !accepts_text_input(target) {
                return Err(ForceFailure::UnsupportedAction {
                    tag: target.tag.clone(),
                });
            }
            Ok(vec![
                (
                    target.id,
                    DomMutation::SetValue {
                        value: payload.unwrap_or_default().to_string(),
                    },
                ),
                (target.id, DomMutation::event("input")),
                (target.id, DomMutation::event("change")),
            ])
        }
        ForceActionKind::SelectOption => {
            if target.tag != "select" {
                return Err(ForceFailure::UnsupportedAction {
                    tag: target.tag.clone(),
                });
            }
            let chosen = choose_option(target, payload)?;
            Ok(vec![
                (target.id, DomMutation::SetValue { value: chosen }),
                (target.id, DomMutation::event("change")),
            ])
        }
    }
}

fn click_sequence(id: u64) -> Vec<(u64, DomMutation)> {
    ["pointerdown", "mousedown", "mouseup", "click"]
        .iter()
        .map(|e| (id, DomMutation::event(e)))
        .collect()
}

fn accepts_text_input(node: &DomNode) -> bool {
    node.tag == "input" || node.tag == "textarea" || node.attr("contenteditable").is_some()
}

/// Option choice order: by `value` attribute, then by visible text, then the
/// first option when no payload was recorded.
fn choose_option(select: &DomNode, payload: Option<&str>) -> Result<String, ForceFailure> {
    let options: Vec<&DomNode> = walk(select)
        .into_iter()
        .filter(|n| n.tag == "option")
        .collect();

    let value_of = |o: &DomNode| {
        o.attr("value")
            .map_or_else(|| o.visible_text(), ToString::to_string)
    };

    match payload {
        Some(wanted) => options
            .iter()
            .find(|o| o.attr("value") == Some(wanted))
            .or_else(|| options.iter().find(|o| o.visible_text() == wanted.trim()))
            .map(|o| value_of(o))
            .ok_or_else(|| ForceFailure::OptionNotFound {
                wanted: wanted.to_string(),
            }),
        None => options
            .first()
            .map(|o| value_of(o))
            .ok_or(ForceFailure::OptionNotFound {
                wanted: "(first)".to_string(),
            }),
    }
}

// ============================================================================
// Element search
// ============================================================================

/// All nodes matching a selector, in breadth-first document order across
/// light DOM and every shadow root.
#[must_use]
pub fn find_all<'a>(doc: &'a DomNode, spec: &SelectorSpec) -> Vec<&'a DomNode> {
    find_scoped(doc, doc, spec)
}

fn find_scoped<'a>(doc: &'a DomNode, scope: &'a DomNode, spec: &SelectorSpec) -> Vec<&'a DomNode> {
    match spec {
        SelectorSpec::Child { parent, child } => {
            let mut out = Vec::new();
            for p in find_scoped(doc, scope, parent) {
                for candidate in find_within(doc, p, child) {
                    if !out.iter().any(|n: &&DomNode| n.id == candidate.id) {
                        out.push(candidate);
                    }
                }
            }
            out
        }
        SelectorSpec::Css { value } => find_css(scope, value.trim()),
        SelectorSpec::Text { value } => find_text(scope, value),
        SelectorSpec::Label { value } => find_labelled(doc, scope, value),
        _ => walk(scope)
            .into_iter()
            .filter(|n| node_matches(doc, n, spec))
            .collect(),
    }
}

/// Search strictly inside a scope node (its light and shadow subtrees).
fn find_within<'a>(doc: &'a DomNode, scope: &'a DomNode, spec: &SelectorSpec) -> Vec<&'a DomNode> {
    let mut out = Vec::new();
    for child in scope.children.iter().chain(scope.shadow_children.iter()) {
        out.extend(find_scoped(doc, child, spec));
    }
    out
}

/// Breadth-first walk pushing light children and shadow-root children.
fn walk(scope: &DomNode) -> Vec<&DomNode> {
    let mut out = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(scope);
    while let Some(node) = queue.pop_front() {
        out.push(node);
        for child in node.children.iter().chain(node.shadow_children.iter()) {
            queue.push_back(child);
        }
    }
    out
}

/// Visible-text lookup: exact trimmed matches beat substring matches.
fn find_text<'a>(scope: &'a DomNode, wanted: &str) -> Vec<&'a DomNode> {
    let wanted = wanted.trim();
    let mut exact = Vec::new();
    let mut partial = Vec::new();
    for node in walk(scope) {
        let text = node.visible_text();
        if text == wanted {
            exact.push(node);
        } else if text.contains(wanted) {
            partial.push(node);
        }
    }
    if exact.is_empty() { partial } else { exact }
}

/// Label association: a matching `<label>` resolves to its control via the
/// `for` attribute or a nested form control.
fn find_labelled<'a>(doc: &'a DomNode, scope: &'a DomNode, wanted: &str) -> Vec<&'a DomNode> {
    let mut out: Vec<&DomNode> = Vec::new();
    let labels: Vec<&DomNode> = find_text(scope, wanted)
        .into_iter()
        .filter(|n| n.tag == "label")
        .collect();
    for label in labels {
        let control = label
            .attr("for")
            .and_then(|id| doc.find_by_element_id(id))
            .or_else(|| {
                walk(label)
                    .into_iter()
                    .find(|n| matches!(n.tag.as_str(), "input" | "select" | "textarea"))
            });
        if let Some(control) = control {
            if !out.iter().any(|n| n.id == control.id) {
                out.push(control);
            }
        }
    }
    out
}

/// Simple CSS: a compound selector with at most one descendant combinator.
fn find_css<'a>(scope: &'a DomNode, selector: &str) -> Vec<&'a DomNode> {
    let mut parts = selector.split_whitespace();
    let Some(first) = parts.next() else {
        return Vec::new();
    };
    let Some(head) = Compound::parse(first) else {
        return Vec::new();
    };
    let rest: Vec<&str> = parts.collect();

    let heads: Vec<&DomNode> = walk(scope)
        .into_iter()
        .filter(|n| head.matches(n))
        .collect();
    if rest.is_empty() {
        return heads;
    }

    let tail = rest.join(" ");
    let mut out: Vec<&DomNode> = Vec::new();
    for h in heads {
        for child in h.children.iter().chain(h.shadow_children.iter()) {
            for m in find_css(child, &tail) {
                if !out.iter().any(|n| n.id == m.id) {
                    out.push(m);
                }
            }
        }
    }
    out
}

fn node_matches(doc: &DomNode, node: &DomNode, spec: &SelectorSpec) -> bool {
    match spec {
        SelectorSpec::TestId { value } => node.attr("data-testid") == Some(value),
        SelectorSpec::Role { role, name } => {
            if role_of(node) != role.as_str() {
                return false;
            }
            name.as_ref().map_or(true, |wanted| {
                accessible_name(doc, node).trim().eq_ignore_ascii_case(wanted.trim())
            })
        }
        SelectorSpec::Placeholder { value } => node.attr("placeholder") == Some(value),
        SelectorSpec::AltText { value } => node.attr("alt") == Some(value),
        SelectorSpec::Title { value } => node.attr("title") == Some(value),
        // Css, Text, Label, Child are handled by the scoped finders
        _ => false,
    }
}

/// Explicit `role` attribute, else the implicit role of the tag.
#[must_use]
pub fn role_of(node: &DomNode) -> &str {
    if let Some(role) = node.attr("role") {
        return role;
    }
    match node.tag.as_str() {
        "button" => "button",
        "a" if node.attr("href").is_some() => "link",
        "input" => match node.attr("type") {
            Some("submit" | "button" | "reset") => "button",
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            _ => "textbox",
        },
        "textarea" => "textbox",
        "select" => "combobox",
        "img" => "img",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "nav" => "navigation",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "table" => "table",
        _ => "",
    }
}

/// Accessible-name computation, fixed precedence:
/// `aria-label` → `aria-labelledby` → `alt` → `title` → visible text.
#[must_use]
pub fn accessible_name(doc: &DomNode, node: &DomNode) -> String {
    if let Some(label) = node.attr("aria-label") {
        if !label.trim().is_empty() {
            return label.trim().to_string();
        }
    }
    if let Some(ids) = node.attr("aria-labelledby") {
        let resolved: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| doc.find_by_element_id(id))
            .map(DomNode::visible_text)
            .filter(|t| !t.is_empty())
            .collect();
        if !resolved.is_empty() {
            return resolved.join(" ");
        }
    }
    if let Some(alt) = node.attr("alt") {
        if !alt.trim().is_empty() {
            return alt.trim().to_string();
        }
    }
    if let Some(title) = node.attr("title") {
        if !title.trim().is_empty() {
            return title.trim().to_string();
        }
    }
    node.visible_text()
}

/// Simple compound selector: `tag#id.class[attr='v']`.
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(s: &str) -> Option<Self> {
        let mut compound = Self {
            tag: None,
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
        };
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;

        let read_name = |chars: &[char], mut i: usize| -> (String, usize) {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '-' || chars[i] == '_')
            {
                i += 1;
            }
            (chars[start..i].iter().collect(), i)
        };

        if i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '*') {
            if chars[i] == '*' {
                i += 1;
            } else {
                let (name, next) = read_name(&chars, i);
                compound.tag = Some(name.to_lowercase());
                i = next;
            }
        }

        while i < chars.len() {
            match chars[i] {
                '#' => {
                    let (name, next) = read_name(&chars, i + 1);
                    if name.is_empty() {
                        return None;
                    }
                    compound.id = Some(name);
                    i = next;
                }
                '.' => {
                    let (name, next) = read_name(&chars, i + 1);
                    if name.is_empty() {
                        return None;
                    }
                    compound.classes.push(name);
                    i = next;
                }
                '[' => {
                    let close = chars[i..].iter().position(|&c| c == ']')? + i;
                    let body: String = chars[i + 1..close].iter().collect();
                    let (name, value) = match body.split_once('=') {
                        Some((n, v)) => {
                            let v = v.trim_matches(|c| c == '\'' || c == '"');
                            (n.trim().to_string(), Some(v.to_string()))
                        }
                        None => (body.trim().to_string(), None),
                    };
                    if name.is_empty() {
                        return None;
                    }
                    compound.attrs.push((name, value));
                    i = close + 1;
                }
                _ => return None,
            }
        }

        Some(compound)
    }

    fn matches(&self, node: &DomNode) -> bool {
        if let Some(ref tag) = self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if node.attr("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match value {
            Some(v) => node.attr(name) == Some(v),
            None => node.attr(name).is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DomNode {
        DomNode::new("body")
            .with_id(1)
            .with_child(
                DomNode::new("form")
                    .with_id(2)
                    .with_attr("id", "checkout")
                    .with_child(
                        DomNode::new("button")
                            .with_id(3)
                            .with_attr("data-testid", "save")
                            .with_text("Save"),
                    )
                    .with_child(DomNode::new("button").with_id(4).with_text("Save as draft"))
                    .with_child(
                        DomNode::new("label")
                            .with_id(5)
                            .with_attr("for", "email")
                            .with_text("Email"),
                    )
                    .with_child(
                        DomNode::new("input")
                            .with_id(6)
                            .with_attr("id", "email")
                            .with_attr("type", "text"),
                    ),
            )
            .with_child(
                DomNode::new("fancy-menu").with_id(7).with_shadow_child(
                    DomNode::new("select")
                        .with_id(8)
                        .with_attr("class", "picker")
                        .with_child(
                            DomNode::new("option")
                                .with_id(9)
                                .with_attr("value", "a")
                                .with_text("Alpha"),
                        )
                        .with_child(
                            DomNode::new("option")
                                .with_id(10)
                                .with_attr("value", "b")
                                .with_text("Beta"),
                        ),
                ),
            )
    }

    mod search_tests {
        use super::*;

        #[test]
        fn test_exact_text_beats_substring() {
            let doc = doc();
            let spec = SelectorSpec::Text {
                value: "Save".to_string(),
            };
            let found = find_all(&doc, &spec);
            assert_eq!(found[0].id, 3, "exact 'Save' must win over 'Save as draft'");
        }

        #[test]
        fn test_substring_used_when_no_exact() {
            let doc = doc();
            let spec = SelectorSpec::Text {
                value: "as draft".to_string(),
            };
            let found = find_all(&doc, &spec);
            assert!(found.iter().any(|n| n.id == 4));
        }

        #[test]
        fn test_css_pierces_nothing_but_walk_reaches_shadow() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "select.picker".to_string(),
            };
            let found = find_all(&doc, &spec);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, 8, "walk must cross the shadow boundary");
        }

        #[test]
        fn test_css_descendant_combinator() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "form button".to_string(),
            };
            let found = find_all(&doc, &spec);
            assert_eq!(found.len(), 2);
        }

        #[test]
        fn test_test_id_lookup() {
            let doc = doc();
            let spec = SelectorSpec::TestId {
                value: "save".to_string(),
            };
            assert_eq!(find_all(&doc, &spec)[0].id, 3);
        }

        #[test]
        fn test_role_with_name() {
            let doc = doc();
            let spec = SelectorSpec::Role {
                role: "button".to_string(),
                name: Some("Save".to_string()),
            };
            let found = find_all(&doc, &spec);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, 3);
        }

        #[test]
        fn test_label_resolves_control_via_for() {
            let doc = doc();
            let spec = SelectorSpec::Label {
                value: "Email".to_string(),
            };
            let found = find_all(&doc, &spec);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, 6);
        }

        #[test]
        fn test_child_composition_scopes_search() {
            let doc = doc();
            let spec = SelectorSpec::parse("locator('#checkout').getByText('Save')")
                .expect("chain parses");
            let found = find_all(&doc, &spec);
            assert_eq!(found[0].id, 3);
        }
    }

    mod accessible_name_tests {
        use super::*;

        #[test]
        fn test_aria_label_first() {
            let doc = DomNode::new("body");
            let node = DomNode::new("button")
                .with_attr("aria-label", "Close dialog")
                .with_attr("title", "ignored")
                .with_text("x");
            assert_eq!(accessible_name(&doc, &node), "Close dialog");
        }

        #[test]
        fn test_labelledby_resolves_and_concatenates() {
            let doc = DomNode::new("body")
                .with_child(DomNode::new("span").with_attr("id", "a").with_text("First"))
                .with_child(DomNode::new("span").with_attr("id", "b").with_text("Last"));
            let node = DomNode::new("input").with_attr("aria-labelledby", "a b");
            assert_eq!(accessible_name(&doc, &node), "First Last");
        }

        #[test]
        fn test_falls_through_alt_title_text() {
            let doc = DomNode::new("body");
            let img = DomNode::new("img").with_attr("alt", "Logo");
            assert_eq!(accessible_name(&doc, &img), "Logo");

            let titled = DomNode::new("div").with_attr("title", "Help");
            assert_eq!(accessible_name(&doc, &titled), "Help");

            let plain = DomNode::new("span").with_text("  fallback  ");
            assert_eq!(accessible_name(&doc, &plain), "fallback");
        }
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_click_sequence_order() {
            let doc = doc();
            let spec = SelectorSpec::TestId {
                value: "save".to_string(),
            };
            let plan = plan_action(&doc, &spec, ForceActionKind::Click, None).expect("plan");
            let events: Vec<&str> = plan
                .iter()
                .filter_map(|(_, m)| match m {
                    DomMutation::DispatchEvent { event } => Some(event.as_str()),
                    DomMutation::SetValue { .. } => None,
                })
                .collect();
            assert_eq!(events, vec!["pointerdown", "mousedown", "mouseup", "click"]);
        }

        #[test]
        fn test_double_click_ends_with_dblclick() {
            let doc = doc();
            let spec = SelectorSpec::TestId {
                value: "save".to_string(),
            };
            let plan =
                plan_action(&doc, &spec, ForceActionKind::DoubleClick, None).expect("plan");
            assert_eq!(plan.len(), 9);
            assert_eq!(plan[8].1, DomMutation::event("dblclick"));
        }

        #[test]
        fn test_input_plan_sets_value_then_fires_events() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "#email".to_string(),
            };
            let plan =
                plan_action(&doc, &spec, ForceActionKind::Input, Some("hello")).expect("plan");
            assert_eq!(
                plan[0].1,
                DomMutation::SetValue {
                    value: "hello".to_string()
                }
            );
            assert_eq!(plan[1].1, DomMutation::event("input"));
            assert_eq!(plan[2].1, DomMutation::event("change"));
        }

        #[test]
        fn test_input_on_button_is_unsupported() {
            let doc = doc();
            let spec = SelectorSpec::TestId {
                value: "save".to_string(),
            };
            let err = plan_action(&doc, &spec, ForceActionKind::Input, Some("x")).unwrap_err();
            assert_eq!(
                err,
                ForceFailure::UnsupportedAction {
                    tag: "button".to_string()
                }
            );
        }

        #[test]
        fn test_select_by_value_then_text_then_first() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "select.picker".to_string(),
            };

            let by_value =
                plan_action(&doc, &spec, ForceActionKind::SelectOption, Some("b")).expect("value");
            assert_eq!(
                by_value[0].1,
                DomMutation::SetValue {
                    value: "b".to_string()
                }
            );

            let by_text = plan_action(&doc, &spec, ForceActionKind::SelectOption, Some("Alpha"))
                .expect("text");
            assert_eq!(
                by_text[0].1,
                DomMutation::SetValue {
                    value: "a".to_string()
                }
            );

            let first =
                plan_action(&doc, &spec, ForceActionKind::SelectOption, None).expect("first");
            assert_eq!(
                first[0].1,
                DomMutation::SetValue {
                    value: "a".to_string()
                }
            );
        }

        #[test]
        fn test_select_missing_option_reports_reason() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "select.picker".to_string(),
            };
            let err =
                plan_action(&doc, &spec, ForceActionKind::SelectOption, Some("zz")).unwrap_err();
            assert_eq!(
                err,
                ForceFailure::OptionNotFound {
                    wanted: "zz".to_string()
                }
            );
        }

        #[test]
        fn test_missing_element_reports_not_found() {
            let doc = doc();
            let spec = SelectorSpec::Css {
                value: "#nope".to_string(),
            };
            let err = plan_action(&doc, &spec, ForceActionKind::Click, None).unwrap_err();
            assert_eq!(err, ForceFailure::ElementNotFound);
        }
    }
}
