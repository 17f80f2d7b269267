//! Recorded-action data model.
//!
//! One [`Action`] per recorded browser interaction or check. The editor layer
//! owns the lifecycle of these records; the compiler and runtime treat a
//! submitted `Vec<Action>` as an immutable snapshot.
//!
//! The payload shape inside [`ActionData`] is fully determined by the
//! [`ActionType`] (and for asserts, the [`AssertType`]). There is no single
//! canonical shape across kinds; emitters pick the fields they understand.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One recorded step: an interaction or a check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    /// Kind tag for this step
    pub action_type: ActionType,
    /// Assertion kind, present only when `action_type` is `Assert`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assert_type: Option<AssertType>,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Logical UI targets, each with ordered fallback selector candidates
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Typed payload entries
    #[serde(default)]
    pub data: Vec<ActionData>,
}

impl Action {
    /// Create an action of a kind with no payload.
    #[must_use]
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            ..Self::default()
        }
    }

    /// The first payload entry carrying a non-null `value`.
    ///
    /// This is the value-merge policy for kinds that need a single value
    /// (navigate URL, input text, key to press, wait duration, packed
    /// scroll/resize strings). First match wins; later entries are ignored.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.data
            .iter()
            .filter_map(|d| d.value.as_ref())
            .find(|v| !v.is_null())
    }

    /// The first scalar value rendered as a plain string.
    ///
    /// Object and array payloads (page routing, field designators) are
    /// skipped, so a step that carries both a routing payload and a
    /// scalar still yields the scalar.
    #[must_use]
    pub fn first_value_str(&self) -> Option<String> {
        self.data
            .iter()
            .filter_map(|d| d.value.as_ref())
            .find_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
    }

    /// The first boolean payload value, skipping non-boolean entries.
    #[must_use]
    pub fn first_value_bool(&self) -> Option<bool> {
        self.data
            .iter()
            .filter_map(|d| d.value.as_ref())
            .find_map(Value::as_bool)
    }

    /// The first unsigned-integer payload value, skipping other entries.
    #[must_use]
    pub fn first_value_u64(&self) -> Option<u64> {
        self.data
            .iter()
            .filter_map(|d| d.value.as_ref())
            .find_map(Value::as_u64)
    }

    /// Look up a named field inside the first object-shaped value payload.
    #[must_use]
    pub fn value_field(&self, name: &str) -> Option<&Value> {
        self.data
            .iter()
            .filter_map(|d| d.value.as_ref())
            .filter_map(Value::as_object)
            .find_map(|o| o.get(name))
    }

    /// Page this step operates on. Defaults to the root page (index 0).
    #[must_use]
    pub fn page_index(&self) -> u32 {
        self.value_field("page_index")
            .and_then(Value::as_u64)
            .map_or(0, |v| v as u32)
    }

    /// Opener page index carried by a `page_create` reacting to a click.
    #[must_use]
    pub fn opener_index(&self) -> Option<u32> {
        self.value_field("opener_index")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    }

    /// First DB statement payload, if any.
    #[must_use]
    pub fn statement(&self) -> Option<&Statement> {
        self.data.iter().find_map(|d| d.statement.as_ref())
    }

    /// First API request payload, if any.
    #[must_use]
    pub fn api_request(&self) -> Option<&ApiRequest> {
        self.data.iter().find_map(|d| d.api_request.as_ref())
    }

    /// First browser-storage payload, if any.
    #[must_use]
    pub fn browser_storage(&self) -> Option<&BrowserStorage> {
        self.data.iter().find_map(|d| d.browser_storage.as_ref())
    }

    /// First file-upload payload, if any.
    #[must_use]
    pub fn file_upload(&self) -> Option<&FileUpload> {
        self.data.iter().find_map(|d| d.file_upload.as_ref())
    }

    /// Elements sorted back into DOM order by their recorded position.
    ///
    /// Positions exist because elements can be edited out-of-band; array
    /// order alone is not trustworthy after such edits.
    #[must_use]
    pub fn elements_in_dom_order(&self) -> Vec<&Element> {
        let mut refs: Vec<&Element> = self.elements.iter().collect();
        refs.sort_by_key(|e| e.position);
        refs
    }
}

/// Closed set of recordable step kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Navigate the page to a URL
    #[default]
    Navigate,
    /// Single left click
    Click,
    /// Double click
    DoubleClick,
    /// Right click
    RightClick,
    /// Click with shift held
    ShiftClick,
    /// Fill a text control
    Input,
    /// Choose an option in a select control
    Select,
    /// Toggle a checkbox
    Checkbox,
    /// Generic change event on a control
    Change,
    /// Drag one element onto another
    DragAndDrop,
    /// Press a key
    Keyboard,
    /// Upload a file
    Upload,
    /// Scroll the page
    Scroll,
    /// Run a SQL statement against a configured connection
    DatabaseExecution,
    /// Pause for a fixed duration
    Wait,
    /// Reload the current page
    Reload,
    /// History back
    Back,
    /// History forward
    Forward,
    /// Resize the window viewport
    WindowResize,
    /// Inject cookies / local storage / session storage
    AddBrowserStorage,
    /// Execute an outbound API request
    ApiRequest,
    /// Open a new page (popup, blank, or direct URL)
    PageCreate,
    /// Close a page
    PageClose,
    /// Bring a page to front
    PageFocus,
    /// Assertion step; see [`AssertType`]
    Assert,
    /// Unrecognized tag preserved for diagnostics
    #[serde(other)]
    Unknown,
}

impl ActionType {
    /// Wire tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::DoubleClick => "double_click",
            Self::RightClick => "right_click",
            Self::ShiftClick => "shift_click",
            Self::Input => "input",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Change => "change",
            Self::DragAndDrop => "drag_and_drop",
            Self::Keyboard => "keyboard",
            Self::Upload => "upload",
            Self::Scroll => "scroll",
            Self::DatabaseExecution => "database_execution",
            Self::Wait => "wait",
            Self::Reload => "reload",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::WindowResize => "window_resize",
            Self::AddBrowserStorage => "add_browser_storage",
            Self::ApiRequest => "api_request",
            Self::PageCreate => "page_create",
            Self::PageClose => "page_close",
            Self::PageFocus => "page_focus",
            Self::Assert => "assert",
            Self::Unknown => "unknown",
        }
    }
}

/// Closed set of assertion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertType {
    /// Element text equals the expected value
    TextEquals,
    /// Element text contains the expected value
    TextContains,
    /// Form control value equals the expected value
    ValueEquals,
    /// Named attribute equals the expected value
    AttributeEquals,
    /// Page URL equals the expected value
    UrlEquals,
    /// Page title equals the expected value
    TitleEquals,
    /// Element is visible
    Visible,
    /// Element is hidden
    Hidden,
    /// Element is enabled
    Enabled,
    /// Element is disabled
    Disabled,
    /// Checkbox/radio is checked
    Checked,
    /// Checkbox/radio is unchecked
    Unchecked,
    /// Element has focus
    Focused,
    /// Element is empty
    Empty,
    /// Element is not empty
    NotEmpty,
    /// Element is editable
    Editable,
    /// Element is read-only
    ReadOnly,
    /// Number of matching elements equals the expected value
    ElementCount,
    /// Generated predicate over harvested DOM/DB/API evidence
    Ai,
}

impl AssertType {
    /// Structural assertions need no expected value.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Visible
                | Self::Hidden
                | Self::Enabled
                | Self::Disabled
                | Self::Checked
                | Self::Unchecked
                | Self::Focused
                | Self::Empty
                | Self::NotEmpty
                | Self::Editable
                | Self::ReadOnly
        )
    }
}

/// One logical UI target with ordered fallback selector candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    /// Candidate locator expressions, first preferred
    #[serde(default)]
    pub selectors: Vec<SelectorCandidate>,
    /// Positional index used to rebuild DOM order after edits
    #[serde(default)]
    pub position: u32,
}

/// One opaque locator expression as recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorCandidate {
    /// Playwright-style call expression, e.g. `locator('#submit')`
    pub value: String,
}

/// Typed payload entry. Presence of a field tags the variant; multiple fields
/// on one entry are tolerated, the emitters read only what they recognize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionData {
    /// Generic value payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// DB query + connection descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<Statement>,
    /// Serializable HTTP-call descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_request: Option<ApiRequest>,
    /// Cookie / storage injection descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_storage: Option<BrowserStorage>,
    /// File reference for upload actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_upload: Option<FileUpload>,
}

/// SQL text plus the connection that should run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text
    pub query: String,
    /// Connection parameters; older recordings spell the field
    /// `database_connection`
    #[serde(alias = "database_connection")]
    pub connection: Connection,
}

/// Database connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Database name
    pub database: String,
    /// User name
    pub username: String,
    /// Password
    pub password: String,
    /// Engine kind
    pub engine: DbEngine,
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbEngine {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
    /// Microsoft SQL Server
    Mssql,
}

impl DbEngine {
    /// Wire tag for this engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
        }
    }
}

/// Serializable outbound HTTP-call descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Request URL without query string
    pub url: String,
    /// HTTP method, free-form (normalized to uppercase at execution)
    #[serde(default = "default_method")]
    pub method: String,
    /// Query parameters in order
    #[serde(default)]
    pub params: Vec<KeyValue>,
    /// Request headers in order
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    /// Authorization descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ApiAuth>,
    /// JSON request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// An ordered key/value pair for params and headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyValue {
    /// Pair key
    pub key: String,
    /// Pair value
    pub value: String,
}

/// Authorization descriptor for an API call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiAuth {
    /// Scheme kind
    pub kind: AuthKind,
    /// Inline bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Inline basic-auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Inline basic-auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Where to look when no inline credentials are present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageRef>,
}

/// Authorization scheme kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// `Authorization: Basic <base64 user:pass>`
    #[default]
    Basic,
    /// `Authorization: Bearer <token>`
    Bearer,
}

/// Pointer at stored credentials inside the page's storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageRef {
    /// Which storage to read
    #[serde(default)]
    pub location: StorageLocation,
    /// Key holding a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Key holding a basic-auth user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_key: Option<String>,
    /// Key holding a basic-auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_key: Option<String>,
}

/// Page storage locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// `window.localStorage`
    #[default]
    LocalStorage,
    /// `window.sessionStorage`
    SessionStorage,
    /// A named cookie
    Cookie,
}

/// Cookie / storage injection descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserStorage {
    /// Which storage receives the entries
    pub kind: StorageKind,
    /// Entries to inject
    #[serde(default)]
    pub entries: Vec<StorageEntry>,
}

/// Storage kinds an injection can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Browser cookie jar
    Cookie,
    /// `window.localStorage`
    LocalStorage,
    /// `window.sessionStorage`
    SessionStorage,
}

/// One storage entry. Cookie fields beyond name/value are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Entry name / cookie name
    pub name: String,
    /// Entry value
    pub value: String,
    /// Cookie URL scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cookie domain scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Cookie path scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Cookie `SameSite` policy as recorded (any casing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Cookie expiry as a unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

/// File reference for an upload step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileUpload {
    /// Stable file identifier assigned at record time
    pub file_id: String,
    /// Original file name
    pub file_name: String,
}

/// Optional test-level basic authentication for the whole generated script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthentication {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}
