//! Side-effect emitters: database bootstrap, evidence-export call sites,
//! storage injection, and API payload serialization.
//!
//! These produce body lines for a [`crate::step::Step`]; the variable names
//! they introduce (`rows<n>`, `response<n>`, `expected<n>`) are suffixed
//! with the 1-based step number so assertion emitters in the same step can
//! refer back to them.

use grabar::model::{ApiRequest, BrowserStorage, Connection, DbEngine, Statement, StorageKind};
use serde_json::json;

use crate::literal::{js_str, json_literal, normalize_same_site};

/// Connect, run the statement, bind `rows<n>`, and export the row set as
/// `databases/Step_<n>.xlsx`.
#[must_use]
pub fn db_lines(statement: &Statement, step_number: usize) -> Vec<String> {
    let n = step_number;
    let conn = connection_literal(&statement.connection);
    let query = js_str(&statement.query);
    let mut lines = match statement.connection.engine {
        DbEngine::Postgres => vec![
            format!("const client{n} = new Client({conn});"),
            format!("await client{n}.connect();"),
            format!("const result{n} = await client{n}.query({query});"),
            format!("await client{n}.end();"),
            format!("const rows{n} = result{n}.rows;"),
        ],
        DbEngine::Mysql => vec![
            format!("const conn{n} = await mysql.createConnection({conn});"),
            format!("const [rows{n}] = await conn{n}.execute({query});"),
            format!("await conn{n}.end();"),
        ],
        DbEngine::Mssql => vec![
            format!("const pool{n} = await mssql.connect({conn});"),
            format!("const result{n} = await pool{n}.request().query({query});"),
            format!("await pool{n}.close();"),
            format!("const rows{n} = result{n}.recordset;"),
        ],
    };
    lines.push(format!("await exportDbEvidence({n}, rows{n});"));
    lines
}

/// Bind the first field of the first row as `expected<n>`.
#[must_use]
pub fn db_expected_line(step_number: usize) -> String {
    let n = step_number;
    format!("const expected{n} = String(Object.values(rows{n}[0] ?? {{}})[0] ?? '');")
}

/// Execute the recorded call, bind `response<n>`, and export the response
/// as `apis/Step_<n>.json`.
#[must_use]
pub fn api_lines(request: &ApiRequest, step_number: usize, page_var: &str) -> Vec<String> {
    let n = step_number;
    let payload = serde_json::to_value(request).unwrap_or_default();
    vec![
        format!(
            "const response{n} = await apiRequest({page_var}, {});",
            json_literal(&payload)
        ),
        format!("await exportApiEvidence({n}, response{n});"),
    ]
}

/// Bind `expected<n>` from the response body: a named field when the
/// recording designates one, otherwise the whole body serialized.
#[must_use]
pub fn api_expected_line(step_number: usize, field: Option<&str>) -> String {
    let n = step_number;
    match field {
        Some(field) => format!(
            "const expected{n} = String(response{n}.body[{}] ?? '');",
            js_str(field)
        ),
        None => format!("const expected{n} = JSON.stringify(response{n}.body);"),
    }
}

/// Inject cookies / local storage / session storage.
///
/// Cookie entries are repaired before emission: `sameSite` is normalized,
/// a missing path defaults to `/`, and entries that name neither a URL nor
/// a domain (the automation API requires one) are dropped.
#[must_use]
pub fn storage_lines(storage: &BrowserStorage, page_var: &str) -> Vec<String> {
    match storage.kind {
        StorageKind::Cookie => {
            let cookies: Vec<String> = storage
                .entries
                .iter()
                .filter(|e| !e.name.trim().is_empty())
                .filter_map(cookie_literal)
                .collect();
            if cookies.is_empty() {
                return Vec::new();
            }
            vec![format!("await context.addCookies([{}]);", cookies.join(", "))]
        }
        StorageKind::LocalStorage => page_storage_lines(storage, page_var, "localStorage"),
        StorageKind::SessionStorage => page_storage_lines(storage, page_var, "sessionStorage"),
    }
}

fn page_storage_lines(storage: &BrowserStorage, page_var: &str, api: &str) -> Vec<String> {
    storage
        .entries
        .iter()
        .filter(|e| !e.name.trim().is_empty())
        .map(|e| {
            format!(
                "await {page_var}.evaluate(() => window.{api}.setItem({}, {}));",
                js_str(&e.name),
                js_str(&e.value)
            )
        })
        .collect()
}

fn cookie_literal(entry: &grabar::model::StorageEntry) -> Option<String> {
    let mut cookie = json!({
        "name": entry.name,
        "value": entry.value,
    });
    let obj = cookie.as_object_mut()?;
    if let Some(url) = entry.url.as_ref().filter(|u| !u.trim().is_empty()) {
        obj.insert("url".to_string(), json!(url));
    } else if let Some(domain) = entry.domain.as_ref().filter(|d| !d.trim().is_empty()) {
        obj.insert("domain".to_string(), json!(domain));
        let path = entry.path.as_deref().filter(|p| !p.trim().is_empty());
        obj.insert("path".to_string(), json!(path.unwrap_or("/")));
    } else {
        // The automation API rejects cookies with neither scope.
        return None;
    }
    if let Some(same_site) = &entry.same_site {
        obj.insert("sameSite".to_string(), json!(normalize_same_site(same_site)));
    }
    if let Some(expires) = entry.expires {
        obj.insert("expires".to_string(), json!(expires));
    }
    Some(json_literal(&cookie))
}

fn connection_literal(connection: &Connection) -> String {
    // pg and mysql2 call the host field `host`; mssql calls it `server`.
    let host_field = match connection.engine {
        DbEngine::Mssql => "server",
        DbEngine::Postgres | DbEngine::Mysql => "host",
    };
    let mut value = json!({
        host_field: connection.host,
        "port": connection.port,
        "database": connection.database,
        "user": connection.username,
        "password": connection.password,
    });
    if connection.engine == DbEngine::Mssql {
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "options".to_string(),
                json!({ "trustServerCertificate": true }),
            );
        }
    }
    json_literal(&value)
}
