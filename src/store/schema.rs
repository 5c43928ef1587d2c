//! Table DDL (spec.md §6), executed once at startup.
//!
//! Grounded in `original_source/server/internal/data/{project,request,response}.go`'s
//! `CreateXTable` functions, extended with the columns spec.md's fuller data
//! model mandates (`responseid`/`requestid` cross-references, `url`) that the
//! original schema never had.

pub const CREATE_PROJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created TEXT NOT NULL
);
"#;

pub const CREATE_REQUESTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS requests (
    id TEXT PRIMARY KEY NOT NULL UNIQUE,
    projectid TEXT NOT NULL REFERENCES projects(id),
    responseid TEXT NOT NULL,
    method TEXT NOT NULL,
    domain TEXT NOT NULL,
    ipaddr TEXT NOT NULL,
    url TEXT NOT NULL,
    length INTEGER NOT NULL,
    edited INTEGER NOT NULL CHECK (edited IN (0, 1)),
    timestamp TEXT NOT NULL,
    comment TEXT NOT NULL DEFAULT '',
    raw TEXT NOT NULL
);
"#;

pub const CREATE_RESPONSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY NOT NULL UNIQUE,
    projectid TEXT NOT NULL REFERENCES projects(id),
    requestid TEXT NOT NULL REFERENCES requests(id),
    status INTEGER NOT NULL,
    length INTEGER NOT NULL,
    elapsed INTEGER NOT NULL,
    edited INTEGER NOT NULL CHECK (edited IN (0, 1)),
    timestamp TEXT NOT NULL,
    mimetype TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    raw TEXT NOT NULL
);
"#;

/// Natural join backing `history(project_id)` (spec.md §6), ordered by
/// `request.timestamp`.
pub const HISTORY_QUERY: &str = r#"
SELECT
    ROW_NUMBER() OVER (ORDER BY req.timestamp) AS idx,
    req.method AS method,
    res.status AS status,
    req.domain AS target,
    req.url AS url,
    req.ipaddr AS ipaddr,
    res.length AS length,
    req.timestamp AS timestamp,
    req.edited AS edited,
    req.comment AS comment,
    req.id AS requestid,
    res.id AS responseid
FROM requests req
INNER JOIN responses res ON req.id = res.requestid
WHERE req.projectid = ?
ORDER BY req.timestamp;
"#;
