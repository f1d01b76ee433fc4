pub const LOGS_TABLE: &str = "LOGS";
pub const TAGS_TABLE: &str = "TAGS";

pub const ID_COLUMN: &str = "id";
pub const LOG_COLUMN: &str = "log";
pub const IDENTIFIER_COLUMN: &str = "uniqueidentifier";
pub const CREATED_COLUMN: &str = "createdate";
pub const TAG_COLUMN: &str = "tag";

/// Columns written per log row, in placeholder order.
pub const LOG_FIELDS: &[&str] = &[LOG_COLUMN, IDENTIFIER_COLUMN, CREATED_COLUMN];
pub const TAG_FIELDS: &[&str] = &[IDENTIFIER_COLUMN, TAG_COLUMN];

pub const CREATE_LOGS_TABLE: &str = "CREATE TABLE IF NOT EXISTS LOGS(\
id INTEGER AUTO_INCREMENT, \
log VARCHAR[4096] NOT NULL, \
uniqueidentifier VARCHAR[64] NOT NULL, \
createdate INTEGER NOT NULL, \
PRIMARY KEY (id));";

pub const CREATE_TAGS_TABLE: &str = "CREATE TABLE IF NOT EXISTS TAGS(\
uniqueidentifier VARCHAR[64] NOT NULL, \
tag VARCHAR[64] NOT NULL, \
PRIMARY KEY (uniqueidentifier, tag));";

pub const LOGS_INDEXES: &[&str] = &[
    "CREATE INDEX ON LOGS(id);",
    "CREATE UNIQUE INDEX ON LOGS(uniqueidentifier);",
];

pub const TAGS_INDEXES: &[&str] = &["CREATE INDEX ON TAGS(tag);"];
