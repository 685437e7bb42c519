//! v001 -- Initial schema creation.
//!
//! Creates the three forum collections: `channels`, `messages` and
//! `profiles`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Channels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name       TEXT NOT NULL,
    name_key   TEXT NOT NULL UNIQUE,          -- lower-cased name
    created_at INTEGER NOT NULL               -- unix micros
);

-- ----------------------------------------------------------------
-- Messages
--
-- No foreign key to channels: a channel delete and the cleanup of its
-- messages are separate operations, orphans may exist in between.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    channel_id    TEXT NOT NULL,
    author_id     TEXT NOT NULL,
    author_name   TEXT NOT NULL,              -- snapshot at send time
    author_avatar TEXT NOT NULL DEFAULT '',   -- snapshot at send time
    text          TEXT NOT NULL,
    created_at    INTEGER NOT NULL            -- unix micros, store assigned
);

CREATE INDEX IF NOT EXISTS idx_messages_channel_ts
    ON messages(channel_id, created_at ASC);

-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id      TEXT PRIMARY KEY NOT NULL,   -- provider-assigned id
    display_name TEXT,
    avatar_url   TEXT,
    is_anonymous INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
