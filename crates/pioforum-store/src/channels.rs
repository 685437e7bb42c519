//! CRUD operations for [`Channel`] records.

use pioforum_shared::validate::name_key;
use pioforum_shared::ChannelId;
use rusqlite::params;

use crate::database::{from_micros, parse_uuid, to_micros, Database};
use crate::error::{Result, StoreError};
use crate::models::Channel;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new channel. Fails with [`StoreError::Conflict`] when another
    /// channel already uses the same name, ignoring case.
    pub fn insert_channel(&self, channel: &Channel) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO channels (id, name, name_key, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    channel.id.to_string(),
                    channel.name,
                    name_key(&channel.name),
                    to_micros(channel.created_at),
                ],
            )
            .map_err(|e| StoreError::from_write(e, &channel.name))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single channel by id.
    pub fn get_channel(&self, id: ChannelId) -> Result<Channel> {
        self.conn()
            .query_row(
                "SELECT id, name, created_at
                 FROM channels
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all channels in arrival order.
    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, created_at
             FROM channels
             ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map([], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Rename a channel, keeping its position in the list.
    pub fn rename_channel(&self, id: ChannelId, name: &str) -> Result<Channel> {
        let affected = self
            .conn()
            .execute(
                "UPDATE channels SET name = ?1, name_key = ?2 WHERE id = ?3",
                params![name, name_key(name), id.to_string()],
            )
            .map_err(|e| StoreError::from_write(e, name))?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_channel(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a channel by id.  Returns `true` if a row was deleted.
    pub fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM channels WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Channel`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let created: i64 = row.get(2)?;

    Ok(Channel {
        id: ChannelId(parse_uuid(&id_str, 0)?),
        name,
        created_at: from_micros(created, 2)?,
    })
}
