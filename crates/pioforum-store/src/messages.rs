use chrono::Utc;
use pioforum_shared::{ChannelId, MessageId, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::{from_micros, parse_uuid, to_micros, Database};
use crate::error::Result;
use crate::models::{Message, NewMessage};

impl Database {
    /// Append a message. The store assigns the id and a `created_at` strictly
    /// greater than every timestamp already stored, so a clock step backwards
    /// never reorders a channel.
    pub fn insert_message(&self, new: &NewMessage) -> Result<Message> {
        let last: Option<i64> = self
            .conn()
            .query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))
            .optional()?
            .flatten();

        let now = to_micros(Utc::now());
        let created = match last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };

        let message = Message {
            id: MessageId::new(),
            channel_id: new.channel_id,
            author_id: new.author_id.clone(),
            author_name: new.author_name.clone(),
            author_avatar: new.author_avatar.clone(),
            text: new.text.clone(),
            created_at: from_micros(created, 6)?,
        };

        self.conn().execute(
            "INSERT INTO messages
                (id, channel_id, author_id, author_name, author_avatar, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.channel_id.to_string(),
                message.author_id.as_str(),
                message.author_name,
                message.author_avatar,
                message.text,
                created,
            ],
        )?;
        Ok(message)
    }

    /// Full history of a channel, oldest first.
    pub fn get_messages_for_channel(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, channel_id, author_id, author_name, author_avatar, text, created_at
             FROM messages
             WHERE channel_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![channel_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Delete a batch of messages in one transaction. Ids that no longer exist
    /// are skipped. Returns the number of rows removed and the channels they
    /// belonged to.
    pub fn delete_messages(&mut self, ids: &[MessageId]) -> Result<(usize, Vec<ChannelId>)> {
        let tx = self.conn_mut().transaction()?;
        let mut removed = 0;
        let mut channels: Vec<ChannelId> = Vec::new();
        {
            let mut lookup = tx.prepare("SELECT channel_id FROM messages WHERE id = ?1")?;
            let mut delete = tx.prepare("DELETE FROM messages WHERE id = ?1")?;
            for id in ids {
                let channel: Option<String> = lookup
                    .query_row(params![id.to_string()], |row| row.get(0))
                    .optional()?;
                let Some(channel) = channel else { continue };

                removed += delete.execute(params![id.to_string()])?;
                let channel = ChannelId(parse_uuid(&channel, 0)?);
                if !channels.contains(&channel) {
                    channels.push(channel);
                }
            }
        }
        tx.commit()?;
        Ok((removed, channels))
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let channel_id_str: String = row.get(1)?;
    let author_id: String = row.get(2)?;
    let created: i64 = row.get(6)?;

    Ok(Message {
        id: MessageId(parse_uuid(&id_str, 0)?),
        channel_id: ChannelId(parse_uuid(&channel_id_str, 1)?),
        author_id: UserId(author_id),
        author_name: row.get(3)?,
        author_avatar: row.get(4)?,
        text: row.get(5)?,
        created_at: from_micros(created, 6)?,
    })
}
