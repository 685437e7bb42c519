use pioforum_shared::UserId;
use rusqlite::{params, OptionalExtension};

use crate::database::{from_micros, to_micros, Database};
use crate::error::Result;
use crate::models::Profile;

impl Database {
    /// Profile for a user, if one was ever written.
    pub fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT user_id, display_name, avatar_url, is_anonymous, created_at, updated_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| {
                    let user_id: String = row.get(0)?;
                    let is_anonymous: i64 = row.get(3)?;
                    let created: i64 = row.get(4)?;
                    let updated: i64 = row.get(5)?;
                    Ok(Profile {
                        user_id: UserId(user_id),
                        display_name: row.get(1)?,
                        avatar_url: row.get(2)?,
                        is_anonymous: is_anonymous != 0,
                        created_at: from_micros(created, 4)?,
                        updated_at: from_micros(updated, 5)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Insert or replace a profile. `created_at` of an existing row is kept.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles
                (user_id, display_name, avatar_url, is_anonymous, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url   = excluded.avatar_url,
                is_anonymous = excluded.is_anonymous,
                updated_at   = excluded.updated_at",
            params![
                profile.user_id.as_str(),
                profile.display_name,
                profile.avatar_url,
                profile.is_anonymous as i64,
                to_micros(profile.created_at),
                to_micros(profile.updated_at),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pioforum_shared::Identity;

    use super::*;

    #[test]
    fn test_missing_profile() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_profile(&UserId::new("nobody")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let db = Database::open_in_memory().unwrap();
        let first = Utc::now();
        let identity = Identity::named("u1", "Ada");
        db.upsert_profile(&Profile::from_identity(&identity, first)).unwrap();

        let later = first + Duration::seconds(30);
        let mut renamed = Profile::from_identity(&identity.clone().with_avatar("a.png"), later);
        renamed.display_name = Some("Ada L.".into());
        db.upsert_profile(&renamed).unwrap();

        let stored = db.get_profile(&identity.id).unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Ada L."));
        assert_eq!(stored.avatar_url.as_deref(), Some("a.png"));
        assert_eq!(stored.created_at.timestamp_micros(), first.timestamp_micros());
        assert_eq!(stored.updated_at.timestamp_micros(), later.timestamp_micros());
    }
}
