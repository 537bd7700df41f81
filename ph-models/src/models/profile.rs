//! Profile entity model.
//!
//! A profile is both the public identity of a user and the credential record
//! used by the auth service. `PublicProfile` is the projection that is safe to
//! serve and cache.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::constants::roles;
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use super::timestamp_now;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub role: String,
    pub is_banned: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to register a profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
}

/// Partial profile update. `None` leaves a column untouched; `Some("")`
/// clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
            && self.website.is_none()
    }
}

/// Public view of a profile, safe to cache and serve to anonymous readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
}

impl From<&Profile> for PublicProfile {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            username: p.username.clone(),
            display_name: p.display_name.clone(),
            bio: p.bio.clone(),
            avatar_url: p.avatar_url.clone(),
            website: p.website.clone(),
            created_at: p.created_at.clone(),
        }
    }
}

impl Profile {
    /// Construct a Profile from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            display_name: row.get("display_name")?,
            bio: row.get("bio")?,
            avatar_url: row.get("avatar_url")?,
            website: row.get("website")?,
            role: row.get("role")?,
            is_banned: row.get::<_, i64>("is_banned")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }

    /// Name to show in the UI.
    pub fn display(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    // ─── Static finders ──────────────────────────────────────────────────

    pub fn find_by_id(conn: &Connection, id: i64) -> PhResult<Option<Self>> {
        Self::find_one(conn, "SELECT * FROM profiles WHERE id = ?1", &id)
    }

    /// Usernames are matched case-insensitively.
    pub fn find_by_username(conn: &Connection, username: &str) -> PhResult<Option<Self>> {
        Self::find_one(conn, "SELECT * FROM profiles WHERE username = ?1", &username)
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> PhResult<Option<Self>> {
        Self::find_one(conn, "SELECT * FROM profiles WHERE email = ?1", &email)
    }

    fn find_one(conn: &Connection, sql: &str, arg: &dyn rusqlite::ToSql) -> PhResult<Option<Self>> {
        match conn.query_row(sql, [arg], Self::from_row) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_db_err(e)),
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert a new profile. Duplicate usernames or emails yield `Conflict`.
    pub fn create(conn: &Connection, new: &NewProfile) -> PhResult<Self> {
        let now = timestamp_now();
        conn.execute(
            "INSERT INTO profiles (username, email, password_hash, display_name, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![new.username, new.email, new.password_hash, new.display_name, roles::USER, now],
        )
        .map_err(map_db_err)?;

        let id = conn.last_insert_rowid();
        Self::find_by_id(conn, id)?
            .ok_or_else(|| PhError::Internal("profile vanished after insert".into()))
    }

    /// Apply a partial update and return the fresh row.
    pub fn apply_update(conn: &Connection, id: i64, update: &ProfileUpdate) -> PhResult<Self> {
        // Empty strings clear the column
        let norm = |v: &Option<String>| -> Option<Option<String>> {
            v.as_ref().map(|s| {
                let t = s.trim();
                if t.is_empty() { None } else { Some(t.to_string()) }
            })
        };

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Option<String>> = Vec::new();
        for (column, value) in [
            ("display_name = ?", norm(&update.display_name)),
            ("bio = ?", norm(&update.bio)),
            ("avatar_url = ?", norm(&update.avatar_url)),
            ("website = ?", norm(&update.website)),
        ] {
            if let Some(v) = value {
                sets.push(column);
                values.push(v);
            }
        }

        let now = timestamp_now();
        let sql = format!(
            "UPDATE profiles SET {}updated_at = ? WHERE id = ?",
            sets.iter().map(|s| format!("{s}, ")).collect::<String>()
        );

        let mut bound: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        bound.push(&now);
        bound.push(&id);

        let changed = conn.execute(&sql, bound.as_slice()).map_err(map_db_err)?;
        if changed == 0 {
            return Err(PhError::not_found("profile"));
        }

        Self::find_by_id(conn, id)?.ok_or_else(|| PhError::not_found("profile"))
    }

    pub fn set_email(conn: &Connection, id: i64, email: &str) -> PhResult<()> {
        conn.execute(
            "UPDATE profiles SET email = ?1, updated_at = ?2 WHERE id = ?3",
            params![email, timestamp_now(), id],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    pub fn set_password_hash(conn: &Connection, id: i64, hash: &str) -> PhResult<()> {
        conn.execute(
            "UPDATE profiles SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![hash, timestamp_now(), id],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    /// Set the role. Returns false when the profile does not exist.
    pub fn set_role(conn: &Connection, id: i64, role: &str) -> PhResult<bool> {
        if !roles::ALL.contains(&role) {
            return Err(PhError::validation(format!("unknown role: {role}")));
        }
        let changed = conn
            .execute(
                "UPDATE profiles SET role = ?1, updated_at = ?2 WHERE id = ?3",
                params![role, timestamp_now(), id],
            )
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }

    /// Ban or unban. Returns false when the profile does not exist.
    pub fn set_banned(conn: &Connection, id: i64, banned: bool) -> PhResult<bool> {
        let changed = conn
            .execute(
                "UPDATE profiles SET is_banned = ?1, updated_at = ?2 WHERE id = ?3",
                params![banned as i64, timestamp_now(), id],
            )
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn new_profile(username: &str, email: &str) -> NewProfile {
        NewProfile {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            display_name: None,
        }
    }

    #[test]
    fn test_create_and_find() {
        let conn = setup();
        let p = Profile::create(&conn, &new_profile("Amara", "amara@example.com")).unwrap();
        assert_eq!(p.role, "user");
        assert!(!p.is_banned);

        let by_name = Profile::find_by_username(&conn, "amara").unwrap().unwrap();
        assert_eq!(by_name.id, p.id);
        let by_email = Profile::find_by_email(&conn, "AMARA@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, p.id);
        assert!(Profile::find_by_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let conn = setup();
        Profile::create(&conn, &new_profile("kofi", "k1@example.com")).unwrap();
        let err = Profile::create(&conn, &new_profile("KOFI", "k2@example.com")).unwrap_err();
        assert!(matches!(err, PhError::Conflict(_)));
    }

    #[test]
    fn test_partial_update() {
        let conn = setup();
        let p = Profile::create(&conn, &new_profile("zola", "z@example.com")).unwrap();

        let update = ProfileUpdate {
            display_name: Some("Zola B".into()),
            bio: Some("Collector of sayings".into()),
            ..Default::default()
        };
        let updated = Profile::apply_update(&conn, p.id, &update).unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Zola B"));
        assert_eq!(updated.bio.as_deref(), Some("Collector of sayings"));
        assert!(updated.website.is_none());

        // Empty string clears
        let clear = ProfileUpdate { bio: Some("".into()), ..Default::default() };
        let cleared = Profile::apply_update(&conn, p.id, &clear).unwrap();
        assert!(cleared.bio.is_none());
        assert_eq!(cleared.display(), "Zola B");
    }

    #[test]
    fn test_role_and_ban() {
        let conn = setup();
        let p = Profile::create(&conn, &new_profile("ife", "ife@example.com")).unwrap();
        assert!(Profile::set_role(&conn, p.id, "admin").unwrap());
        assert!(Profile::set_banned(&conn, p.id, true).unwrap());
        let p = Profile::find_by_id(&conn, p.id).unwrap().unwrap();
        assert!(p.is_admin());
        assert!(p.is_banned);

        assert!(Profile::set_role(&conn, p.id, "superuser").is_err());
        assert!(!Profile::set_banned(&conn, 999, true).unwrap());
    }

    #[test]
    fn test_public_projection_hides_credentials() {
        let conn = setup();
        let p = Profile::create(&conn, &new_profile("tunde", "t@example.com")).unwrap();
        let public = PublicProfile::from(&p);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["username"], "tunde");
    }
}
