use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use plenum_types::models::Profile;
use plenum_types::roles::Role;

use crate::Database;
use crate::models::ProfileRow;

impl Database {
    pub fn create_profile(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, email, password, first_name, last_name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    email,
                    password_hash,
                    first_name,
                    last_name,
                    role.as_str(),
                    created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Full row including the password hash, for login verification only.
    pub fn get_profile_auth(&self, email: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile_row(conn, "email = ?1", email))
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            Ok(query_profile_row(conn, "id = ?1", &id.to_string())?.map(ProfileRow::into_profile))
        })
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY first_name, last_name"
            ))?;
            let rows = stmt
                .query_map([], map_profile_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
        })
    }

    /// All users whose role is in `roles`, e.g. the broadcast audience for
    /// admin/special/superadmin notifications.
    pub fn profiles_with_roles(&self, roles: &[Role]) -> Result<Vec<Profile>> {
        if roles.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=roles.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE role IN ({}) ORDER BY first_name, last_name",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let role_strs: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
            let params: Vec<&dyn rusqlite::types::ToSql> = role_strs
                .iter()
                .map(|s| s as &dyn rusqlite::types::ToSql)
                .collect();
            let rows = stmt
                .query_map(params.as_slice(), map_profile_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
        })
    }

    /// "First Last" for a profile, None when the profile is missing or has
    /// no name set.
    pub fn full_name(&self, id: Uuid) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let name: Option<(String, String)> = conn
                .query_row(
                    "SELECT first_name, last_name FROM profiles WHERE id = ?1",
                    [id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(name.and_then(|(first, last)| {
                let full = format!("{} {}", first, last).trim().to_string();
                if full.is_empty() { None } else { Some(full) }
            }))
        })
    }
}

const PROFILE_COLUMNS: &str = "id, email, password, first_name, last_name, role, created_at";

fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_profile_row(conn: &Connection, filter: &str, value: &str) -> Result<Option<ProfileRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE {filter}"
    ))?;
    Ok(stmt.query_row([value], map_profile_row).optional()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn seed_profile(db: &Database, id: u128, name: &str, role: Role) -> Uuid {
        let uid = Uuid::from_u128(id);
        db.create_profile(
            uid,
            &format!("{}@example.org", name.to_lowercase()),
            "argon2-hash",
            name,
            "Member",
            role,
            Utc::now(),
        )
        .expect("seed profile");
        uid
    }

    #[test]
    fn role_audience_query_filters_by_role() {
        let db = Database::open_in_memory().unwrap();
        seed_profile(&db, 1, "Ana", Role::Admin);
        seed_profile(&db, 2, "Ben", Role::Special);
        seed_profile(&db, 3, "Cy", Role::Viewer);
        seed_profile(&db, 4, "Di", Role::Superadmin);

        let audience = db
            .profiles_with_roles(&[Role::Admin, Role::Special, Role::Superadmin])
            .unwrap();
        let names: Vec<_> = audience.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Ben", "Di"]);

        assert!(db.profiles_with_roles(&[]).unwrap().is_empty());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_profile(&db, 1, "Ana", Role::Viewer);
        let err = db.create_profile(
            Uuid::from_u128(2),
            "ana@example.org",
            "hash",
            "Other",
            "Ana",
            Role::Viewer,
            Utc::now(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn full_name_trims_and_falls_back_to_none() {
        let db = Database::open_in_memory().unwrap();
        let uid = seed_profile(&db, 1, "Ana", Role::Viewer);
        assert_eq!(db.full_name(uid).unwrap().as_deref(), Some("Ana Member"));

        let blank = Uuid::from_u128(9);
        db.create_profile(blank, "x@example.org", "hash", "", "", Role::Viewer, Utc::now())
            .unwrap();
        assert_eq!(db.full_name(blank).unwrap(), None);
        assert_eq!(db.full_name(Uuid::from_u128(77)).unwrap(), None);
    }

    #[test]
    fn auth_row_keeps_the_hash_and_profile_drops_it() {
        let db = Database::open_in_memory().unwrap();
        let uid = seed_profile(&db, 1, "Ana", Role::Admin);

        let row = db.get_profile_auth("ana@example.org").unwrap().unwrap();
        assert_eq!(row.password, "argon2-hash");

        let profile = db.get_profile(uid).unwrap().unwrap();
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.full_name(), "Ana Member");
    }
}
