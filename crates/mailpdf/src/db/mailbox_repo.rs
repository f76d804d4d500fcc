//! Mailbox config repository: the lookup side of the `mailbox_configs` table.
//!
//! Creating and editing configs belongs to the management layer; `insert`
//! exists so that layer (and tests) can seed rows.

use chrono::Utc;
use rusqlite::params;
use secrecy::SecretString;

use super::{Database, DatabaseError};
use crate::error::RetrievalError;
use crate::model::{ImapCredentials, MailboxConfig, MailboxKind};

/// A raw mailbox config row from the database.
#[derive(Debug, Clone)]
pub struct MailboxRow {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub username: String,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub oauth_token: Option<String>,
}

/// Values for a new mailbox config row.
#[derive(Debug, Clone, Default)]
pub struct NewMailbox {
    pub name: String,
    pub kind: String,
    pub username: String,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub oauth_token: Option<String>,
}

/// Inserts a mailbox config and returns its id.
pub fn insert(db: &Database, row: &NewMailbox) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO mailbox_configs (name, kind, username, password, host, port, oauth_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                row.name,
                row.kind,
                row.username,
                row.password,
                row.host,
                row.port,
                row.oauth_token,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a mailbox config by id.
pub fn find(db: &Database, id: i64) -> Result<Option<MailboxRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, username, password, host, port, oauth_token
             FROM mailbox_configs WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(MailboxRow {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
                username: row.get(3)?,
                password: row.get(4)?,
                host: row.get(5)?,
                port: row.get(6)?,
                oauth_token: row.get(7)?,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

impl TryFrom<MailboxRow> for MailboxConfig {
    type Error = RetrievalError;

    /// Decodes the stored kind tag and picks the matching credentials
    /// variant. Out-of-range ports become 0, which the IMAP backend rejects.
    fn try_from(row: MailboxRow) -> Result<Self, Self::Error> {
        let kind: MailboxKind = row.kind.parse()?;
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(match kind {
            MailboxKind::Imap => MailboxConfig::imap(
                row.id,
                row.name,
                ImapCredentials {
                    username: row.username,
                    secret: non_empty(row.password).map(SecretString::from),
                    host: non_empty(row.host),
                    port: row.port.map(|p| u16::try_from(p).unwrap_or(0)),
                },
            ),
            MailboxKind::Gmail => MailboxConfig::gmail(
                row.id,
                row.name,
                non_empty(row.oauth_token).map(SecretString::from),
            ),
        })
    }
}
