//! Attachment record repository for the `attachment_records` table.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{Database, DatabaseError};
use crate::model::AttachmentRecord;

/// Inserts one attachment record.
pub fn insert(db: &Database, record: &AttachmentRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO attachment_records (filename, source_subject, source_sender, received_at,
             size_bytes, storage_path, mailbox_config_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.filename,
                record.source_subject,
                record.source_sender,
                record.received_at.to_rfc3339(),
                record.size_bytes as i64,
                record.storage_path.to_string_lossy(),
                record.mailbox_config_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Lists the records of one mailbox, most recently received first.
pub fn list_by_mailbox(
    db: &Database,
    mailbox_config_id: i64,
) -> Result<Vec<AttachmentRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT filename, source_subject, source_sender, received_at, size_bytes,
                    storage_path, mailbox_config_id
             FROM attachment_records WHERE mailbox_config_id = ?1
             ORDER BY received_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![mailbox_config_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(filename, subject, sender, received_at, size, path, mailbox_id)| {
                    let received_at = DateTime::parse_from_rfc3339(&received_at)
                        .map_err(|e| DatabaseError::InvalidValue {
                            column: "received_at",
                            reason: e.to_string(),
                        })?
                        .with_timezone(&Utc);
                    Ok(AttachmentRecord {
                        filename,
                        source_subject: subject,
                        source_sender: sender,
                        received_at,
                        size_bytes: size.max(0) as u64,
                        storage_path: PathBuf::from(path),
                        mailbox_config_id: mailbox_id,
                    })
                },
            )
            .collect()
    })
}

/// Counts the records of one mailbox.
pub fn count_by_mailbox(db: &Database, mailbox_config_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM attachment_records WHERE mailbox_config_id = ?1",
            params![mailbox_config_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mailbox_repo::{self, NewMailbox};

    fn test_db_with_mailbox() -> (Database, i64) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let id = mailbox_repo::insert(
            &db,
            &NewMailbox {
                name: "inbox".to_string(),
                kind: "GMAIL".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        (db, id)
    }

    fn sample_record(mailbox_config_id: i64, name: &str, received: &str) -> AttachmentRecord {
        AttachmentRecord {
            filename: name.to_string(),
            source_subject: "Invoice March".to_string(),
            source_sender: "Billing <billing@example.com>".to_string(),
            received_at: DateTime::parse_from_rfc3339(received)
                .unwrap()
                .with_timezone(&Utc),
            size_bytes: 1234,
            storage_path: PathBuf::from(format!("/var/pdfs/{}", name)),
            mailbox_config_id,
        }
    }

    #[test]
    fn test_insert_and_list() {
        let (db, id) = test_db_with_mailbox();
        insert(&db, &sample_record(id, "1-0-a.pdf", "2026-03-01T10:00:00Z")).unwrap();
        insert(&db, &sample_record(id, "2-1-b.pdf", "2026-03-02T10:00:00Z")).unwrap();

        let records = list_by_mailbox(&db, id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "2-1-b.pdf");
        assert_eq!(records[1], sample_record(id, "1-0-a.pdf", "2026-03-01T10:00:00Z"));
    }

    #[test]
    fn test_count_by_mailbox() {
        let (db, id) = test_db_with_mailbox();
        assert_eq!(count_by_mailbox(&db, id).unwrap(), 0);

        insert(&db, &sample_record(id, "1-0-a.pdf", "2026-03-01T10:00:00Z")).unwrap();
        assert_eq!(count_by_mailbox(&db, id).unwrap(), 1);
        assert_eq!(count_by_mailbox(&db, id + 1).unwrap(), 0);
    }

    #[test]
    fn test_insert_for_missing_mailbox_fails() {
        let (db, id) = test_db_with_mailbox();
        let result = insert(&db, &sample_record(id + 100, "x.pdf", "2026-03-01T10:00:00Z"));
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }
}
