//! SQLite implementation of the store traits

use crate::error::{MailError, Result};
use crate::mail::{
    Attachment, Email, EmailStatus, Log, LogStatus, NewEmail, Priority, TemplateRef,
};
use crate::store::{Store, TemplateRepository};
use crate::templates::{CreateTemplateRequest, EmailTemplate, TemplateKind};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

const EMAIL_COLUMNS: &str = r#"
    id, to_addrs, cc_addrs, bcc_addrs, from_email, subject, message, html_message,
    template_name, template_language, render_language, context, priority, status,
    scheduled_time, headers, created, last_updated
"#;

const TEMPLATE_COLUMNS: &str = r#"
    id, name, description, subject, content, html_content, language,
    default_template_id, created, last_updated
"#;

/// Store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (or create) the database at `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { db })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Initialize the tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                html_content TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                default_template_id INTEGER
                    REFERENCES email_templates(id) ON DELETE CASCADE,
                created TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE (name, language)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                file TEXT NOT NULL,
                mimetype TEXT
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                to_addrs TEXT NOT NULL,
                cc_addrs TEXT NOT NULL,
                bcc_addrs TEXT NOT NULL,
                from_email TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                message TEXT NOT NULL DEFAULT '',
                html_message TEXT NOT NULL DEFAULT '',
                template_name TEXT,
                template_language TEXT,
                render_language TEXT,
                context TEXT,
                priority INTEGER NOT NULL,
                status TEXT,
                scheduled_time TEXT,
                headers TEXT NOT NULL DEFAULT '{}',
                claimed_by TEXT,
                claimed_at TEXT,
                created TEXT NOT NULL,
                last_updated TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_emails_queue ON emails(status, scheduled_time)")
            .execute(&self.db)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_attachments (
                email_id INTEGER NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                attachment_id INTEGER NOT NULL REFERENCES attachments(id) ON DELETE CASCADE,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (email_id, attachment_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_attachments (
                template_id INTEGER NOT NULL REFERENCES email_templates(id) ON DELETE CASCADE,
                attachment_id INTEGER NOT NULL REFERENCES attachments(id) ON DELETE CASCADE,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (template_id, attachment_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id INTEGER NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_email ON logs(email_id)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Create a template; `(name, language)` must be unused
    pub async fn create_template(&self, request: CreateTemplateRequest) -> Result<EmailTemplate> {
        let now = Utc::now();
        let language = request.language.unwrap_or_default();

        let kind = match request.base_id {
            Some(base_id) => TemplateKind::Localized {
                base_id,
                language: language.clone(),
            },
            None if language.is_empty() => TemplateKind::Base,
            None => {
                return Err(MailError::Parse(format!(
                    "template {} has language {} but no base template",
                    request.name, language
                )))
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO email_templates (
                name, description, subject, content, html_content, language,
                default_template_id, created, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.subject)
        .bind(&request.content)
        .bind(&request.html_content)
        .bind(&language)
        .bind(request.base_id)
        .bind(db_time(&now))
        .bind(db_time(&now))
        .execute(&self.db)
        .await?;

        info!("Created email template {}:{}", request.name, language);

        Ok(EmailTemplate {
            id: result.last_insert_rowid(),
            name: request.name,
            description: request.description,
            subject: request.subject,
            content: request.content,
            html_content: request.html_content,
            kind,
            attachments: Vec::new(),
            created: now,
            last_updated: now,
        })
    }

    /// Append a default attachment to a template
    pub async fn add_template_attachment(&self, template_id: i64, attachment_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO template_attachments (template_id, attachment_id, position)
            VALUES (?, ?, (
                SELECT COALESCE(MAX(position) + 1, 0)
                FROM template_attachments WHERE template_id = ?
            ))
            "#,
        )
        .bind(template_id)
        .bind(attachment_id)
        .bind(template_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Base templates only; translations are listed under their base
    pub async fn list_primary_templates(&self) -> Result<Vec<EmailTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM email_templates WHERE default_template_id IS NULL ORDER BY name",
            TEMPLATE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            templates.push(self.load_template(row).await?);
        }
        Ok(templates)
    }

    async fn load_template(&self, row: SqliteRow) -> Result<EmailTemplate> {
        let mut template = row_to_template(&row)?;

        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.file, a.mimetype
            FROM attachments a
            JOIN template_attachments ta ON ta.attachment_id = a.id
            WHERE ta.template_id = ?
            ORDER BY ta.position
            "#,
        )
        .bind(template.id)
        .fetch_all(&self.db)
        .await?;

        template.attachments = rows
            .iter()
            .map(row_to_attachment)
            .collect::<Result<Vec<_>>>()?;

        Ok(template)
    }

    /// Move unclaimed emails to `status` from any state allowed to reach it
    async fn set_status(&self, ids: &[i64], status: EmailStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE emails SET status = ");
        query.push_bind(status.to_db_string());
        query.push(", claimed_by = NULL, claimed_at = NULL, last_updated = ");
        query.push_bind(db_time(&Utc::now()));
        query.push(" WHERE claimed_by IS NULL AND ");
        query.push(status_condition(status));
        query.push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query.build().execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TemplateRepository for SqliteStore {
    async fn find_template(&self, name: &str, language: &str) -> Result<Option<EmailTemplate>> {
        debug!("Loading template {}:{}", name, language);

        let row = sqlx::query(&format!(
            "SELECT {} FROM email_templates WHERE name = ? AND language = ?",
            TEMPLATE_COLUMNS
        ))
        .bind(name)
        .bind(language)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_template(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_email(&self, email: &NewEmail) -> Result<Email> {
        let mut tx = self.db.begin().await?;
        let inserted = insert_email_row(&mut tx, email, email.initial_status()).await?;
        link_attachment_rows(&mut tx, inserted.id, &email.attachments).await?;
        tx.commit().await?;

        debug!("Inserted email {} with priority {}", inserted.id, inserted.priority);
        Ok(inserted)
    }

    async fn insert_failed_email(&self, email: &NewEmail, message: &str) -> Result<Email> {
        let mut tx = self.db.begin().await?;
        let inserted = insert_email_row(&mut tx, email, Some(EmailStatus::Failed)).await?;
        link_attachment_rows(&mut tx, inserted.id, &email.attachments).await?;
        insert_log_row(&mut tx, inserted.id, LogStatus::Failed, message, &inserted.created).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn get_email(&self, id: i64) -> Result<Option<Email>> {
        let row = sqlx::query(&format!("SELECT {} FROM emails WHERE id = ?", EMAIL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_email).transpose()
    }

    async fn due_emails(&self, now: DateTime<Utc>, limit: Option<i64>) -> Result<Vec<Email>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM emails
            WHERE status = 'queued'
              AND claimed_by IS NULL
              AND (scheduled_time IS NULL OR scheduled_time <= ?)
            ORDER BY priority DESC, id ASC
            LIMIT ?
            "#,
            EMAIL_COLUMNS
        ))
        .bind(db_time(&now))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_email).collect()
    }

    async fn claim_email(&self, id: i64, worker: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE emails
            SET claimed_by = ?, claimed_at = ?
            WHERE id = ?
              AND (status = 'queued' OR status IS NULL)
              AND claimed_by IS NULL
            "#,
        )
        .bind(worker)
        .bind(db_time(&Utc::now()))
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_dispatch(
        &self,
        id: i64,
        worker: &str,
        status: LogStatus,
        message: &str,
    ) -> Result<Option<Log>> {
        let now = Utc::now();
        let status_to = EmailStatus::from(status);
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(&format!(
            r#"
            UPDATE emails
            SET status = ?, claimed_by = NULL, claimed_at = NULL, last_updated = ?
            WHERE id = ? AND claimed_by = ? AND {}
            "#,
            status_condition(status_to)
        ))
        .bind(status_to.to_db_string())
        .bind(db_time(&now))
        .bind(id)
        .bind(worker)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            warn!("Email {} is no longer claimed by {}, outcome dropped", id, worker);
            return Ok(None);
        }

        let log_id = insert_log_row(&mut tx, id, status, message, &now).await?;
        tx.commit().await?;

        Ok(Some(Log {
            id: log_id,
            email_id: id,
            date: now,
            status,
            message: message.to_string(),
        }))
    }

    async fn requeue(&self, ids: &[i64]) -> Result<u64> {
        let count = self.set_status(ids, EmailStatus::Queued).await?;

        info!("Requeued {} emails", count);
        Ok(count)
    }

    async fn mark_as_sent(&self, ids: &[i64]) -> Result<u64> {
        let count = self.set_status(ids, EmailStatus::Sent).await?;

        info!("Marked {} emails as sent", count);
        Ok(count)
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE emails
            SET claimed_by = NULL, claimed_at = NULL
            WHERE claimed_by IS NOT NULL AND claimed_at < ?
            "#,
        )
        .bind(db_time(&claimed_before))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_email(&self, id: i64) -> Result<Vec<Attachment>> {
        let mut tx = self.db.begin().await?;

        let linked: Vec<i64> =
            sqlx::query_scalar("SELECT attachment_id FROM email_attachments WHERE email_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM emails WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(MailError::NotFound(format!("Email {} not found", id)));
        }

        let mut orphaned = Vec::new();
        for attachment_id in linked {
            let row = sqlx::query(
                r#"
                SELECT id, name, file, mimetype FROM attachments
                WHERE id = ?
                  AND NOT EXISTS (SELECT 1 FROM email_attachments WHERE attachment_id = ?)
                  AND NOT EXISTS (SELECT 1 FROM template_attachments WHERE attachment_id = ?)
                "#,
            )
            .bind(attachment_id)
            .bind(attachment_id)
            .bind(attachment_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                sqlx::query("DELETE FROM attachments WHERE id = ?")
                    .bind(attachment_id)
                    .execute(&mut *tx)
                    .await?;
                orphaned.push(row_to_attachment(&row)?);
            }
        }

        tx.commit().await?;
        Ok(orphaned)
    }

    async fn insert_attachment(
        &self,
        name: &str,
        file: &str,
        mimetype: Option<&str>,
    ) -> Result<Attachment> {
        let result = sqlx::query("INSERT INTO attachments (name, file, mimetype) VALUES (?, ?, ?)")
            .bind(name)
            .bind(file)
            .bind(mimetype)
            .execute(&self.db)
            .await?;

        Ok(Attachment {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            file: file.to_string(),
            mimetype: mimetype.map(str::to_string),
        })
    }

    async fn delete_attachment(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn link_attachments(&self, email_id: i64, attachment_ids: &[i64]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        link_attachment_rows(&mut tx, email_id, attachment_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn email_attachments(&self, email_id: i64) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.file, a.mimetype
            FROM attachments a
            JOIN email_attachments ea ON ea.attachment_id = a.id
            WHERE ea.email_id = ?
            ORDER BY ea.position
            "#,
        )
        .bind(email_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_attachment).collect()
    }

    async fn email_logs(&self, email_id: i64) -> Result<Vec<Log>> {
        let rows = sqlx::query(
            "SELECT id, email_id, date, status, message FROM logs WHERE email_id = ? ORDER BY id",
        )
        .bind(email_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_log).collect()
    }
}

async fn insert_email_row(
    conn: &mut SqliteConnection,
    email: &NewEmail,
    status: Option<EmailStatus>,
) -> Result<Email> {
    let now = Utc::now();
    let priority = email.priority();
    let context = email.context.as_ref().map(serde_json::to_string).transpose()?;

    let result = sqlx::query(
        r#"
        INSERT INTO emails (
            to_addrs, cc_addrs, bcc_addrs, from_email, subject, message, html_message,
            template_name, template_language, render_language, context, priority, status,
            scheduled_time, headers, created, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(serde_json::to_string(&email.to)?)
    .bind(serde_json::to_string(&email.cc)?)
    .bind(serde_json::to_string(&email.bcc)?)
    .bind(&email.from_email)
    .bind(&email.subject)
    .bind(&email.message)
    .bind(&email.html_message)
    .bind(email.template.as_ref().map(|t| t.name.as_str()))
    .bind(email.template.as_ref().map(|t| t.language.as_str()))
    .bind(email.language.as_deref())
    .bind(context)
    .bind(priority.to_db_value())
    .bind(status.map(EmailStatus::to_db_string))
    .bind(email.scheduled_time.as_ref().map(db_time))
    .bind(serde_json::to_string(&email.headers)?)
    .bind(db_time(&now))
    .bind(db_time(&now))
    .execute(&mut *conn)
    .await?;

    Ok(Email {
        id: result.last_insert_rowid(),
        to: email.to.clone(),
        cc: email.cc.clone(),
        bcc: email.bcc.clone(),
        from_email: email.from_email.clone(),
        subject: email.subject.clone(),
        message: email.message.clone(),
        html_message: email.html_message.clone(),
        template: email.template.clone(),
        language: email.language.clone(),
        context: email.context.clone(),
        priority,
        status,
        scheduled_time: email.scheduled_time,
        headers: email.headers.clone(),
        created: now,
        last_updated: now,
    })
}

async fn link_attachment_rows(
    conn: &mut SqliteConnection,
    email_id: i64,
    attachment_ids: &[i64],
) -> Result<()> {
    for (position, attachment_id) in attachment_ids.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO email_attachments (email_id, attachment_id, position)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(email_id)
        .bind(attachment_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_log_row(
    conn: &mut SqliteConnection,
    email_id: i64,
    status: LogStatus,
    message: &str,
    date: &DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO logs (email_id, date, status, message) VALUES (?, ?, ?, ?)")
        .bind(email_id)
        .bind(db_time(date))
        .bind(status.to_db_string())
        .bind(message)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// SQL condition matching the states that may move to `to`
fn status_condition(to: EmailStatus) -> String {
    let sources = EmailStatus::sources(to);
    let mut clauses: Vec<String> = Vec::new();

    if sources.contains(&None) {
        clauses.push("status IS NULL".to_string());
    }
    let named: Vec<String> = sources
        .iter()
        .flatten()
        .map(|status| format!("'{}'", status.to_db_string()))
        .collect();
    if !named.is_empty() {
        clauses.push(format!("status IN ({})", named.join(", ")));
    }

    format!("({})", clauses.join(" OR "))
}

/// Fixed-width UTC timestamps so that text comparison orders them correctly
fn db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| MailError::Parse(format!("invalid timestamp {}: {}", value, e)))
}

fn row_to_email(row: &SqliteRow) -> Result<Email> {
    let to: String = row.try_get("to_addrs")?;
    let cc: String = row.try_get("cc_addrs")?;
    let bcc: String = row.try_get("bcc_addrs")?;
    let headers: String = row.try_get("headers")?;
    let context: Option<String> = row.try_get("context")?;
    let template_name: Option<String> = row.try_get("template_name")?;
    let template_language: Option<String> = row.try_get("template_language")?;
    let priority: i64 = row.try_get("priority")?;
    let status: Option<String> = row.try_get("status")?;
    let scheduled_time: Option<String> = row.try_get("scheduled_time")?;
    let created: String = row.try_get("created")?;
    let last_updated: String = row.try_get("last_updated")?;

    let status = status
        .map(|s| {
            EmailStatus::from_db_string(&s)
                .ok_or_else(|| MailError::Parse(format!("unknown email status: {}", s)))
        })
        .transpose()?;

    Ok(Email {
        id: row.try_get("id")?,
        to: serde_json::from_str(&to)?,
        cc: serde_json::from_str(&cc)?,
        bcc: serde_json::from_str(&bcc)?,
        from_email: row.try_get("from_email")?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        html_message: row.try_get("html_message")?,
        template: template_name.map(|name| TemplateRef {
            name,
            language: template_language.unwrap_or_default(),
        }),
        language: row.try_get("render_language")?,
        context: context.map(|c| serde_json::from_str(&c)).transpose()?,
        priority: Priority::from_db_value(priority)
            .ok_or_else(|| MailError::Parse(format!("unknown priority: {}", priority)))?,
        status,
        scheduled_time: scheduled_time.as_deref().map(parse_time).transpose()?,
        headers: serde_json::from_str(&headers)?,
        created: parse_time(&created)?,
        last_updated: parse_time(&last_updated)?,
    })
}

fn row_to_template(row: &SqliteRow) -> Result<EmailTemplate> {
    let language: String = row.try_get("language")?;
    let base_id: Option<i64> = row.try_get("default_template_id")?;
    let created: String = row.try_get("created")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(EmailTemplate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        subject: row.try_get("subject")?,
        content: row.try_get("content")?,
        html_content: row.try_get("html_content")?,
        kind: match base_id {
            Some(base_id) => TemplateKind::Localized { base_id, language },
            None => TemplateKind::Base,
        },
        attachments: Vec::new(),
        created: parse_time(&created)?,
        last_updated: parse_time(&last_updated)?,
    })
}

fn row_to_attachment(row: &SqliteRow) -> Result<Attachment> {
    Ok(Attachment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        file: row.try_get("file")?,
        mimetype: row.try_get("mimetype")?,
    })
}

fn row_to_log(row: &SqliteRow) -> Result<Log> {
    let date: String = row.try_get("date")?;
    let status: String = row.try_get("status")?;

    Ok(Log {
        id: row.try_get("id")?,
        email_id: row.try_get("email_id")?,
        date: parse_time(&date)?,
        status: LogStatus::from_db_string(&status)
            .ok_or_else(|| MailError::Parse(format!("unknown log status: {}", status)))?,
        message: row.try_get("message")?,
    })
}
