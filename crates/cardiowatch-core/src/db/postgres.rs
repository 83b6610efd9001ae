//! PostgreSQL connection and queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    AlertSettings, AlertSettingsInput, HealthAlert, NewAlert, NewReading, Reading, Subject,
};

use super::{AlertDraft, AlertStore, SubjectDirectory};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Alert store and subject directory backed by PostgreSQL
#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    /// Create a new store over `pool`
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

const INSERT_READING: &str = r#"
    INSERT INTO readings (
        id, subject_id, heart_rate, rhythm, waveform, device_id,
        is_normal, alert_triggered, created_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
"#;

const INSERT_ALERT: &str = r#"
    INSERT INTO health_alerts (
        id, reading_id, subject_id, alert_type, severity, message,
        is_resolved, created_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, false, $7)
"#;

fn bind_reading<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    reading: &'q Reading,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(reading.id)
        .bind(reading.subject_id)
        .bind(reading.heart_rate)
        .bind(&reading.rhythm)
        .bind(&reading.waveform)
        .bind(&reading.device_id)
        .bind(reading.is_normal)
        .bind(reading.alert_triggered)
        .bind(reading.created_at)
}

fn bind_alert<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    alert: &'q HealthAlert,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(alert.id)
        .bind(alert.reading_id)
        .bind(alert.subject_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.created_at)
}

#[async_trait]
impl AlertStore for PgAlertStore {
    async fn record_reading(&self, reading: NewReading) -> Result<Reading> {
        let reading = Reading::from_new(Uuid::new_v4(), reading, false, Utc::now());
        bind_reading(sqlx::query(INSERT_READING), &reading)
            .execute(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<HealthAlert> {
        let alert = HealthAlert::from_new(Uuid::new_v4(), alert, Utc::now());
        bind_alert(sqlx::query(INSERT_ALERT), &alert)
            .execute(&self.pool)
            .await?;
        Ok(alert)
    }

    async fn record_assessment(
        &self,
        reading: NewReading,
        draft: Option<AlertDraft>,
    ) -> Result<(Reading, Option<HealthAlert>)> {
        let now = Utc::now();
        let reading = Reading::from_new(Uuid::new_v4(), reading, draft.is_some(), now);
        let alert = draft.map(|d| HealthAlert::from_new(Uuid::new_v4(), d.into_new_alert(&reading), now));

        let mut tx = self.pool.begin().await?;

        bind_reading(sqlx::query(INSERT_READING), &reading)
            .execute(&mut *tx)
            .await?;

        if let Some(alert) = &alert {
            bind_alert(sqlx::query(INSERT_ALERT), alert)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok((reading, alert))
    }

    async fn resolve_alert(&self, alert_id: Uuid, resolver: &str) -> Result<HealthAlert> {
        let row = sqlx::query_as::<_, HealthAlertRow>(
            r#"
            UPDATE health_alerts
            SET is_resolved = true, resolved_by = $2, resolved_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .bind(resolver)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::not_found("Alert", alert_id))?
            .try_into()
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<HealthAlert>> {
        let row = sqlx::query_as::<_, HealthAlertRow>("SELECT * FROM health_alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(HealthAlert::try_from).transpose()
    }

    async fn recent_readings(&self, subject_id: Uuid, limit: i64) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT * FROM readings
            WHERE subject_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subject_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn unresolved_alerts(&self, limit: i64) -> Result<Vec<HealthAlert>> {
        let rows = sqlx::query_as::<_, HealthAlertRow>(
            r#"
            SELECT * FROM health_alerts
            WHERE is_resolved = false
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthAlert::try_from).collect()
    }

    async fn alerts_for_subject(&self, subject_id: Uuid, limit: i64) -> Result<Vec<HealthAlert>> {
        let rows = sqlx::query_as::<_, HealthAlertRow>(
            r#"
            SELECT * FROM health_alerts
            WHERE subject_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subject_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthAlert::try_from).collect()
    }

    async fn get_settings(&self, subject_id: Uuid) -> Result<Option<AlertSettings>> {
        let row = sqlx::query_as::<_, AlertSettingsRow>(
            "SELECT * FROM alert_settings WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert_settings(
        &self,
        subject_id: Uuid,
        input: &AlertSettingsInput,
    ) -> Result<AlertSettings> {
        let settings = AlertSettings::from_input(subject_id, input, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO alert_settings (
                subject_id, high_heart_rate_threshold, low_heart_rate_threshold,
                enable_rhythm_alerts, enable_whatsapp_alerts, enable_sms_alerts, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (subject_id) DO UPDATE SET
                high_heart_rate_threshold = EXCLUDED.high_heart_rate_threshold,
                low_heart_rate_threshold = EXCLUDED.low_heart_rate_threshold,
                enable_rhythm_alerts = EXCLUDED.enable_rhythm_alerts,
                enable_whatsapp_alerts = EXCLUDED.enable_whatsapp_alerts,
                enable_sms_alerts = EXCLUDED.enable_sms_alerts,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(settings.subject_id)
        .bind(settings.high_heart_rate_threshold)
        .bind(settings.low_heart_rate_threshold)
        .bind(settings.enable_rhythm_alerts)
        .bind(settings.enable_whatsapp_alerts)
        .bind(settings.enable_sms_alerts)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubjectDirectory for PgAlertStore {
    async fn get_subject(&self, subject_id: Uuid) -> Result<Option<Subject>> {
        let row = sqlx::query_as::<_, SubjectRow>(
            "SELECT id, display_name, phone_number, observer_id FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: Uuid,
    subject_id: Uuid,
    heart_rate: i32,
    rhythm: String,
    waveform: serde_json::Value,
    device_id: Option<String>,
    is_normal: bool,
    alert_triggered: bool,
    created_at: DateTime<Utc>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            id: row.id,
            subject_id: row.subject_id,
            heart_rate: row.heart_rate,
            rhythm: row.rhythm,
            waveform: row.waveform,
            device_id: row.device_id,
            is_normal: row.is_normal,
            alert_triggered: row.alert_triggered,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HealthAlertRow {
    id: Uuid,
    reading_id: Option<Uuid>,
    subject_id: Uuid,
    alert_type: String,
    severity: String,
    message: String,
    is_resolved: bool,
    resolved_by: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HealthAlertRow> for HealthAlert {
    type Error = Error;

    fn try_from(row: HealthAlertRow) -> Result<Self> {
        Ok(HealthAlert {
            id: row.id,
            reading_id: row.reading_id,
            subject_id: row.subject_id,
            alert_type: row.alert_type.parse()?,
            severity: row.severity.parse()?,
            message: row.message,
            is_resolved: row.is_resolved,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertSettingsRow {
    subject_id: Uuid,
    high_heart_rate_threshold: i32,
    low_heart_rate_threshold: i32,
    enable_rhythm_alerts: bool,
    enable_whatsapp_alerts: bool,
    enable_sms_alerts: bool,
    updated_at: DateTime<Utc>,
}

impl From<AlertSettingsRow> for AlertSettings {
    fn from(row: AlertSettingsRow) -> Self {
        AlertSettings {
            subject_id: row.subject_id,
            high_heart_rate_threshold: row.high_heart_rate_threshold,
            low_heart_rate_threshold: row.low_heart_rate_threshold,
            enable_rhythm_alerts: row.enable_rhythm_alerts,
            enable_whatsapp_alerts: row.enable_whatsapp_alerts,
            enable_sms_alerts: row.enable_sms_alerts,
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    id: Uuid,
    display_name: String,
    phone_number: Option<String>,
    observer_id: Option<Uuid>,
}

impl From<SubjectRow> for Subject {
    fn from(row: SubjectRow) -> Self {
        Subject {
            id: row.id,
            display_name: row.display_name,
            phone_number: row.phone_number,
            observer_id: row.observer_id,
        }
    }
}
