use casefile_core::models::DocumentReference;
use casefile_core::AppError;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::Page;

/// Trait for permanent document metadata operations
#[async_trait::async_trait]
pub trait DocumentReferenceRepositoryTrait: Send + Sync {
    /// Insert or overwrite the row with the same id. Rows are written with
    /// `uploaded = false` until the whole set is committed.
    async fn put(&self, reference: &DocumentReference) -> Result<(), AppError>;

    /// Flip `uploaded` to true for every id; returns the number of rows updated.
    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<u64, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentReference>, AppError>;

    /// Keyset-paginated scan of one patient's documents, ordered by id.
    async fn list_for_patient(
        &self,
        nhs_number: &str,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Page<DocumentReference, Uuid>, AppError>;
}

#[derive(sqlx::FromRow)]
struct DocumentReferenceRow {
    id: Uuid,
    nhs_number: String,
    file_name: String,
    bucket: String,
    object_key: String,
    content_type: String,
    current_gp_ods: String,
    uploader_ods: String,
    scan_date: String,
    virus_scanner_result: String,
    uploaded: bool,
    created_at: DateTime<Utc>,
}

impl DocumentReferenceRow {
    fn to_document_reference(self) -> DocumentReference {
        DocumentReference {
            id: self.id,
            nhs_number: self.nhs_number,
            file_name: self.file_name,
            bucket: self.bucket,
            key: self.object_key,
            content_type: self.content_type,
            current_gp_ods: self.current_gp_ods,
            uploader_ods: self.uploader_ods,
            scan_date: self.scan_date,
            virus_scanner_result: self.virus_scanner_result,
            uploaded: self.uploaded,
            created_at: self.created_at,
        }
    }
}

/// Repository for the `document_references` table
#[derive(Clone)]
pub struct DocumentReferenceRepository {
    pool: PgPool,
}

impl DocumentReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentReferenceRepositoryTrait for DocumentReferenceRepository {
    #[tracing::instrument(skip(self, reference), fields(
        db.table = "document_references",
        db.operation = "upsert",
        db.record_id = %reference.id
    ))]
    async fn put(&self, reference: &DocumentReference) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO document_references (
                id, nhs_number, file_name, bucket, object_key, content_type,
                current_gp_ods, uploader_ods, scan_date, virus_scanner_result,
                uploaded, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                bucket = EXCLUDED.bucket,
                object_key = EXCLUDED.object_key,
                content_type = EXCLUDED.content_type,
                current_gp_ods = EXCLUDED.current_gp_ods,
                uploader_ods = EXCLUDED.uploader_ods,
                scan_date = EXCLUDED.scan_date,
                virus_scanner_result = EXCLUDED.virus_scanner_result,
                uploaded = EXCLUDED.uploaded,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(reference.id)
        .bind(&reference.nhs_number)
        .bind(&reference.file_name)
        .bind(&reference.bucket)
        .bind(&reference.key)
        .bind(&reference.content_type)
        .bind(&reference.current_gp_ods)
        .bind(&reference.uploader_ods)
        .bind(&reference.scan_date)
        .bind(&reference.virus_scanner_result)
        .bind(reference.uploaded)
        .bind(reference.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                error = ?e,
                nhs_number = %reference.nhs_number,
                "Failed to write document reference"
            );
            e
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(
        db.table = "document_references",
        db.operation = "update",
        db.rows = ids.len()
    ))]
    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE document_references SET uploaded = TRUE WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_references", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM document_references WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_references", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentReference>, AppError> {
        let row = sqlx::query_as::<Postgres, DocumentReferenceRow>(
            r#"
            SELECT id, nhs_number, file_name, bucket, object_key, content_type,
                   current_gp_ods, uploader_ods, scan_date, virus_scanner_result,
                   uploaded, created_at
            FROM document_references
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DocumentReferenceRow::to_document_reference))
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_references", db.operation = "select"))]
    async fn list_for_patient(
        &self,
        nhs_number: &str,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Page<DocumentReference, Uuid>, AppError> {
        let rows = sqlx::query_as::<Postgres, DocumentReferenceRow>(
            r#"
            SELECT id, nhs_number, file_name, bucket, object_key, content_type,
                   current_gp_ods, uploader_ods, scan_date, virus_scanner_result,
                   uploaded, created_at
            FROM document_references
            WHERE nhs_number = $1 AND ($2::uuid IS NULL OR id > $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(nhs_number)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<DocumentReference> = rows
            .into_iter()
            .map(DocumentReferenceRow::to_document_reference)
            .collect();
        let next = if items.len() as i64 == limit {
            items.last().map(|r| r.id)
        } else {
            None
        };

        Ok(Page { items, next })
    }
}
