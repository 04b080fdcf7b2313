//! PostgreSQL ledger store
//!
//! Statuses are stored as their canonical TEXT form and re-normalized through
//! `FromStr` on the way out, so the database never grows status spellings the
//! domain does not know. Monetary amounts are BIGINT minor units.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use core_kernel::{
    AccountId, AuditEventId, CustomerId, IntegrationId, InvoiceId, IssueId, JobId, Money,
    PaymentId,
};
use domain_ledger::{
    AccountIntegration, AuditEvent, BillingIssue, Invoice, InvoiceStatus, IssueOutcome,
    LedgerError, LedgerStore, LineItem, Payment,
};

/// PostgreSQL implementation of [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Creates a store over an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations
    pub async fn migrate(pool: &PgPool) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| LedgerError::storage(e.to_string()))
    }
}

fn db(e: sqlx::Error) -> LedgerError {
    LedgerError::storage(e.to_string())
}

fn get<'r, T>(row: &'r PgRow, col: &str) -> Result<T, LedgerError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(col)
        .map_err(|e| LedgerError::storage(format!("column {}: {}", col, e)))
}

fn row_to_invoice(row: &PgRow) -> Result<Invoice, LedgerError> {
    let currency = get::<String>(row, "currency")?.parse()?;
    Ok(Invoice {
        id: InvoiceId::from_uuid(get(row, "invoice_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        job_id: get::<Option<Uuid>>(row, "job_id")?.map(JobId::from_uuid),
        customer_id: get::<Option<Uuid>>(row, "customer_id")?.map(CustomerId::from_uuid),
        subtotal: Money::from_minor(get(row, "subtotal_minor")?, currency),
        tax: Money::from_minor(get(row, "tax_minor")?, currency),
        total: Money::from_minor(get(row, "total_minor")?, currency),
        status: get::<String>(row, "status")?.parse()?,
        due_date: get::<NaiveDate>(row, "due_date")?,
        paid_at: get::<Option<DateTime<Utc>>>(row, "paid_at")?,
        external_id: get::<Option<String>>(row, "external_id")?,
        last_synced_at: get::<Option<DateTime<Utc>>>(row, "last_synced_at")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn row_to_line_item(row: &PgRow) -> Result<LineItem, LedgerError> {
    let currency = get::<String>(row, "currency")?.parse()?;
    let classification = get::<Option<String>>(row, "classification")?
        .map(|c| c.parse())
        .transpose()?;
    Ok(LineItem {
        id: get(row, "line_item_id")?,
        invoice_id: InvoiceId::from_uuid(get(row, "invoice_id")?),
        description: get(row, "description")?,
        quantity: get::<Decimal>(row, "quantity")?,
        unit_price: Money::from_minor(get(row, "unit_price_minor")?, currency),
        amount: Money::from_minor(get(row, "amount_minor")?, currency),
        classification,
    })
}

fn row_to_payment(row: &PgRow) -> Result<Payment, LedgerError> {
    let currency = get::<String>(row, "currency")?.parse()?;
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "payment_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        invoice_id: get::<Option<Uuid>>(row, "invoice_id")?.map(InvoiceId::from_uuid),
        amount: Money::from_minor(get(row, "amount_minor")?, currency),
        method: get::<String>(row, "method")?.parse()?,
        status: get::<String>(row, "status")?.parse()?,
        occurred_at: get(row, "occurred_at")?,
        external_id: get::<Option<String>>(row, "external_id")?,
        created_at: get(row, "created_at")?,
    })
}

fn row_to_issue(row: &PgRow) -> Result<BillingIssue, LedgerError> {
    Ok(BillingIssue {
        id: IssueId::from_uuid(get(row, "issue_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        invoice_id: get::<Option<Uuid>>(row, "invoice_id")?.map(InvoiceId::from_uuid),
        issue_type: get::<String>(row, "issue_type")?.parse()?,
        severity: get::<String>(row, "severity")?.parse()?,
        status: get::<String>(row, "status")?.parse()?,
        summary: get(row, "summary")?,
        detail: get(row, "detail")?,
        resolved_at: get::<Option<DateTime<Utc>>>(row, "resolved_at")?,
        created_at: get(row, "created_at")?,
    })
}

fn row_to_integration(row: &PgRow) -> Result<AccountIntegration, LedgerError> {
    Ok(AccountIntegration {
        id: IntegrationId::from_uuid(get(row, "integration_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        system: get(row, "system")?,
        access_token: get(row, "access_token")?,
        refresh_token: get(row, "refresh_token")?,
        token_expires_at: get(row, "token_expires_at")?,
        last_synced_at: get::<Option<DateTime<Utc>>>(row, "last_synced_at")?,
        status: get::<String>(row, "status")?.parse()?,
    })
}

fn row_to_audit(row: &PgRow) -> Result<AuditEvent, LedgerError> {
    Ok(AuditEvent {
        id: AuditEventId::from_uuid(get(row, "audit_event_id")?),
        account_id: AccountId::from_uuid(get(row, "account_id")?),
        action: get::<String>(row, "action")?.parse()?,
        entity_kind: get(row, "entity_kind")?,
        entity_id: get(row, "entity_id")?,
        detail: get(row, "detail")?,
        created_at: get(row, "created_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_invoice(
        &self,
        invoice: Invoice,
        items: Vec<LineItem>,
    ) -> Result<InvoiceId, LedgerError> {
        invoice.validate()?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        if let Some(job_id) = invoice.job_id {
            let existing =
                sqlx::query("SELECT invoice_id FROM invoices WHERE account_id = $1 AND job_id = $2")
                    .bind(*invoice.account_id.as_uuid())
                    .bind(*job_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db)?;
            if existing.is_some() {
                return Err(LedgerError::DuplicateJobInvoice(job_id));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, account_id, job_id, customer_id,
                subtotal_minor, tax_minor, total_minor, currency,
                status, due_date, paid_at, external_id, last_synced_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(*invoice.account_id.as_uuid())
        .bind(invoice.job_id.map(|j| *j.as_uuid()))
        .bind(invoice.customer_id.map(|c| *c.as_uuid()))
        .bind(invoice.subtotal.minor())
        .bind(invoice.tax.minor())
        .bind(invoice.total.minor())
        .bind(invoice.total.currency().code())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(invoice.external_id.as_deref())
        .bind(invoice.last_synced_at)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO line_items (
                    line_item_id, invoice_id, description, quantity,
                    unit_price_minor, amount_minor, currency, classification
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id)
            .bind(*item.invoice_id.as_uuid())
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price.minor())
            .bind(item.amount.minor())
            .bind(item.amount.currency().code())
            .bind(item.classification.map(|c| c.as_str()))
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(invoice.id)
    }

    async fn find_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, LedgerError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE account_id = $1 AND invoice_id = $2")
            .bind(*account_id.as_uuid())
            .bind(*invoice_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(row_to_invoice).transpose()
    }

    async fn find_invoice_by_job(
        &self,
        account_id: AccountId,
        job_id: JobId,
    ) -> Result<Option<Invoice>, LedgerError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE account_id = $1 AND job_id = $2")
            .bind(*account_id.as_uuid())
            .bind(*job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(row_to_invoice).transpose()
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), LedgerError> {
        invoice.validate()?;
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                subtotal_minor = $3, tax_minor = $4, total_minor = $5,
                status = $6, due_date = $7, paid_at = $8,
                external_id = $9, last_synced_at = $10, updated_at = $11
            WHERE account_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(*invoice.account_id.as_uuid())
        .bind(*invoice.id.as_uuid())
        .bind(invoice.subtotal.minor())
        .bind(invoice.tax.minor())
        .bind(invoice.total.minor())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(invoice.external_id.as_deref())
        .bind(invoice.last_synced_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("invoice", invoice.id));
        }
        Ok(())
    }

    async fn invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM invoices WHERE account_id = $1 ORDER BY created_at")
            .bind(*account_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(row_to_invoice).collect()
    }

    async fn invoices_in_status(
        &self,
        account_id: AccountId,
        statuses: &[InvoiceStatus],
    ) -> Result<Vec<Invoice>, LedgerError> {
        let status_strs: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(
            "SELECT * FROM invoices WHERE account_id = $1 AND status = ANY($2) ORDER BY created_at",
        )
        .bind(*account_id.as_uuid())
        .bind(&status_strs)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(row_to_invoice).collect()
    }

    async fn unsynced_invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM invoices
            WHERE account_id = $1 AND status <> 'DRAFT' AND external_id IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(*account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(row_to_invoice).collect()
    }

    async fn line_items(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LineItem>, LedgerError> {
        if self.find_invoice(account_id, invoice_id).await?.is_none() {
            return Err(LedgerError::not_found("invoice", invoice_id));
        }
        let rows = sqlx::query("SELECT * FROM line_items WHERE invoice_id = $1")
            .bind(*invoice_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(row_to_line_item).collect()
    }

    async fn create_payment(&self, payment: Payment) -> Result<PaymentId, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        if let Some(external_id) = &payment.external_id {
            let existing = sqlx::query(
                "SELECT payment_id FROM payments WHERE account_id = $1 AND external_id = $2",
            )
            .bind(*payment.account_id.as_uuid())
            .bind(external_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?;
            if existing.is_some() {
                return Err(LedgerError::DuplicateExternalPayment(external_id.clone()));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, account_id, invoice_id, amount_minor, currency,
                method, status, occurred_at, external_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(*payment.account_id.as_uuid())
        .bind(payment.invoice_id.map(|i| *i.as_uuid()))
        .bind(payment.amount.minor())
        .bind(payment.amount.currency().code())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.occurred_at)
        .bind(payment.external_id.as_deref())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(payment.id)
    }

    async fn payments(&self, account_id: AccountId) -> Result<Vec<Payment>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM payments WHERE account_id = $1 ORDER BY created_at")
            .bind(*account_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(row_to_payment).collect()
    }

    async fn payments_for_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, LedgerError> {
        let rows = sqlx::query(
            "SELECT * FROM payments WHERE account_id = $1 AND invoice_id = $2 ORDER BY created_at",
        )
        .bind(*account_id.as_uuid())
        .bind(*invoice_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(row_to_payment).collect()
    }

    async fn open_issue(&self, issue: BillingIssue) -> Result<IssueOutcome, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let existing = sqlx::query(
            r#"
            SELECT issue_id FROM billing_issues
            WHERE account_id = $1 AND status = 'OPEN'
              AND issue_type = $2 AND summary = $3
              AND invoice_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(*issue.account_id.as_uuid())
        .bind(issue.issue_type.as_str())
        .bind(&issue.summary)
        .bind(issue.invoice_id.map(|i| *i.as_uuid()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;

        if let Some(row) = existing {
            let id: Uuid = get(&row, "issue_id")?;
            return Ok(IssueOutcome::AlreadyOpen(IssueId::from_uuid(id)));
        }

        sqlx::query(
            r#"
            INSERT INTO billing_issues (
                issue_id, account_id, invoice_id, issue_type, severity,
                status, summary, detail, resolved_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*issue.id.as_uuid())
        .bind(*issue.account_id.as_uuid())
        .bind(issue.invoice_id.map(|i| *i.as_uuid()))
        .bind(issue.issue_type.as_str())
        .bind(issue.severity.as_str())
        .bind(issue.status.as_str())
        .bind(&issue.summary)
        .bind(&issue.detail)
        .bind(issue.resolved_at)
        .bind(issue.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(IssueOutcome::Created(issue.id))
    }

    async fn open_issues(&self, account_id: AccountId) -> Result<Vec<BillingIssue>, LedgerError> {
        let rows = sqlx::query(
            "SELECT * FROM billing_issues WHERE account_id = $1 AND status = 'OPEN' ORDER BY created_at",
        )
        .bind(*account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(row_to_issue).collect()
    }

    async fn resolve_issue(
        &self,
        account_id: AccountId,
        issue_id: IssueId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE billing_issues SET status = 'RESOLVED', resolved_at = $3
            WHERE account_id = $1 AND issue_id = $2 AND status = 'OPEN'
            "#,
        )
        .bind(*account_id.as_uuid())
        .bind(*issue_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("billing issue", issue_id));
        }
        Ok(())
    }

    async fn integration(
        &self,
        account_id: AccountId,
        system: &str,
    ) -> Result<Option<AccountIntegration>, LedgerError> {
        let row = sqlx::query(
            "SELECT * FROM account_integrations WHERE account_id = $1 AND system = $2",
        )
        .bind(*account_id.as_uuid())
        .bind(system)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(row_to_integration).transpose()
    }

    async fn upsert_integration(
        &self,
        integration: &AccountIntegration,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO account_integrations (
                integration_id, account_id, system, access_token, refresh_token,
                token_expires_at, last_synced_at, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (account_id, system) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                token_expires_at = EXCLUDED.token_expires_at,
                last_synced_at = EXCLUDED.last_synced_at,
                status = EXCLUDED.status
            "#,
        )
        .bind(*integration.id.as_uuid())
        .bind(*integration.account_id.as_uuid())
        .bind(&integration.system)
        .bind(&integration.access_token)
        .bind(&integration.refresh_token)
        .bind(integration.token_expires_at)
        .bind(integration.last_synced_at)
        .bind(integration.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                audit_event_id, account_id, action, entity_kind, entity_id,
                detail, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*event.id.as_uuid())
        .bind(*event.account_id.as_uuid())
        .bind(event.action.as_str())
        .bind(&event.entity_kind)
        .bind(&event.entity_id)
        .bind(&event.detail)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn audit_events(&self, account_id: AccountId) -> Result<Vec<AuditEvent>, LedgerError> {
        let rows =
            sqlx::query("SELECT * FROM audit_events WHERE account_id = $1 ORDER BY created_at")
                .bind(*account_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        rows.iter().map(row_to_audit).collect()
    }
}
