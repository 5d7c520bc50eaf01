pub mod models;

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, Snapshot};
use crate::error::BotError;
use models::{
    AuditLogEntry, Company, Complaint, ComplaintStatus, PaymentMethod, Request, RequestStats,
    RequestStatus, RequestType, Role, User,
};

/// Draft of a request as collected by the conversation flow, ready to be
/// committed. The client token was minted when the user entered the
/// confirmation step and stays stable across confirm retries.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub user_id: i64,
    pub company_id: i64,
    pub payment_method_id: i64,
    pub request_type: RequestType,
    pub amount: Decimal,
    pub currency: String,
    pub reference: Option<String>,
    pub destination: Option<String>,
    pub client_token: Uuid,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // Each CREATE TABLE must be a separate query (Postgres doesn't allow
        // multiple commands in a single prepared statement).

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                telegram_id BIGINT NOT NULL UNIQUE,
                customer_code TEXT NOT NULL UNIQUE,
                name TEXT,
                phone TEXT,
                language TEXT NOT NULL DEFAULT 'ar',
                currency TEXT NOT NULL DEFAULT 'SAR',
                is_registered BOOLEAN NOT NULL DEFAULT FALSE,
                is_admin BOOLEAN NOT NULL DEFAULT FALSE,
                is_temporary_admin BOOLEAN NOT NULL DEFAULT FALSE,
                is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS companies (
                id BIGSERIAL PRIMARY KEY,
                name_ar TEXT NOT NULL,
                name_en TEXT NOT NULL,
                default_currency TEXT NOT NULL DEFAULT 'SAR',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                metadata JSONB,
                withdraw_source TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS payment_methods (
                id BIGSERIAL PRIMARY KEY,
                company_id BIGINT NOT NULL REFERENCES companies(id),
                name_ar TEXT NOT NULL,
                name_en TEXT NOT NULL,
                kind TEXT NOT NULL,
                fields_schema JSONB,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS requests (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id),
                company_id BIGINT NOT NULL REFERENCES companies(id),
                payment_method_id BIGINT NOT NULL REFERENCES payment_methods(id),
                request_type TEXT NOT NULL,
                amount NUMERIC(15, 2) NOT NULL CHECK (amount > 0),
                currency TEXT NOT NULL,
                reference TEXT,
                destination TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                admin_notes TEXT,
                approved_by BIGINT REFERENCES users(id),
                client_token UUID NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS complaints (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id),
                text TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                admin_reply TEXT,
                resolved_by BIGINT REFERENCES users(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS roles (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                permissions JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS admin_roles (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id),
                role_id BIGINT NOT NULL REFERENCES roles(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (user_id, role_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS audit_log (
                id BIGSERIAL PRIMARY KEY,
                actor_user_id BIGINT NOT NULL REFERENCES users(id),
                action TEXT NOT NULL,
                entity TEXT NOT NULL,
                entity_id BIGINT,
                before JSONB,
                after JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_complaints_status ON complaints(status, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity, entity_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── User Operations ────────────────────────────────────────────

    pub async fn get_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, BotError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, BotError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// First contact creates a guest record with a freshly minted customer
    /// code. The code is immutable once assigned; a collision on the random
    /// digits retries with a new code.
    pub async fn get_or_create_user(
        &self,
        telegram_id: i64,
        full_name: Option<&str>,
        code_prefix: &str,
        default_language: &str,
        default_currency: &str,
    ) -> Result<User, BotError> {
        if let Some(user) = self.get_user_by_telegram_id(telegram_id).await? {
            return Ok(user);
        }

        loop {
            let code = mint_customer_code(code_prefix);
            let inserted = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (telegram_id, customer_code, name, language, currency)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (telegram_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(telegram_id)
            .bind(&code)
            .bind(full_name)
            .bind(default_language)
            .bind(default_currency)
            .fetch_optional(&self.pool)
            .await;

            match inserted {
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {
                    // Lost a race with another event for the same user.
                    if let Some(user) = self.get_user_by_telegram_id(telegram_id).await? {
                        return Ok(user);
                    }
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(code, "customer code collision, reminting");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Flips the registration flag and stores the collected name and phone.
    /// Audited as a self-action in the same transaction.
    pub async fn complete_registration(
        &self,
        telegram_id: i64,
        name: &str,
        phone: &str,
    ) -> Result<User, BotError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, phone = $3, is_registered = TRUE, updated_at = NOW()
            WHERE telegram_id = $1
            RETURNING *
            "#,
        )
        .bind(telegram_id)
        .bind(name)
        .bind(phone)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BotError::NotFound("user"))?;

        audit::record(
            &mut tx,
            user.id,
            "register",
            "user",
            Some(user.id),
            Some(Snapshot::new().field("is_registered", false)),
            Some(Snapshot::new().field("is_registered", true)),
        )
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn set_language(&self, user: &User, language: &str) -> Result<User, BotError> {
        self.update_preference(user, "language", &user.language, language)
            .await
    }

    pub async fn set_currency(&self, user: &User, currency: &str) -> Result<User, BotError> {
        self.update_preference(user, "currency", &user.currency, currency)
            .await
    }

    async fn update_preference(
        &self,
        user: &User,
        column: &str,
        old: &str,
        new: &str,
    ) -> Result<User, BotError> {
        let mut tx = self.pool.begin().await?;

        // `column` is one of two hardcoded names, never user input.
        let updated = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET {column} = $2, updated_at = NOW() WHERE id = $1 RETURNING *"
        ))
        .bind(user.id)
        .bind(new)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user.id,
            &format!("change_{column}"),
            "user",
            Some(user.id),
            Some(Snapshot::new().field(column, old)),
            Some(Snapshot::new().field(column, new)),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Sets the admin flags on the target, audited with before/after flags.
    /// Callers are responsible for the super-admin permission gate.
    pub async fn set_admin_flags(
        &self,
        actor_user_id: i64,
        target: &User,
        is_admin: bool,
        is_temporary: bool,
        action: &str,
    ) -> Result<User, BotError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_admin = $2, is_temporary_admin = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(target.id)
        .bind(is_admin)
        .bind(is_temporary)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor_user_id,
            action,
            "user",
            Some(target.id),
            Some(
                Snapshot::new()
                    .field("is_admin", target.is_admin)
                    .field("is_temporary_admin", target.is_temporary_admin),
            ),
            Some(
                Snapshot::new()
                    .field("is_admin", is_admin)
                    .field("is_temporary_admin", is_temporary),
            ),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn registered_user_ids(&self) -> Result<Vec<i64>, BotError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT telegram_id FROM users WHERE is_registered = TRUE AND is_blocked = FALSE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // ── Company / Payment Method Operations ────────────────────────

    pub async fn list_active_companies(&self) -> Result<Vec<Company>, BotError> {
        let companies = sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    /// Creates an active company, audited to the acting admin.
    pub async fn create_company(
        &self,
        actor_user_id: i64,
        name_ar: &str,
        name_en: &str,
        default_currency: &str,
    ) -> Result<Company, BotError> {
        let mut tx = self.pool.begin().await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name_ar, name_en, default_currency)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name_ar)
        .bind(name_en)
        .bind(default_currency)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor_user_id,
            "create_company",
            "company",
            Some(company.id),
            None,
            Some(
                Snapshot::new()
                    .field("name_en", name_en)
                    .field("default_currency", default_currency)
                    .field("is_active", true),
            ),
        )
        .await?;

        tx.commit().await?;
        Ok(company)
    }

    pub async fn create_payment_method(
        &self,
        actor_user_id: i64,
        company_id: i64,
        name_ar: &str,
        name_en: &str,
        kind: &str,
    ) -> Result<PaymentMethod, BotError> {
        let mut tx = self.pool.begin().await?;

        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            INSERT INTO payment_methods (company_id, name_ar, name_en, kind)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(name_ar)
        .bind(name_en)
        .bind(kind)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor_user_id,
            "create_payment_method",
            "payment_method",
            Some(method.id),
            None,
            Some(
                Snapshot::new()
                    .field("company_id", company_id)
                    .field("name_en", name_en)
                    .field("kind", kind),
            ),
        )
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    pub async fn get_active_company(&self, id: i64) -> Result<Option<Company>, BotError> {
        let company = sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    pub async fn active_payment_methods(
        &self,
        company_id: i64,
    ) -> Result<Vec<PaymentMethod>, BotError> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            "SELECT * FROM payment_methods WHERE company_id = $1 AND is_active = TRUE ORDER BY id",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }

    pub async fn get_active_payment_method(
        &self,
        id: i64,
        company_id: i64,
    ) -> Result<Option<PaymentMethod>, BotError> {
        let method = sqlx::query_as::<_, PaymentMethod>(
            "SELECT * FROM payment_methods WHERE id = $1 AND company_id = $2 AND is_active = TRUE",
        )
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(method)
    }

    // ── Request Operations ─────────────────────────────────────────

    /// Commits a collected draft. The insert and its audit row share one
    /// transaction; a replayed client token returns the already persisted
    /// request without a second insert or audit entry.
    ///
    /// The boolean is true when this call actually created the row.
    pub async fn create_request_idempotent(
        &self,
        new: &NewRequest,
    ) -> Result<(Request, bool), BotError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Request>(
            r#"
            INSERT INTO requests
                (user_id, company_id, payment_method_id, request_type, amount,
                 currency, reference, destination, client_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (client_token) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.company_id)
        .bind(new.payment_method_id)
        .bind(new.request_type)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(new.reference.as_deref())
        .bind(new.destination.as_deref())
        .bind(new.client_token)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(request) => {
                audit::record(
                    &mut tx,
                    new.user_id,
                    "create_request",
                    "request",
                    Some(request.id),
                    None,
                    Some(
                        Snapshot::new()
                            .field("status", "pending")
                            .field("request_type", new.request_type.as_str())
                            .field("amount", new.amount.to_string()),
                    ),
                )
                .await?;
                tx.commit().await?;
                Ok((request, true))
            }
            None => {
                // Duplicate confirm tap: the token already maps to a row.
                tx.rollback().await?;
                let existing = sqlx::query_as::<_, Request>(
                    "SELECT * FROM requests WHERE client_token = $1",
                )
                .bind(new.client_token)
                .fetch_one(&self.pool)
                .await?;
                Ok((existing, false))
            }
        }
    }

    pub async fn get_request(&self, id: i64) -> Result<Option<Request>, BotError> {
        let request = sqlx::query_as::<_, Request>("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    pub async fn list_pending_requests(&self, limit: i64) -> Result<Vec<Request>, BotError> {
        let requests = sqlx::query_as::<_, Request>(
            "SELECT * FROM requests WHERE status = 'pending' ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// One-way decision on a pending request. The row is locked for the
    /// duration of the transaction; a second decide attempt on a terminal
    /// record fails with `InvalidTransition` and writes nothing.
    pub async fn decide_request(
        &self,
        actor_user_id: i64,
        request_id: i64,
        outcome: RequestStatus,
        notes: Option<&str>,
    ) -> Result<Request, BotError> {
        debug_assert!(outcome.is_terminal());

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Request>(
            "SELECT * FROM requests WHERE id = $1 FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BotError::NotFound("request"))?;

        ensure_request_pending(current.status)?;

        let updated = sqlx::query_as::<_, Request>(
            r#"
            UPDATE requests
            SET status = $2, approved_by = $3, admin_notes = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(outcome)
        .bind(actor_user_id)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;

        let action = match outcome {
            RequestStatus::Approved => "approve_request",
            _ => "reject_request",
        };
        audit::record(
            &mut tx,
            actor_user_id,
            action,
            "request",
            Some(request_id),
            Some(Snapshot::new().field("status", "pending")),
            Some(
                Snapshot::new()
                    .field("status", outcome.as_str())
                    .field("approved_by", actor_user_id),
            ),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // ── Complaint Operations ───────────────────────────────────────

    pub async fn create_complaint(
        &self,
        user_id: i64,
        text: &str,
    ) -> Result<Complaint, BotError> {
        let mut tx = self.pool.begin().await?;

        let complaint = sqlx::query_as::<_, Complaint>(
            "INSERT INTO complaints (user_id, text) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(text)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            user_id,
            "create_complaint",
            "complaint",
            Some(complaint.id),
            None,
            Some(Snapshot::new().field("status", "pending")),
        )
        .await?;

        tx.commit().await?;
        Ok(complaint)
    }

    pub async fn list_pending_complaints(&self, limit: i64) -> Result<Vec<Complaint>, BotError> {
        let complaints = sqlx::query_as::<_, Complaint>(
            "SELECT * FROM complaints WHERE status = 'pending' ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(complaints)
    }

    pub async fn resolve_complaint(
        &self,
        actor_user_id: i64,
        complaint_id: i64,
        reply: &str,
    ) -> Result<Complaint, BotError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Complaint>(
            "SELECT * FROM complaints WHERE id = $1 FOR UPDATE",
        )
        .bind(complaint_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BotError::NotFound("complaint"))?;

        ensure_complaint_pending(current.status)?;

        let updated = sqlx::query_as::<_, Complaint>(
            r#"
            UPDATE complaints
            SET status = 'resolved', admin_reply = $2, resolved_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(complaint_id)
        .bind(reply)
        .bind(actor_user_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor_user_id,
            "resolve_complaint",
            "complaint",
            Some(complaint_id),
            Some(Snapshot::new().field("status", "pending")),
            Some(
                Snapshot::new()
                    .field("status", "resolved")
                    .field("resolved_by", actor_user_id),
            ),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // ── Role Operations ────────────────────────────────────────────

    pub async fn roles_of_user(&self, user_id: i64) -> Result<Vec<Role>, BotError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            JOIN admin_roles ar ON ar.role_id = r.id
            WHERE ar.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn create_role(
        &self,
        name: &str,
        permission_tags: &serde_json::Value,
    ) -> Result<Role, BotError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, permissions) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET permissions = EXCLUDED.permissions
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(permission_tags)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, BotError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    pub async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO admin_roles (user_id, role_id) VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_roles(&self) -> Result<i64, BotError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ── Audit / Statistics Operations ──────────────────────────────

    pub async fn audit_trail(
        &self,
        entity: &str,
        entity_id: i64,
    ) -> Result<Vec<AuditLogEntry>, BotError> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM audit_log WHERE entity = $1 AND entity_id = $2 ORDER BY created_at",
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn count_pending_requests(&self) -> Result<i64, BotError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM requests WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    pub async fn count_pending_complaints(&self) -> Result<i64, BotError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM complaints WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    pub async fn request_stats(&self) -> Result<RequestStats, BotError> {
        let counts: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'approved'),
                COUNT(*) FILTER (WHERE status = 'rejected')
            FROM requests
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let sums: (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE request_type = 'deposit' AND status = 'approved'), 0),
                COALESCE(SUM(amount) FILTER (WHERE request_type = 'withdraw' AND status = 'approved'), 0)
            FROM requests
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RequestStats {
            pending: counts.0,
            approved: counts.1,
            rejected: counts.2,
            deposit_total: sums.0,
            withdraw_total: sums.1,
        })
    }
}

/// Requests move pending to approved/rejected exactly once; a record that
/// already reached a terminal status cannot be decided again.
fn ensure_request_pending(status: RequestStatus) -> Result<(), BotError> {
    if status.is_terminal() {
        return Err(BotError::InvalidTransition(status.as_str().to_string()));
    }
    Ok(())
}

fn ensure_complaint_pending(status: ComplaintStatus) -> Result<(), BotError> {
    if status == ComplaintStatus::Resolved {
        return Err(BotError::InvalidTransition(status.as_str().to_string()));
    }
    Ok(())
}

fn mint_customer_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..6).map(|_| rng.gen_range(0..10).to_string()).collect();
    format!("{prefix}{digits}")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_code_has_prefix_and_six_digits() {
        let code = mint_customer_code("C2025");
        assert!(code.starts_with("C2025"));
        let digits = &code["C2025".len()..];
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn deciding_a_terminal_request_is_rejected() {
        assert!(ensure_request_pending(RequestStatus::Pending).is_ok());
        assert!(matches!(
            ensure_request_pending(RequestStatus::Approved),
            Err(BotError::InvalidTransition(s)) if s == "approved"
        ));
        assert!(matches!(
            ensure_request_pending(RequestStatus::Rejected),
            Err(BotError::InvalidTransition(s)) if s == "rejected"
        ));
    }

    #[test]
    fn resolving_a_resolved_complaint_is_rejected() {
        assert!(ensure_complaint_pending(ComplaintStatus::Pending).is_ok());
        assert!(matches!(
            ensure_complaint_pending(ComplaintStatus::Resolved),
            Err(BotError::InvalidTransition(s)) if s == "resolved"
        ));
    }
}
