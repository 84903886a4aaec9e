// gateway-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Governance Store
// Description: GovernanceStore backed by SQLite WAL.
// Purpose: Persist policies, decisions, audit entries, adapters, traces,
// and tool authorizations with deterministic serialization.
// Dependencies: gateway-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each durable record is stored as a canonical JSON blob; indexed columns
//! (tenant, workspace, status, precedence, …) are derived from the blob at
//! write time purely to support the store's own query patterns. Loads
//! deserialize the blob directly — the columns are never the source of
//! truth. Security posture: database contents are untrusted input on
//! read, same as any external store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use gateway_core::hashing::hash_stable_json;
use gateway_core::hashing::stable_json_bytes;
use gateway_core::hashing::DEFAULT_HASH_ALGORITHM;
use gateway_core::ids::AdapterId;
use gateway_core::ids::DecisionId;
use gateway_core::ids::ExecutionId;
use gateway_core::ids::PolicyId;
use gateway_core::ids::TenantId;
use gateway_core::ids::TraceId;
use gateway_core::model::Adapter;
use gateway_core::model::AdapterRegistration;
use gateway_core::model::AuditChainEntry;
use gateway_core::model::AuditChainHashInput;
use gateway_core::model::AuditEntry;
use gateway_core::model::DecisionStatus;
use gateway_core::model::ExecutionDecisionRecord;
use gateway_core::model::GrantedScope;
use gateway_core::model::Policy;
use gateway_core::model::Resolution;
use gateway_core::model::Trace;
use gateway_core::model::ToolAuthorization;
use gateway_core::store::AuditFilter;
use gateway_core::store::GovernanceStore;
use gateway_core::store::PolicyFilter;
use gateway_core::StoreError;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the SQLite governance store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
}

/// Returns the default busy timeout for SQLite connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::Corrupt(message) => Self::Backend(format!("corrupt: {message}")),
            SqliteStoreError::VersionMismatch(message) => Self::Backend(format!("version mismatch: {message}")),
            SqliteStoreError::Invalid(message) => Self::Serialization(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed governance store with WAL support.
pub struct SqliteGovernanceStore {
    /// Guarded connection; `rusqlite::Connection` is `Send` but not
    /// `Sync`, so a mutex is required to share it across request handlers.
    connection: Mutex<Connection>,
}

impl SqliteGovernanceStore {
    /// Opens a SQLite-backed governance store, creating the schema on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Locks the underlying connection, mapping poisoning to a backend
    /// error rather than panicking.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("store mutex poisoned".to_string()))
    }
}

/// Ensures the parent directory for the store file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths against length and component-size limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    Ok(())
}

/// Opens a `SQLite` connection with WAL journaling and a busy timeout.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates the schema on first use, or validates the stored version
/// matches [`SCHEMA_VERSION`] on subsequent opens.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS policies (
                    tenant_id TEXT NOT NULL,
                    policy_id TEXT NOT NULL,
                    workspace_id TEXT,
                    environment TEXT,
                    precedence INTEGER NOT NULL,
                    enabled INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    policy_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, policy_id)
                );
                CREATE INDEX IF NOT EXISTS idx_policies_scope
                    ON policies (tenant_id, workspace_id, environment);
                CREATE TABLE IF NOT EXISTS adapter_registry (
                    tenant_id TEXT NOT NULL,
                    adapter_id TEXT NOT NULL,
                    adapter_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, adapter_id)
                );
                CREATE TABLE IF NOT EXISTS decisions (
                    tenant_id TEXT NOT NULL,
                    decision_id TEXT NOT NULL,
                    execution_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    fingerprint TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    decision_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, decision_id)
                );
                CREATE INDEX IF NOT EXISTS idx_decisions_execution
                    ON decisions (tenant_id, execution_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_decisions_fingerprint
                    ON decisions (tenant_id, fingerprint, status, created_at);
                CREATE TABLE IF NOT EXISTS tool_authorizations (
                    execution_id TEXT NOT NULL,
                    tool TEXT NOT NULL,
                    sequence INTEGER NOT NULL,
                    auth_json BLOB NOT NULL,
                    PRIMARY KEY (execution_id, tool, sequence)
                );
                CREATE TABLE IF NOT EXISTS audit_log (
                    tenant_id TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    execution_id TEXT,
                    entry_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, seq)
                );
                CREATE TABLE IF NOT EXISTS audit_chain (
                    tenant_id TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    prev_event_hash TEXT,
                    event_hash TEXT NOT NULL,
                    PRIMARY KEY (tenant_id, seq)
                );
                CREATE TABLE IF NOT EXISTS traces (
                    tenant_id TEXT NOT NULL,
                    trace_id TEXT NOT NULL,
                    execution_id TEXT NOT NULL,
                    trace_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, trace_id)
                );
                CREATE INDEX IF NOT EXISTS idx_traces_execution
                    ON traces (tenant_id, execution_id);
                CREATE TABLE IF NOT EXISTS trace_annotations (
                    tenant_id TEXT NOT NULL,
                    trace_id TEXT NOT NULL,
                    annotation_id TEXT NOT NULL,
                    annotation_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, trace_id, annotation_id)
                );
                CREATE TABLE IF NOT EXISTS tenant_budgets (
                    tenant_id TEXT PRIMARY KEY,
                    budget REAL NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Serialization Helpers
// ============================================================================

/// Encodes a record as its canonical JSON blob for storage.
fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SqliteStoreError> {
    stable_json_bytes(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Decodes a record from its stored JSON blob.
fn decode<T: for<'de> serde::Deserialize<'de>>(bytes: &[u8]) -> Result<T, SqliteStoreError> {
    serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Returns the indexed-column label for a decision status.
fn status_label(status: DecisionStatus) -> &'static str {
    match status {
        DecisionStatus::Pending => "pending",
        DecisionStatus::Approved => "approved",
        DecisionStatus::Denied => "denied",
        DecisionStatus::Expired => "expired",
    }
}

// ============================================================================
// SECTION: GovernanceStore Impl
// ============================================================================

impl GovernanceStore for SqliteGovernanceStore {
    fn upsert_policy(&self, policy: Policy, now_millis: i64) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let blob = encode(&policy)?;
        connection
            .execute(
                "INSERT INTO policies (
                    tenant_id, policy_id, workspace_id, environment, precedence, enabled, updated_at, policy_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(tenant_id, policy_id) DO UPDATE SET
                    workspace_id = excluded.workspace_id,
                    environment = excluded.environment,
                    precedence = excluded.precedence,
                    enabled = excluded.enabled,
                    updated_at = excluded.updated_at,
                    policy_json = excluded.policy_json",
                params![
                    policy.scope.tenant_id.as_str(),
                    policy.policy_id.as_str(),
                    policy.scope.workspace_id.as_ref().map(gateway_core::ids::WorkspaceId::as_str),
                    policy.scope.environment,
                    policy.precedence,
                    i64::from(policy.enabled),
                    now_millis,
                    blob,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn get_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<Option<Policy>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT policy_json FROM policies WHERE tenant_id = ?1 AND policy_id = ?2",
                params![tenant_id.as_str(), policy_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    fn list_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, StoreError> {
        let connection = self.lock()?;
        let Some(tenant_id) = &filter.tenant_id else {
            return Ok(Vec::new());
        };
        let mut statement = connection
            .prepare(
                "SELECT policy_json FROM policies
                 WHERE tenant_id = ?1
                   AND (?2 IS NULL OR workspace_id IS NULL OR workspace_id = ?2)
                   AND (?3 IS NULL OR environment IS NULL OR environment = ?3)
                   AND (?4 = 0 OR enabled = 1)
                 ORDER BY precedence DESC, updated_at DESC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(
                params![
                    tenant_id.as_str(),
                    filter.workspace_id.as_ref().map(gateway_core::ids::WorkspaceId::as_str),
                    filter.environment,
                    i64::from(filter.enabled_only),
                ],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut policies = Vec::new();
        for row in rows {
            let blob = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            policies.push(decode(&blob)?);
        }
        Ok(policies)
    }

    fn set_policy_enabled(
        &self,
        tenant_id: &TenantId,
        policy_id: &PolicyId,
        enabled: bool,
        now_millis: i64,
    ) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT policy_json FROM policies WHERE tenant_id = ?1 AND policy_id = ?2",
                params![tenant_id.as_str(), policy_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(blob) = blob else {
            return Err(StoreError::NotFound(format!("policy {policy_id} for tenant {tenant_id}")));
        };
        let mut policy: Policy = decode(&blob)?;
        policy.enabled = enabled;
        let new_blob = encode(&policy)?;
        connection
            .execute(
                "UPDATE policies SET enabled = ?1, updated_at = ?2, policy_json = ?3
                 WHERE tenant_id = ?4 AND policy_id = ?5",
                params![i64::from(enabled), now_millis, new_blob, tenant_id.as_str(), policy_id.as_str()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn delete_policy(&self, tenant_id: &TenantId, policy_id: &PolicyId) -> Result<(), StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "DELETE FROM policies WHERE tenant_id = ?1 AND policy_id = ?2",
                params![tenant_id.as_str(), policy_id.as_str()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn create_decision(&self, record: ExecutionDecisionRecord) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let blob = encode(&record)?;
        let result = connection.execute(
            "INSERT INTO decisions (
                tenant_id, decision_id, execution_id, status, fingerprint, created_at, updated_at, decision_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.tenant_id.as_str(),
                record.decision_id.as_str(),
                record.execution_id.as_str(),
                status_label(record.status),
                record.fingerprint,
                record.created_at,
                record.updated_at,
                blob,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                Err(StoreError::Conflict(format!("decision {} already exists", record.decision_id)))
            }
            Err(err) => Err(SqliteStoreError::Db(err.to_string()).into()),
        }
    }

    fn get_decision(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT decision_json FROM decisions WHERE tenant_id = ?1 AND decision_id = ?2",
                params![tenant_id.as_str(), decision_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    fn get_latest_decision_for_execution(
        &self,
        tenant_id: &TenantId,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT decision_json FROM decisions WHERE tenant_id = ?1 AND execution_id = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![tenant_id.as_str(), execution_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    fn find_pending_decision_by_fingerprint(
        &self,
        tenant_id: &TenantId,
        fingerprint: &str,
        not_before_millis: i64,
    ) -> Result<Option<ExecutionDecisionRecord>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT decision_json FROM decisions
                 WHERE tenant_id = ?1 AND fingerprint = ?2 AND status = 'pending' AND created_at >= ?3
                 ORDER BY created_at DESC LIMIT 1",
                params![tenant_id.as_str(), fingerprint, not_before_millis],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    #[expect(clippy::too_many_arguments, reason = "mirrors the trait's single atomic resolve operation")]
    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        expected: DecisionStatus,
        next: DecisionStatus,
        resolution: Option<Resolution>,
        granted_scope: Option<GrantedScope>,
        decision_token: Option<String>,
        decision_token_jti: Option<String>,
        now_millis: i64,
    ) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT decision_json FROM decisions WHERE tenant_id = ?1 AND decision_id = ?2",
                params![tenant_id.as_str(), decision_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(blob) = blob else {
            return Err(StoreError::NotFound(format!("decision {decision_id} for tenant {tenant_id}")));
        };
        let mut record: ExecutionDecisionRecord = decode(&blob)?;
        if record.status != expected {
            return Ok(false);
        }
        record.status = next;
        record.resolution = resolution;
        if granted_scope.is_some() {
            record.granted_scope = granted_scope;
        }
        if decision_token.is_some() {
            record.decision_token = decision_token;
            record.decision_token_jti = decision_token_jti;
        }
        record.updated_at = now_millis;
        let new_blob = encode(&record)?;
        connection
            .execute(
                "UPDATE decisions SET status = ?1, updated_at = ?2, decision_json = ?3
                 WHERE tenant_id = ?4 AND decision_id = ?5",
                params![status_label(next), now_millis, new_blob, tenant_id.as_str(), decision_id.as_str()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(true)
    }

    fn mark_decision_token_used(
        &self,
        tenant_id: &TenantId,
        decision_id: &DecisionId,
        jti: &str,
        now_millis: i64,
    ) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT decision_json FROM decisions WHERE tenant_id = ?1 AND decision_id = ?2",
                params![tenant_id.as_str(), decision_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(blob) = blob else {
            return Err(StoreError::NotFound(format!("decision {decision_id} for tenant {tenant_id}")));
        };
        let mut record: ExecutionDecisionRecord = decode(&blob)?;
        if record.decision_token_jti.as_deref() != Some(jti) || record.decision_token_used_at.is_some() {
            return Ok(false);
        }
        record.decision_token_used_at = Some(now_millis);
        let new_blob = encode(&record)?;
        connection
            .execute(
                "UPDATE decisions SET decision_json = ?1 WHERE tenant_id = ?2 AND decision_id = ?3",
                params![new_blob, tenant_id.as_str(), decision_id.as_str()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(true)
    }

    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditChainEntry, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let last_seq: Option<i64> = tx
            .query_row(
                "SELECT MAX(seq) FROM audit_chain WHERE tenant_id = ?1",
                params![entry.tenant_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let prev_event_hash: Option<String> = tx
            .query_row(
                "SELECT event_hash FROM audit_chain WHERE tenant_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![entry.tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let seq = last_seq.unwrap_or(0).saturating_add(1);
        let seq_u64 = u64::try_from(seq).unwrap_or(u64::MAX);
        let hash_input = AuditChainHashInput {
            tenant_id: &entry.tenant_id,
            seq: seq_u64,
            prev_event_hash: prev_event_hash.as_deref(),
            event_type: entry.event_type,
            event_data: &entry.event_data,
            created_at: entry.created_at,
        };
        let digest = hash_stable_json(DEFAULT_HASH_ALGORITHM, &hash_input)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let entry_blob = encode(&entry)?;
        tx.execute(
            "INSERT INTO audit_log (tenant_id, seq, execution_id, entry_json) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.tenant_id.as_str(),
                seq,
                entry.execution_id.as_ref().map(gateway_core::ids::ExecutionId::as_str),
                entry_blob,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO audit_chain (tenant_id, seq, prev_event_hash, event_hash) VALUES (?1, ?2, ?3, ?4)",
            params![entry.tenant_id.as_str(), seq, prev_event_hash, digest.value],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(AuditChainEntry {
            tenant_id: entry.tenant_id,
            seq: seq_u64,
            prev_event_hash,
            event_hash: digest.value,
        })
    }

    fn list_audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT entry_json FROM audit_log
                 WHERE tenant_id = ?1 AND (?2 IS NULL OR execution_id = ?2)
                 ORDER BY seq DESC LIMIT ?3",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let limit = filter.limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(
                params![
                    filter.tenant_id.as_str(),
                    filter.execution_id.as_ref().map(gateway_core::ids::ExecutionId::as_str),
                    limit,
                ],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut entries = Vec::new();
        for row in rows {
            let blob = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            entries.push(decode(&blob)?);
        }
        Ok(entries)
    }

    fn verify_audit_chain(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT prev_event_hash, event_hash FROM audit_chain WHERE tenant_id = ?1 ORDER BY seq ASC")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![tenant_id.as_str()], |row| {
                let prev: Option<String> = row.get(0)?;
                let hash: String = row.get(1)?;
                Ok((prev, hash))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut expected_prev: Option<String> = None;
        for row in rows {
            let (prev, hash) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if prev != expected_prev {
                return Ok(false);
            }
            expected_prev = Some(hash);
        }
        Ok(true)
    }

    fn insert_trace(&self, trace: Trace) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let blob = encode(&trace)?;
        connection
            .execute(
                "INSERT INTO traces (tenant_id, trace_id, execution_id, trace_json) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tenant_id, trace_id) DO UPDATE SET trace_json = excluded.trace_json",
                params![trace.tenant_id.as_str(), trace.trace_id.as_str(), trace.execution_id.as_str(), blob],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn get_trace(&self, tenant_id: &TenantId, trace_id: &TraceId) -> Result<Option<Trace>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT trace_json FROM traces WHERE tenant_id = ?1 AND trace_id = ?2",
                params![tenant_id.as_str(), trace_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    fn list_traces(&self, tenant_id: &TenantId, execution_id: Option<&ExecutionId>) -> Result<Vec<Trace>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT trace_json FROM traces WHERE tenant_id = ?1 AND (?2 IS NULL OR execution_id = ?2)",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![tenant_id.as_str(), execution_id.map(gateway_core::ids::ExecutionId::as_str)], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut traces = Vec::new();
        for row in rows {
            let blob = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            traces.push(decode(&blob)?);
        }
        Ok(traces)
    }

    fn upsert_adapter(
        &self,
        tenant_id: &TenantId,
        adapter_id: &AdapterId,
        registration: AdapterRegistration,
        now_millis: i64,
    ) -> Result<Adapter, StoreError> {
        let connection = self.lock()?;
        let existing: Option<Vec<u8>> = connection
            .query_row(
                "SELECT adapter_json FROM adapter_registry WHERE tenant_id = ?1 AND adapter_id = ?2",
                params![tenant_id.as_str(), adapter_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut adapter = match existing {
            Some(blob) => decode(&blob)?,
            None => Adapter {
                tenant_id: tenant_id.clone(),
                adapter_id: adapter_id.clone(),
                display_name: registration.display_name.clone(),
                risk_class: registration.risk_class,
                capabilities: registration.capabilities.clone(),
                version: registration.version.clone(),
                enabled: true,
                created_at: now_millis,
                updated_at: now_millis,
            },
        };
        adapter.re_register(registration, now_millis);
        let blob = encode(&adapter)?;
        connection
            .execute(
                "INSERT INTO adapter_registry (tenant_id, adapter_id, adapter_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(tenant_id, adapter_id) DO UPDATE SET adapter_json = excluded.adapter_json",
                params![tenant_id.as_str(), adapter_id.as_str(), blob],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(adapter)
    }

    fn get_adapter(&self, tenant_id: &TenantId, adapter_id: &AdapterId) -> Result<Option<Adapter>, StoreError> {
        let connection = self.lock()?;
        let blob: Option<Vec<u8>> = connection
            .query_row(
                "SELECT adapter_json FROM adapter_registry WHERE tenant_id = ?1 AND adapter_id = ?2",
                params![tenant_id.as_str(), adapter_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        blob.map(|bytes| decode(&bytes)).transpose().map_err(StoreError::from)
    }

    fn insert_tool_authorization(&self, auth: ToolAuthorization) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let blob = encode(&auth)?;
        connection
            .execute(
                "INSERT INTO tool_authorizations (execution_id, tool, sequence, auth_json) VALUES (?1, ?2, ?3, ?4)",
                params![auth.execution_id.as_str(), auth.tool, auth.sequence, blob],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn get_tenant_budget(&self, tenant_id: &TenantId) -> Result<Option<f64>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT budget FROM tenant_budgets WHERE tenant_id = ?1",
                params![tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()).into())
    }

    fn set_tenant_budget(&self, tenant_id: &TenantId, budget: Option<f64>) -> Result<(), StoreError> {
        let connection = self.lock()?;
        match budget {
            Some(value) => {
                connection
                    .execute(
                        "INSERT INTO tenant_budgets (tenant_id, budget) VALUES (?1, ?2)
                         ON CONFLICT(tenant_id) DO UPDATE SET budget = excluded.budget",
                        params![tenant_id.as_str(), value],
                    )
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            }
            None => {
                connection
                    .execute("DELETE FROM tenant_budgets WHERE tenant_id = ?1", params![tenant_id.as_str()])
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::model::AuditEventType;
    use gateway_core::model::Decision;
    use gateway_core::model::PolicyEffect;
    use gateway_core::model::PolicyScope;
    use gateway_core::model::PolicySubject;
    use gateway_core::model::SubjectType;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    fn open_store() -> (SqliteGovernanceStore, NamedTempFile) {
        let file = NamedTempFile::new().expect("tempfile");
        let store = SqliteGovernanceStore::open(&SqliteStoreConfig {
            path: file.path().to_path_buf(),
            busy_timeout_ms: 1_000,
            journal_mode: SqliteStoreMode::Wal,
        })
        .expect("open store");
        (store, file)
    }

    #[test]
    fn policy_round_trips_through_storage() {
        let (store, _file) = open_store();
        let policy = Policy {
            policy_id: PolicyId::new("deny_delete_file"),
            scope: PolicyScope {
                tenant_id: TenantId::new("local"),
                workspace_id: None,
                environment: None,
            },
            subject: PolicySubject {
                subject_type: SubjectType::Tool,
                name: Some("delete_file".to_string()),
            },
            conditions: BTreeMap::new(),
            effect: PolicyEffect { decision: Decision::Deny },
            explanation: None,
            precedence: 100,
            enabled: true,
            wizard_meta: None,
        };
        store.upsert_policy(policy.clone(), 1_000).expect("upsert");
        let loaded = store
            .get_policy(&TenantId::new("local"), &PolicyId::new("deny_delete_file"))
            .expect("get")
            .expect("present");
        assert_eq!(loaded, policy);
    }

    #[test]
    fn audit_chain_verifies_after_several_appends() {
        let (store, _file) = open_store();
        let tenant = TenantId::new("local");
        for i in 0..5 {
            store
                .append_audit_entry(AuditEntry {
                    tenant_id: tenant.clone(),
                    workspace_id: None,
                    execution_id: None,
                    trace_id: None,
                    user_id: None,
                    event_type: AuditEventType::AdapterAuditEvent,
                    event_data: serde_json::json!({"i": i}),
                    created_at: 1_000 + i,
                })
                .expect("append");
        }
        assert!(store.verify_audit_chain(&tenant).expect("verify"));
    }

    #[test]
    fn decision_double_resolve_is_rejected() {
        let (store, _file) = open_store();
        let tenant = TenantId::new("local");
        let decision_id = DecisionId::new("d-1");
        store
            .create_decision(ExecutionDecisionRecord {
                decision_id: decision_id.clone(),
                tenant_id: tenant.clone(),
                workspace_id: gateway_core::ids::WorkspaceId::new("ws-1"),
                execution_id: ExecutionId::new("exec-1"),
                adapter_id: AdapterId::new("claude-code"),
                status: DecisionStatus::Pending,
                required_role: None,
                expires_at: None,
                request_snapshot: serde_json::json!({}),
                granted_scope: None,
                resolution: None,
                decision_token: None,
                decision_token_jti: None,
                decision_token_used_at: None,
                fingerprint: None,
                created_at: 1_000,
                updated_at: 1_000,
            })
            .expect("create");
        assert!(store
            .compare_and_set_status(&tenant, &decision_id, DecisionStatus::Pending, DecisionStatus::Approved, None, None, None, None, 2_000)
            .expect("cas"));
        assert!(!store
            .compare_and_set_status(&tenant, &decision_id, DecisionStatus::Pending, DecisionStatus::Denied, None, None, None, None, 3_000)
            .expect("cas"));
    }
}
