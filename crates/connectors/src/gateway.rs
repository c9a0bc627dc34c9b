use crate::config::DatabaseConfig;
use crate::encode::encode_cell;
use crate::error::{DbError, GatewayError};
use crate::transform::{PlanContext, Report, TransformEngine};
use model::plan::MIN_SCHEMA_VERSION;
use model::{InsertionPlan, JobDescriptor, Record, StatusCode};
use model::job::{truncate_bytes, MAX_CLIENT_ID_BYTES, MAX_FILE_PATH_BYTES};
use model::ShutdownFlag;
use bytes::BytesMut;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Row};
use std::error::Error as StdError;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// A `ToSql` value that is NULL regardless of the column's declared type.
///
/// `postgres`'s `Option<T>` impl still type-checks `T` against the column
/// (so `None::<String>` is rejected for an integer column); a cell's
/// `is_null` flag carries no type information to pick a `T` from, so this
/// wrapper accepts every type and always encodes as NULL.
#[derive(Debug)]
struct SqlNull;

impl ToSql for SqlNull {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// A thin session wrapping one Postgres connection (§4.1). Every operation
/// is synchronous and blocking; a gateway is owned by exactly one thread for
/// its lifetime and is never shared.
#[derive(Debug)]
pub struct PgGateway {
    client: Client,
    id: String,
    schema_version: u32,
    config: DatabaseConfig,
}

impl PgGateway {
    /// Establishes the session and queries the schema version. A failed
    /// metadata query (missing table, older install) defaults the version
    /// to [`MIN_SCHEMA_VERSION`]; any lower reported value is clamped
    /// upward to the same floor.
    pub fn connect(config: DatabaseConfig, id: impl Into<String>) -> Result<Self, DbError> {
        let id = id.into();
        let client = Client::connect(&config.connection_string(), NoTls)?;
        let mut gateway = Self {
            client,
            id,
            schema_version: MIN_SCHEMA_VERSION,
            config,
        };
        gateway.schema_version = gateway.query_schema_version();
        info!(connection = %gateway.id, schema_version = gateway.schema_version, "gateway connected");
        Ok(gateway)
    }

    fn query_schema_version(&mut self) -> u32 {
        let row = self
            .client
            .query_opt("SELECT version FROM schema_version LIMIT 1", &[])
            .ok()
            .flatten();
        let reported: u32 = row
            .and_then(|r| r.try_get::<_, i32>(0).ok())
            .map(|v| v.max(0) as u32)
            .unwrap_or(MIN_SCHEMA_VERSION);
        reported.max(MIN_SCHEMA_VERSION)
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sends a no-op round-trip; on failure, attempts one reconnect. Returns
    /// whether the connection is usable afterward.
    pub fn ping(&mut self) -> bool {
        if self.client.simple_query("SELECT 1").is_ok() {
            return true;
        }
        warn!(connection = %self.id, "ping failed, attempting reconnect");
        match Client::connect(&self.config.connection_string(), NoTls) {
            Ok(client) => {
                self.client = client;
                self.client.simple_query("SELECT 1").is_ok()
            }
            Err(err) => {
                warn!(connection = %self.id, error = %err, "reconnect failed");
                false
            }
        }
    }

    pub fn begin(&mut self) -> Result<(), DbError> {
        self.client.batch_execute("BEGIN")?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), DbError> {
        self.client.batch_execute("COMMIT")?;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), DbError> {
        self.client.batch_execute("ROLLBACK")?;
        Ok(())
    }

    /// Builds and executes one parameterized INSERT, per the protocol in
    /// §4.1. Returns, per record, either the `RETURNING` key column (if
    /// `plan.key` is set) or `"0"` as a stand-in for an object identifier
    /// (modern Postgres tables are created `WITHOUT OIDS`, so there is
    /// nothing meaningful to return; see DESIGN.md).
    pub fn insert(&mut self, plan: &InsertionPlan) -> Result<Vec<String>, DbError> {
        plan.validate().map_err(|e| DbError::Unknown(e.to_string()))?;

        if let Some(required) = plan.schema_version_required {
            if required > self.schema_version {
                return Err(DbError::SchemaVersionTooOld {
                    required,
                    actual: self.schema_version,
                });
            }
        }

        let columns: Vec<&str> = plan.fields.iter().map(|f| f.name.as_str()).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            plan.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(key) = &plan.key {
            sql.push_str(&format!(" RETURNING {key}"));
        }

        let statement = self.client.prepare(&sql)?;
        let mut keys = Vec::with_capacity(plan.records.len());

        for record in &plan.records {
            let args = record_args(plan, record)?;
            let refs: Vec<&(dyn ToSql + Sync)> =
                args.iter().map(|v| v.as_ref() as &(dyn ToSql + Sync)).collect();

            if plan.key.is_some() {
                let row = self.client.query_one(&statement, &refs)?;
                keys.push(key_column_to_string(&row, plan.key.as_deref())?);
            } else {
                self.client.execute(&statement, &refs)?;
                keys.push("0".to_string());
            }
        }

        Ok(keys)
    }

    /// Issues `LISTEN <channel>`, blocks until a notification arrives (or
    /// the shutdown flag is observed between polls), then issues `UNLISTEN`
    /// before returning either way.
    pub fn wait_for_notification(
        &mut self,
        shutdown: &ShutdownFlag,
        channel: &str,
    ) -> Result<(), DbError> {
        self.client.batch_execute(&format!("LISTEN {channel}"))?;

        let result = loop {
            if shutdown.is_set() {
                break Ok(());
            }
            match self
                .client
                .notifications()
                .timeout_iter(Duration::from_secs(1))
                .next()
            {
                Some(Ok(_)) => break Ok(()),
                Some(Err(err)) => {
                    if self.ping() {
                        continue;
                    }
                    break Err(DbError::Pg(err));
                }
                None => continue,
            }
        };

        let _ = self.client.batch_execute(&format!("UNLISTEN {channel}"));
        result
    }

    /// Atomically claims the earliest unclaimed submission, truncating the
    /// filename/client-id per §4.1, and marks it `assigned` within the same
    /// critical section.
    pub fn claim_next_submission(
        &mut self,
        claim_mutex: &Mutex<()>,
    ) -> Result<JobDescriptor, DbError> {
        let _guard = claim_mutex.lock().unwrap_or_else(|poison| poison.into_inner());

        let row = self.client.query_opt(
            "SELECT submid, filename, clientid FROM submissionqueue \
             WHERE status = $1 ORDER BY submid LIMIT 1",
            &[&StatusCode::New.as_i32()],
        )?;

        let Some(row) = row else {
            return Ok(JobDescriptor::None);
        };

        let submid: i64 = row.get(0);
        let filename: String = truncate_bytes(&row.get::<_, String>(1), MAX_FILE_PATH_BYTES);
        let clientid: String = truncate_bytes(&row.get::<_, String>(2), MAX_CLIENT_ID_BYTES);

        self.set_status(submid as u64, StatusCode::Assigned)?;

        Ok(JobDescriptor::available(submid as u64, clientid, filename))
    }

    /// Updates a queue row's status following the fixed mapping in §4.1.
    pub fn update_submission_status(
        &mut self,
        submid: u64,
        status: StatusCode,
    ) -> Result<(), DbError> {
        if status.update_class() == model::status::UpdateClass::Rejected {
            return Err(DbError::InvalidStatusTransition(status));
        }
        self.set_status(submid, status)
    }

    fn set_status(&mut self, submid: u64, status: StatusCode) -> Result<(), DbError> {
        use model::status::UpdateClass;
        let sql = match status.update_class() {
            UpdateClass::StatusOnly => "UPDATE submissionqueue SET status = $1 WHERE submid = $2",
            UpdateClass::WithParseStart => {
                "UPDATE submissionqueue SET status = $1, parsestart = now() WHERE submid = $2"
            }
            UpdateClass::WithParseEnd => {
                "UPDATE submissionqueue SET status = $1, parseend = now() WHERE submid = $2"
            }
            UpdateClass::Rejected => return Err(DbError::InvalidStatusTransition(status)),
        };
        self.client
            .execute(sql, &[&status.as_i32(), &(submid as i64)])?;
        Ok(())
    }

    /// Idempotent-by-content system registration, executed by the caller
    /// under the process-wide registration mutex (§4.3 step c).
    pub fn register_system(
        &mut self,
        engine: &dyn TransformEngine,
        report: &Report,
    ) -> Result<i64, GatewayError> {
        let ctx = PlanContext::default();
        let systems_plan = engine.build_plan("systems", report, &ctx)?;
        let sysid = systems_plan
            .field_text(0, "sysid")
            .ok_or_else(|| GatewayError::MissingField {
                table: "systems".into(),
                field: "sysid".into(),
            })?;

        let rows = self
            .client
            .query("SELECT syskey FROM systems WHERE sysid = $1", &[&sysid])
            .map_err(DbError::from)?;

        let syskey = match rows.len() {
            0 => {
                let keys = self.insert(&systems_plan)?;
                let syskey: i64 = keys
                    .first()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| GatewayError::MissingField {
                        table: "systems".into(),
                        field: "syskey".into(),
                    })?;
                let hostname_ctx = PlanContext {
                    syskey: Some(syskey),
                    ..Default::default()
                };
                let hostname_plan = engine.build_plan("systems_hostname", report, &hostname_ctx)?;
                self.insert(&hostname_plan)?;
                syskey
            }
            1 => {
                let syskey: i64 = rows[0].get(0);
                let hostname_ctx = PlanContext {
                    syskey: Some(syskey),
                    ..Default::default()
                };
                let hostname_plan = engine.build_plan("systems_hostname", report, &hostname_ctx)?;
                let hostname = hostname_plan.field_text(0, "hostname");
                let ipaddr = hostname_plan.field_text(0, "ipaddr");
                let existing = match &ipaddr {
                    Some(ip) => self.client.query_opt(
                        "SELECT 1 FROM systems_hostname WHERE syskey = $1 AND hostname = $2 AND ipaddr = $3",
                        &[&syskey, &hostname, ip],
                    ),
                    None => self.client.query_opt(
                        "SELECT 1 FROM systems_hostname WHERE syskey = $1 AND hostname = $2 AND ipaddr IS NULL",
                        &[&syskey, &hostname],
                    ),
                }
                .map_err(DbError::from)?;
                if existing.is_none() {
                    self.insert(&hostname_plan)?;
                }
                syskey
            }
            n => return Err(GatewayError::AmbiguousSystemRow(n as i64, sysid)),
        };

        Ok(syskey)
    }

    /// Fetches the next run-id sequence value; values below 1 are a failure.
    pub fn reserve_run_id(&mut self) -> Result<i64, DbError> {
        let row = self
            .client
            .query_one("SELECT nextval('rtevalruns_rterid_seq')", &[])?;
        let rterid: i64 = row.get(0);
        if rterid < 1 {
            return Err(DbError::Unknown(format!(
                "rterid sequence returned invalid value {rterid}"
            )));
        }
        Ok(rterid)
    }

    /// Builds and inserts the `rtevalruns` and `rtevalruns_details` rows.
    /// Must be called inside an open transaction.
    pub fn register_run(
        &mut self,
        engine: &dyn TransformEngine,
        report: &Report,
        submid: u64,
        syskey: i64,
        rterid: i64,
        archive_path: &str,
    ) -> Result<(), GatewayError> {
        let ctx = PlanContext {
            syskey: Some(syskey),
            rterid: Some(rterid),
            submid: Some(submid),
            archive_path: Some(archive_path),
        };
        let runs_plan = engine.build_plan("rtevalruns", report, &ctx)?;
        self.insert(&runs_plan)?;

        let details_plan = engine.build_plan("rtevalruns_details", report, &ctx)?;
        self.insert(&details_plan)?;

        Ok(())
    }

    /// Builds and inserts the three cyclic measurement tables, in order,
    /// skipping any whose plan came back empty. Must be called inside an
    /// open transaction.
    ///
    /// Resolution of the ambiguous `cyclicdata` threshold in the original
    /// source (§9 design note): succeeds if at least one of the three
    /// tables accepted non-empty data; otherwise succeeds with a warning.
    pub fn register_measurements(
        &mut self,
        engine: &dyn TransformEngine,
        report: &Report,
        rterid: i64,
    ) -> Result<(), GatewayError> {
        let ctx = PlanContext {
            rterid: Some(rterid),
            ..Default::default()
        };
        let tables = ["cyclic_statistics", "cyclic_histogram", "cyclic_rawdata"];
        let mut inserted_any = false;

        for table in tables {
            let plan = engine.build_plan(table, report, &ctx)?;
            if !plan.is_empty() {
                self.insert(&plan)?;
                inserted_any = true;
            }
        }

        if !inserted_any {
            warn!(rterid, "no cyclic measurement data present for this run");
        }

        Ok(())
    }

    pub fn disconnect(self) {
        drop(self);
    }
}

fn record_args(
    plan: &InsertionPlan,
    record: &Record,
) -> Result<Vec<Box<dyn ToSql + Sync + Send>>, DbError> {
    let mut args: Vec<Option<Box<dyn ToSql + Sync + Send>>> = vec![None; plan.fields.len()];

    for cell in &record.0 {
        let position = plan.field_position(cell.field_id).ok_or_else(|| {
            DbError::Unknown(format!(
                "cell references undeclared field_id {}",
                cell.field_id
            ))
        })?;
        let value = encode_cell(cell)?;
        args[position] = Some(value_to_sql(value));
    }

    args.into_iter()
        .enumerate()
        .map(|(idx, arg)| {
            arg.ok_or_else(|| {
                DbError::Unknown(format!(
                    "record is missing a cell for declared field position {idx}"
                ))
            })
        })
        .collect()
}

fn value_to_sql(value: model::Value) -> Box<dyn ToSql + Sync + Send> {
    use model::Value;
    match value {
        Value::SmallInt(v) => Box::new(v),
        Value::Int(v) => Box::new(v),
        Value::BigInt(v) => Box::new(v),
        Value::Float(v) => Box::new(v),
        Value::Text(v) => Box::new(v),
        Value::Boolean(v) => Box::new(v),
        Value::Date(v) => Box::new(v),
        Value::Timestamp(v) => Box::new(v),
        Value::Null => Box::new(SqlNull),
    }
}

fn key_column_to_string(row: &Row, key: Option<&str>) -> Result<String, DbError> {
    if let Ok(v) = row.try_get::<_, i64>(0) {
        return Ok(v.to_string());
    }
    if let Ok(v) = row.try_get::<_, i32>(0) {
        return Ok(v.to_string());
    }
    if let Ok(v) = row.try_get::<_, String>(0) {
        return Ok(v);
    }
    Err(DbError::UnsupportedKeyColumn(key.map(|s| s.to_string())))
}
