//! The per-connection session.
//!
//! A [`SqlSession`] owns everything that is scoped to one connection: the
//! rendered-SQL cache (keyed by [`StatementId`]), the realized temp table
//! names, and the transaction stack. Commands run one at a time; every call
//! takes a [`CancellationToken`], checked before each statement is sent.
//! A statement already handed to the executor is not interrupted; the token
//! is passed along for the driver to honor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use data_rs_core::logging::command_span;
use data_rs_core::{DataError, DataResult, DatabaseSettings};
use data_rs_db::{
    Column, Command, CommandTree, DataSet, Model, ModelId, RowSource, StatementId,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::codec::decode;
use crate::ddl::DdlGenerator;
use crate::executor::{DbCommand, DbExecutor, SqlParameter};
use crate::generator::{SqlGenerator, SqlText};
use crate::mapper::TypeMapper;
use crate::row::Row;
use crate::temp_table::TempTableNames;
use crate::transaction::{IsolationLevel, TransactionHandle, TransactionStack};
use crate::version::SqlVersion;

#[derive(Debug, Default)]
struct SessionState {
    sql_cache: HashMap<StatementId, SqlText>,
    temp_tables: TempTableNames,
    temp_models: HashMap<ModelId, Arc<Model>>,
    transactions: TransactionStack,
}

/// A connection-scoped execution context.
pub struct SqlSession {
    executor: Arc<dyn DbExecutor>,
    mapper: Arc<TypeMapper>,
    version: SqlVersion,
    command_timeout: Option<Duration>,
    trace_sql: bool,
    io: Mutex<()>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSession")
            .field("version", &self.version)
            .field("command_timeout", &self.command_timeout)
            .field("trace_sql", &self.trace_sql)
            .finish_non_exhaustive()
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> DataResult<()> {
    if cancel.is_cancelled() {
        return Err(DataError::Cancelled);
    }
    Ok(())
}

impl SqlSession {
    pub fn new(executor: Arc<dyn DbExecutor>, mapper: Arc<TypeMapper>, version: SqlVersion) -> Self {
        Self {
            executor,
            mapper,
            version,
            command_timeout: None,
            trace_sql: false,
            io: Mutex::new(()),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Builds a session from the `[database]` settings block.
    pub fn from_settings(
        executor: Arc<dyn DbExecutor>,
        mapper: Arc<TypeMapper>,
        settings: &DatabaseSettings,
    ) -> DataResult<Self> {
        let version = settings.version.parse::<SqlVersion>().map_err(|e| {
            DataError::ConfigurationError(format!("database.version: {e}"))
        })?;
        let mut session = Self::new(executor, mapper, version);
        if settings.command_timeout_secs > 0 {
            session.command_timeout = Some(Duration::from_secs(settings.command_timeout_secs));
        }
        session.trace_sql = settings.trace_sql;
        Ok(session)
    }

    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    pub const fn version(&self) -> SqlVersion {
        self.version
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Renders `tree`, reusing the cached text for a tree seen before.
    pub async fn render(&self, tree: &CommandTree) -> DataResult<SqlText> {
        let mut state = self.state.lock().await;
        if let Some(text) = state.sql_cache.get(&tree.id()) {
            return Ok(text.clone());
        }
        let text =
            SqlGenerator::new(&self.mapper, self.version, &state.temp_tables).generate(tree.command())?;
        state.sql_cache.insert(tree.id(), text.clone());
        Ok(text)
    }

    /// Renders a one-off command without touching the cache.
    pub(crate) async fn generate(&self, command: &Command) -> DataResult<SqlText> {
        let state = self.state.lock().await;
        SqlGenerator::new(&self.mapper, self.version, &state.temp_tables).generate(command)
    }

    /// Drops the cached text of one tree. Returns `true` if it was cached.
    pub async fn invalidate(&self, id: StatementId) -> bool {
        self.state.lock().await.sql_cache.remove(&id).is_some()
    }

    pub async fn cached_statements(&self) -> usize {
        self.state.lock().await.sql_cache.len()
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Runs a non-query command and returns the affected row count.
    pub async fn execute(&self, tree: &CommandTree, cancel: &CancellationToken) -> DataResult<u64> {
        let text = self.render(tree).await?;
        let command = self.prepare(&text)?;
        self.run_non_query(tree.command().kind(), tree.id().get(), command, cancel)
            .await
    }

    /// Runs a command and returns its result rows.
    pub async fn query(&self, tree: &CommandTree, cancel: &CancellationToken) -> DataResult<Vec<Row>> {
        let text = self.render(tree).await?;
        let command = self.prepare(&text)?;
        self.run_reader(tree.command().kind(), tree.id().get(), command, cancel)
            .await
    }

    /// Runs a query and decodes the rows into a [`DataSet`] of the query's
    /// output model. Loaded rows carry database keys, so their primary keys
    /// are sealed.
    pub async fn query_dataset(
        &self,
        tree: &CommandTree,
        cancel: &CancellationToken,
    ) -> DataResult<DataSet> {
        let Command::Select(statement) = tree.command() else {
            return Err(DataError::InvalidStatement(format!(
                "query_dataset requires a query, got {}",
                tree.command().kind()
            )));
        };
        let model = statement.model().cloned().ok_or_else(|| {
            DataError::InvalidStatement("a join has no output model".to_string())
        })?;
        let rows = self.query(tree, cancel).await?;

        let mut data = DataSet::new(&model);
        data.with_identity_suspended(|data| -> DataResult<()> {
            for row in &rows {
                let index = data.add_row()?;
                for column in &model.columns {
                    let native = row.native(&column.name).ok_or_else(|| {
                        DataError::DatabaseError(format!(
                            "result set has no column '{}'",
                            column.name
                        ))
                    })?;
                    data.set_value(index, column, decode(&column.value_type, native)?)?;
                }
                data.seal_primary_key(index)?;
            }
            Ok(())
        })?;
        Ok(data)
    }

    /// Runs a single-row INSERT. Returns the new identity when the command
    /// asks for it.
    pub async fn insert_scalar(
        &self,
        tree: &CommandTree,
        cancel: &CancellationToken,
    ) -> DataResult<Option<i64>> {
        let Command::InsertScalar(insert) = tree.command() else {
            return Err(DataError::InvalidStatement(format!(
                "insert_scalar requires a single-row insert, got {}",
                tree.command().kind()
            )));
        };
        if !insert.output_identity {
            self.execute(tree, cancel).await?;
            return Ok(None);
        }
        let rows = self.query(tree, cancel).await?;
        let identity = rows.first().and_then(|row| row.native_at(0)).ok_or_else(|| {
            DataError::DatabaseError(format!(
                "insert into '{}' returned no identity",
                insert.target.name
            ))
        })?;
        Ok(identity.as_i64())
    }

    /// Like [`execute`](Self::execute), but only while `tx` is the current
    /// transaction.
    pub async fn execute_in(
        &self,
        tx: &TransactionHandle,
        tree: &CommandTree,
        cancel: &CancellationToken,
    ) -> DataResult<u64> {
        self.state.lock().await.transactions.ensure_current(tx)?;
        self.execute(tree, cancel).await
    }

    /// Like [`query`](Self::query), but only while `tx` is the current
    /// transaction.
    pub async fn query_in(
        &self,
        tx: &TransactionHandle,
        tree: &CommandTree,
        cancel: &CancellationToken,
    ) -> DataResult<Vec<Row>> {
        self.state.lock().await.transactions.ensure_current(tx)?;
        self.query(tree, cancel).await
    }

    pub(crate) async fn execute_command(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> DataResult<u64> {
        let text = self.generate(command).await?;
        let prepared = self.prepare(&text)?;
        self.run_non_query(command.kind(), 0, prepared, cancel).await
    }

    pub(crate) async fn query_command(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> DataResult<Vec<Row>> {
        let text = self.generate(command).await?;
        let prepared = self.prepare(&text)?;
        self.run_reader(command.kind(), 0, prepared, cancel).await
    }

    fn prepare(&self, text: &SqlText) -> DataResult<DbCommand> {
        if self.trace_sql {
            if let Ok(sql) = text.to_debug_sql(&self.mapper) {
                info!(sql = %sql, "statement");
            }
        }
        let params: Vec<SqlParameter> = text.bind(&self.mapper)?;
        Ok(self.plain(text.sql()).with_params(params))
    }

    fn plain(&self, sql: impl Into<String>) -> DbCommand {
        let command = DbCommand::new(sql);
        match self.command_timeout {
            Some(timeout) => command.with_timeout(timeout),
            None => command,
        }
    }

    async fn run_non_query(
        &self,
        kind: &str,
        statement_id: u64,
        command: DbCommand,
        cancel: &CancellationToken,
    ) -> DataResult<u64> {
        let _gate = self.io.lock().await;
        ensure_not_cancelled(cancel)?;
        async {
            debug!(sql = %command.sql, params = command.params.len(), "executing non-query");
            let affected = self.executor.execute_non_query(&command, cancel).await?;
            debug!(affected, "non-query complete");
            Ok::<_, DataError>(affected)
        }
        .instrument(command_span(kind, statement_id))
        .await
    }

    async fn run_reader(
        &self,
        kind: &str,
        statement_id: u64,
        command: DbCommand,
        cancel: &CancellationToken,
    ) -> DataResult<Vec<Row>> {
        let _gate = self.io.lock().await;
        ensure_not_cancelled(cancel)?;
        async {
            debug!(sql = %command.sql, params = command.params.len(), "executing reader");
            let rows = self.executor.execute_reader(&command, cancel).await?;
            debug!(rows = rows.len(), "reader complete");
            Ok::<_, DataError>(rows)
        }
        .instrument(command_span(kind, statement_id))
        .await
    }

    async fn run_batch(
        &self,
        kind: &str,
        statements: Vec<String>,
        cancel: &CancellationToken,
    ) -> DataResult<()> {
        for sql in statements {
            self.run_non_query(kind, 0, self.plain(sql), cancel).await?;
        }
        Ok(())
    }

    // ── Tables ───────────────────────────────────────────────────────

    /// Creates a permanent table (plus its extended properties).
    pub async fn create_table(&self, model: &Model, cancel: &CancellationToken) -> DataResult<()> {
        let sql = {
            let state = self.state.lock().await;
            DdlGenerator::new(&self.mapper, self.version, &state.temp_tables)
                .generate_create_table(model, false)?
        };
        self.run_non_query("create_table", 0, self.plain(sql), cancel)
            .await
            .map(drop)
    }

    pub async fn drop_table(&self, model: &Model, cancel: &CancellationToken) -> DataResult<()> {
        let sql = {
            let state = self.state.lock().await;
            DdlGenerator::new(&self.mapper, self.version, &state.temp_tables)
                .generate_drop_table(model, false)?
        };
        self.run_non_query("drop_table", 0, self.plain(sql), cancel)
            .await
            .map(drop)
    }

    /// Creates the session temp table for `model` and returns its realized
    /// `#name`.
    pub async fn create_temp_table(
        &self,
        model: &Arc<Model>,
        cancel: &CancellationToken,
    ) -> DataResult<String> {
        if !matches!(model.source, RowSource::TempTable) {
            return Err(DataError::InvalidStatement(format!(
                "model '{}' is not a temp table model",
                model.name
            )));
        }
        let (name, sql) = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.temp_tables.get(model.id) {
                return Err(DataError::InvalidStatement(format!(
                    "temp table {existing} for model '{}' already exists",
                    model.name
                )));
            }
            let name = state.temp_tables.realize(model);
            let ddl = DdlGenerator::new(&self.mapper, self.version, &state.temp_tables)
                .generate_create_table(model, true);
            match ddl {
                Ok(sql) => (name, sql),
                Err(e) => {
                    state.temp_tables.forget(model.id);
                    return Err(e);
                }
            }
        };
        if let Err(e) = self
            .run_non_query("create_temp_table", 0, self.plain(sql), cancel)
            .await
        {
            self.state.lock().await.temp_tables.forget(model.id);
            return Err(e);
        }
        self.state
            .lock()
            .await
            .temp_models
            .insert(model.id, Arc::clone(model));
        debug!(table = %name, "temp table created");
        Ok(name)
    }

    /// Drops a session temp table.
    ///
    /// Temp table names are never reused, so cached SQL that referenced the
    /// table is discarded.
    pub async fn drop_temp_table(&self, model: &Model, cancel: &CancellationToken) -> DataResult<()> {
        let sql = {
            let state = self.state.lock().await;
            DdlGenerator::new(&self.mapper, self.version, &state.temp_tables)
                .generate_drop_table(model, true)?
        };
        self.run_non_query("drop_temp_table", 0, self.plain(sql), cancel)
            .await?;
        let mut state = self.state.lock().await;
        state.temp_tables.forget(model.id);
        state.temp_models.remove(&model.id);
        state.sql_cache.clear();
        Ok(())
    }

    /// Returns the realized name of a temp model, if created.
    pub async fn temp_table_name(&self, id: ModelId) -> Option<String> {
        self.state.lock().await.temp_tables.get(id).map(str::to_string)
    }

    /// Returns every live temp model with a foreign key on `column` of
    /// `parent`, paired with the referencing column.
    pub(crate) async fn temp_children_of(
        &self,
        parent: &Model,
        column: &Column,
    ) -> Vec<(Arc<Model>, Arc<Column>)> {
        let state = self.state.lock().await;
        let mut children = Vec::new();
        for model in state.temp_models.values() {
            for constraint in model.foreign_keys_to(parent, column) {
                if let data_rs_db::Constraint::ForeignKey(fk) = constraint {
                    if let [fk_column] = fk.columns.as_slice() {
                        children.push((Arc::clone(model), Arc::clone(fk_column)));
                    }
                }
            }
        }
        children.sort_by_key(|(model, _)| model.id);
        children
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Begins a transaction, or a savepoint when one is already open.
    pub async fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
        cancel: &CancellationToken,
    ) -> DataResult<TransactionHandle> {
        let mut state = self.state.lock().await;
        let snapshot = state.transactions.clone();
        let (handle, statements) = state.transactions.begin(isolation)?;
        if let Err(e) = self.run_batch("begin_transaction", statements, cancel).await {
            state.transactions = snapshot;
            return Err(e);
        }
        debug!(
            transaction = handle.id(),
            depth = state.transactions.depth(),
            "transaction started"
        );
        Ok(handle)
    }

    /// Commits `tx`, which must be the current transaction.
    pub async fn commit(&self, tx: &TransactionHandle, cancel: &CancellationToken) -> DataResult<()> {
        let mut state = self.state.lock().await;
        let snapshot = state.transactions.clone();
        let statement = state.transactions.commit(tx)?;
        if let Err(e) = self
            .run_batch("commit", statement.into_iter().collect(), cancel)
            .await
        {
            state.transactions = snapshot;
            return Err(e);
        }
        debug!(transaction = tx.id(), "transaction committed");
        Ok(())
    }

    /// Rolls back `tx`, which must be the current transaction.
    pub async fn rollback(
        &self,
        tx: &TransactionHandle,
        cancel: &CancellationToken,
    ) -> DataResult<()> {
        let mut state = self.state.lock().await;
        let snapshot = state.transactions.clone();
        let statement = state.transactions.rollback(tx)?;
        if let Err(e) = self.run_batch("rollback", vec![statement], cancel).await {
            state.transactions = snapshot;
            return Err(e);
        }
        debug!(transaction = tx.id(), "transaction rolled back");
        Ok(())
    }

    /// Rolls back the whole transaction, whatever its depth. Every open
    /// handle is frozen, even if the rollback itself fails.
    pub async fn abort(&self, cancel: &CancellationToken) -> DataResult<()> {
        let mut state = self.state.lock().await;
        match state.transactions.abort() {
            Some(sql) => self.run_batch("rollback", vec![sql], cancel).await,
            None => Ok(()),
        }
    }

    pub async fn transaction_depth(&self) -> usize {
        self.state.lock().await.transactions.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use data_rs_db::{
        Expr, InsertScalarStatement, ParamCell, PrimaryKey, SelectStatement, SortDirection,
        Statement, Value, ValueType,
    };

    use crate::codec::NativeValue;

    #[derive(Default)]
    struct MockDb {
        statements: Mutex<Vec<String>>,
        params: Mutex<Vec<Vec<SqlParameter>>>,
        rows: Vec<Row>,
    }

    #[async_trait]
    impl DbExecutor for MockDb {
        async fn execute_non_query(
            &self,
            command: &DbCommand,
            _cancel: &CancellationToken,
        ) -> DataResult<u64> {
            self.statements.lock().await.push(command.sql.clone());
            self.params.lock().await.push(command.params.clone());
            Ok(1)
        }

        async fn execute_reader(
            &self,
            command: &DbCommand,
            _cancel: &CancellationToken,
        ) -> DataResult<Vec<Row>> {
            self.statements.lock().await.push(command.sql.clone());
            self.params.lock().await.push(command.params.clone());
            Ok(self.rows.clone())
        }
    }

    fn session_with(db: &Arc<MockDb>) -> SqlSession {
        SqlSession::new(
            Arc::clone(db) as Arc<dyn DbExecutor>,
            Arc::new(TypeMapper::new()),
            SqlVersion::Sql13,
        )
    }

    fn customer() -> (Arc<Model>, Arc<Column>, Arc<Column>) {
        let mut m = Model::new("Customer");
        let id = m.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
        let name = m.add_column(Column::new("Name", ValueType::String));
        m.set_primary_key(PrimaryKey::new(
            "PK_Customer",
            vec![(Arc::clone(&id), SortDirection::Ascending)],
        ));
        (Arc::new(m), id, name)
    }

    #[tokio::test]
    async fn test_render_is_cached_per_tree() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let (customer, _, name) = customer();
        let tree = CommandTree::new(Command::Select(
            SelectStatement::new(&customer)
                .column(customer.col(&name), &name)
                .from(Statement::table(&customer))
                .into_statement(),
        ));
        let first = session.render(&tree).await.unwrap();
        let second = session.render(&tree.clone()).await.unwrap();
        assert_eq!(first.sql(), second.sql());
        assert_eq!(session.cached_statements().await, 1);
        assert!(session.invalidate(tree.id()).await);
        assert_eq!(session.cached_statements().await, 0);
    }

    #[tokio::test]
    async fn test_execute_binds_current_parameter_values() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let (customer, _, name) = customer();
        let param = ParamCell::shared(ValueType::String, "Ada");
        let tree = CommandTree::new(Command::InsertScalar(Box::new(InsertScalarStatement {
            target: Arc::clone(&customer),
            values: vec![data_rs_db::ColumnMapping::new(Expr::param(&param), &name)],
            output_identity: false,
        })));
        let cancel = CancellationToken::new();
        assert_eq!(session.execute(&tree, &cancel).await.unwrap(), 1);
        param.set("Grace");
        session.execute(&tree, &cancel).await.unwrap();

        let statements = db.statements.lock().await;
        assert_eq!(statements[0], "INSERT INTO [Customer] ([Name])\nVALUES (@p1);");
        assert_eq!(statements[0], statements[1]);
        let params = db.params.lock().await;
        assert_eq!(params[0][0].value, NativeValue::String("Ada".into()));
        assert_eq!(params[1][0].value, NativeValue::String("Grace".into()));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_io() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let (customer, _, _) = customer();
        let tree = CommandTree::new(Command::Select(Statement::table(&customer)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = session.query(&tree, &cancel).await.unwrap_err();
        assert!(matches!(err, DataError::Cancelled));
        assert!(db.statements.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_query_dataset_decodes_and_seals() {
        let db = Arc::new(MockDb {
            rows: vec![
                Row::new(
                    vec!["Id".into(), "Name".into()],
                    vec![NativeValue::I32(7), NativeValue::String("Ada".into())],
                ),
                Row::new(
                    vec!["Id".into(), "Name".into()],
                    vec![NativeValue::I32(9), NativeValue::String("Grace".into())],
                ),
            ],
            ..MockDb::default()
        });
        let session = session_with(&db);
        let (customer, id, name) = customer();
        let tree = CommandTree::new(Command::Select(Statement::table(&customer)));
        let data = session
            .query_dataset(&tree, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.value(0, &id), Some(&Value::Int32(7)));
        assert_eq!(data.value(1, &name), Some(&Value::String("Grace".into())));
        assert!(data.rows().iter().all(|r| r.is_pk_sealed()));
    }

    #[tokio::test]
    async fn test_insert_scalar_returns_identity() {
        let db = Arc::new(MockDb {
            rows: vec![Row::new(vec![String::new()], vec![NativeValue::I64(42)])],
            ..MockDb::default()
        });
        let session = session_with(&db);
        let (customer, _, name) = customer();
        let tree = CommandTree::new(Command::InsertScalar(Box::new(InsertScalarStatement {
            target: Arc::clone(&customer),
            values: vec![data_rs_db::ColumnMapping::new(Expr::constant("Ada"), &name)],
            output_identity: true,
        })));
        let id = session
            .insert_scalar(&tree, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id, Some(42));
        assert!(db.statements.lock().await[0].ends_with("SELECT CAST(SCOPE_IDENTITY() AS BIGINT);"));
    }

    #[tokio::test]
    async fn test_temp_table_lifecycle() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let mut scratch = Model::temp("Scratch");
        scratch.add_column(Column::new("Value", ValueType::Int32));
        let scratch = Arc::new(scratch);
        let cancel = CancellationToken::new();

        let name = session.create_temp_table(&scratch, &cancel).await.unwrap();
        assert_eq!(name, "#Scratch");
        let err = session.create_temp_table(&scratch, &cancel).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(_)));

        session.drop_temp_table(&scratch, &cancel).await.unwrap();
        assert_eq!(session.temp_table_name(scratch.id).await, None);
        let statements = db.statements.lock().await;
        assert_eq!(
            statements[0],
            "CREATE TABLE [#Scratch] (\n    [Value] INT NOT NULL\n);"
        );
        assert_eq!(statements[1], "DROP TABLE [#Scratch];");
    }

    #[tokio::test]
    async fn test_create_temp_table_rejects_permanent_models() {
        let session = session_with(&Arc::new(MockDb::default()));
        let (customer, _, _) = customer();
        let err = session
            .create_temp_table(&customer, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(_)));
    }

    #[tokio::test]
    async fn test_nested_transactions_issue_savepoints() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let cancel = CancellationToken::new();
        let root = session
            .begin_transaction(Some(IsolationLevel::ReadCommitted), &cancel)
            .await
            .unwrap();
        let inner = session.begin_transaction(None, &cancel).await.unwrap();
        assert_eq!(session.transaction_depth().await, 2);
        session.rollback(&inner, &cancel).await.unwrap();
        session.commit(&root, &cancel).await.unwrap();

        assert_eq!(
            *db.statements.lock().await,
            vec![
                "SET TRANSACTION ISOLATION LEVEL READ COMMITTED;",
                "BEGIN TRANSACTION;",
                "SAVE TRANSACTION [sp_1];",
                "ROLLBACK TRANSACTION [sp_1];",
                "COMMIT TRANSACTION;",
            ]
        );
    }

    #[tokio::test]
    async fn test_commands_route_only_through_current_transaction() {
        let db = Arc::new(MockDb::default());
        let session = session_with(&db);
        let cancel = CancellationToken::new();
        let (customer, _, _) = customer();
        let tree = CommandTree::new(Command::Select(Statement::table(&customer)));

        let root = session.begin_transaction(None, &cancel).await.unwrap();
        let inner = session.begin_transaction(None, &cancel).await.unwrap();
        let err = session.query_in(&root, &tree, &cancel).await.unwrap_err();
        assert!(matches!(err, DataError::TransactionError(_)));
        session.query_in(&inner, &tree, &cancel).await.unwrap();

        session.abort(&cancel).await.unwrap();
        let err = session.query_in(&inner, &tree, &cancel).await.unwrap_err();
        assert!(matches!(err, DataError::TransactionError(_)));
        let err = session.commit(&root, &cancel).await.unwrap_err();
        assert!(matches!(err, DataError::TransactionError(_)));
        assert_eq!(session.transaction_depth().await, 0);
    }

    #[tokio::test]
    async fn test_from_settings() {
        let db: Arc<dyn DbExecutor> = Arc::new(MockDb::default());
        let settings = DatabaseSettings {
            version: "140".into(),
            command_timeout_secs: 5,
            ..DatabaseSettings::default()
        };
        let session =
            SqlSession::from_settings(Arc::clone(&db), Arc::new(TypeMapper::new()), &settings)
                .unwrap();
        assert_eq!(session.version(), SqlVersion::Sql14);

        let bad = DatabaseSettings {
            version: "Sql9".into(),
            ..DatabaseSettings::default()
        };
        let err = SqlSession::from_settings(db, Arc::new(TypeMapper::new()), &bad).unwrap_err();
        assert!(matches!(err, DataError::ConfigurationError(ref m) if m.contains("database.version")));
    }
}
