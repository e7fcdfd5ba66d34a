//! Bulk insert with identity propagation.
//!
//! Rows of a [`DataSet`] carry provisional identity values (`seed`,
//! `seed + increment`, ...) so children can reference parents before they
//! exist. A bulk insert ships the rows as one JSON rowset and, when the
//! target has an identity column, runs:
//!
//! 1. create a temp mapping table `(OldValue, NewValue)` whose `OldValue`
//!    is an identity with the target's seed and increment
//! 2. `INSERT ... OUTPUT INSERTED.[Id] INTO [#IdentityMap] ([NewValue])`
//!    ordered by row position
//! 3. read the mapping in key-assignment order and give the k-th new key to
//!    the k-th row, with identity bookkeeping suspended, sealing the primary
//!    key
//! 4. remap foreign keys in in-memory children and in live temp tables
//! 5. drop the mapping table
//!
//! The server assigns identities in the INSERT's `ORDER BY`, but the OUTPUT
//! stream may reach the mapping table in any order, so `OldValue` is not
//! trusted for pairing. When it disagrees with the assignment order the
//! mapping table is realigned from the resolved pairs before temp tables
//! are remapped against it.
//!
//! Propagation is one level deep. Grandchildren are remapped when their
//! parent is itself bulk-inserted. Nothing is compensated on failure; wrap
//! the call in a transaction for atomicity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use data_rs_core::{DataError, DataResult};
use data_rs_db::{
    Column, ColumnMapping, ColumnRef, Command, Constraint, DataSet, InsertStatement, JoinKind,
    Model, OrderBy, PrimaryKey, SelectStatement, SortDirection, Statement, UpdateStatement, Value,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::codec::decode;
use crate::json_rowset::JsonRowset;
use crate::mapper::TypeMapper;
use crate::session::SqlSession;

/// The protocol states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStep {
    Prepare,
    /// Terminal: plain insert, nothing to propagate.
    NoOp,
    CreateMapping,
    InsertWithOutput,
    Propagate,
    PropagateToChildren,
    /// Terminal: keys written back and children remapped.
    Completed,
}

/// What a bulk insert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkInsertOutcome {
    /// The terminal state: [`IdentityStep::NoOp`] or
    /// [`IdentityStep::Completed`].
    pub step: IdentityStep,
    /// Rows reported inserted by the server.
    pub inserted: u64,
    /// In-memory rows that received a database key.
    pub propagated: usize,
    /// Foreign-key cells rewritten across in-memory children.
    pub children_remapped: usize,
    /// Rows updated across session temp tables.
    pub temp_rows_remapped: u64,
}

impl BulkInsertOutcome {
    const fn no_op(inserted: u64) -> Self {
        Self {
            step: IdentityStep::NoOp,
            inserted,
            propagated: 0,
            children_remapped: 0,
            temp_rows_remapped: 0,
        }
    }
}

/// A pending bulk insert of one data set.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use data_rs_db::DataSet;
/// # use data_rs_sqlserver::identity::BulkInsert;
/// # use data_rs_sqlserver::session::SqlSession;
/// # use tokio_util::sync::CancellationToken;
/// # async fn run(session: &SqlSession, orders: &mut DataSet, lines: &mut DataSet) {
/// let outcome = BulkInsert::new(orders)
///     .with_child(lines)
///     .run(session, &CancellationToken::new())
///     .await
///     .unwrap();
/// println!("{} rows inserted", outcome.inserted);
/// # }
/// ```
pub struct BulkInsert<'a> {
    data: &'a mut DataSet,
    children: Vec<&'a mut DataSet>,
    propagate_identity: bool,
}

impl<'a> BulkInsert<'a> {
    pub fn new(data: &'a mut DataSet) -> Self {
        Self {
            data,
            children: Vec::new(),
            propagate_identity: true,
        }
    }

    /// Registers an in-memory child whose foreign keys follow the new keys.
    #[must_use]
    pub fn with_child(mut self, child: &'a mut DataSet) -> Self {
        self.children.push(child);
        self
    }

    /// Inserts without reading generated keys back.
    #[must_use]
    pub const fn without_identity_propagation(mut self) -> Self {
        self.propagate_identity = false;
        self
    }

    pub async fn run(
        self,
        session: &SqlSession,
        cancel: &CancellationToken,
    ) -> DataResult<BulkInsertOutcome> {
        let target = Arc::clone(self.data.model());
        let span = info_span!("bulk_insert", table = %target.name, rows = self.data.len());
        self.execute(session, &target, cancel).instrument(span).await
    }

    async fn execute(
        self,
        session: &SqlSession,
        target: &Arc<Model>,
        cancel: &CancellationToken,
    ) -> DataResult<BulkInsertOutcome> {
        debug!(step = ?IdentityStep::Prepare);
        if self.data.is_empty() {
            debug!(step = ?IdentityStep::NoOp, "nothing to insert");
            return Ok(BulkInsertOutcome::no_op(0));
        }
        let columns: Vec<Arc<Column>> = target.insertable_columns().cloned().collect();
        let rowset = JsonRowset::build(self.data, &columns, session.mapper())?;

        let identity = match target.identity_column() {
            Some(identity) if self.propagate_identity => Arc::clone(identity),
            _ => {
                let inserted = session
                    .execute_command(&insert_command(target, &rowset, None), cancel)
                    .await?;
                debug!(step = ?IdentityStep::NoOp, inserted);
                return Ok(BulkInsertOutcome::no_op(inserted));
            }
        };
        check_provisional_identities(self.data, &identity)?;

        debug!(step = ?IdentityStep::CreateMapping);
        let mapping = IdentityMap::new(&identity)?;
        session.create_temp_table(&mapping.model, cancel).await?;

        debug!(step = ?IdentityStep::InsertWithOutput);
        let inserted = session
            .execute_command(
                &insert_command(target, &rowset, Some(&mapping.model)),
                cancel,
            )
            .await?;

        let mut outcome = BulkInsertOutcome {
            step: IdentityStep::Completed,
            inserted,
            propagated: 0,
            children_remapped: 0,
            temp_rows_remapped: 0,
        };

        if inserted > 0 {
            debug!(step = ?IdentityStep::Propagate, inserted);
            let mapped = mapping.read(session, &identity, cancel).await?;
            let resolved = resolve_pairs(self.data, &identity, mapped)?;
            let remap = write_back(self.data, &identity, &resolved.pairs)?;
            outcome.propagated = remap.len();
            if resolved.misaligned {
                debug!("identity mapping arrived out of order; realigning");
                let realign = mapping.realign_command(&identity, &resolved.pairs, session.mapper())?;
                session.execute_command(&realign, cancel).await?;
            }

            debug!(step = ?IdentityStep::PropagateToChildren);
            for child in self.children {
                for column in fk_columns(child.model(), target, &identity) {
                    outcome.children_remapped += child.remap_column(&column, &remap)?;
                }
            }
            for (child, column) in session.temp_children_of(target, &identity).await {
                outcome.temp_rows_remapped += session
                    .execute_command(&mapping.remap_command(&child, &column), cancel)
                    .await?;
            }
        }

        session.drop_temp_table(&mapping.model, cancel).await?;
        debug!(
            step = ?IdentityStep::Completed,
            propagated = outcome.propagated,
            children_remapped = outcome.children_remapped,
            temp_rows_remapped = outcome.temp_rows_remapped
        );
        Ok(outcome)
    }
}

/// The temp mapping table of one run.
struct IdentityMap {
    model: Arc<Model>,
    old_value: Arc<Column>,
    new_value: Arc<Column>,
}

impl IdentityMap {
    fn new(identity: &Column) -> DataResult<Self> {
        let spec = identity.identity.ok_or_else(|| {
            DataError::InvalidStatement(format!("column '{}' is not an identity", identity.name))
        })?;
        if !identity.value_type.is_integral() {
            return Err(DataError::NotSupported(format!(
                "identity column '{}' of non-integral type {}",
                identity.name, identity.value_type
            )));
        }
        let mut model = Model::temp("IdentityMap");
        let old_value = model.add_column(
            Column::new("OldValue", identity.value_type.clone()).identity(spec.seed, spec.increment),
        );
        let new_value = model.add_column(Column::new("NewValue", identity.value_type.clone()));
        model.set_primary_key(PrimaryKey::new(
            "PK_IdentityMap",
            vec![(Arc::clone(&old_value), SortDirection::Ascending)],
        ));
        Ok(Self {
            model: Arc::new(model),
            old_value,
            new_value,
        })
    }

    /// Reads `(OldValue, NewValue)` pairs in the order the server assigned
    /// the new keys.
    async fn read(
        &self,
        session: &SqlSession,
        identity: &Column,
        cancel: &CancellationToken,
    ) -> DataResult<Vec<(i64, Value)>> {
        let new_value = self.model.col(&self.new_value);
        let order = match identity.identity {
            Some(spec) if spec.increment < 0 => OrderBy::desc(new_value),
            _ => OrderBy::asc(new_value),
        };
        let select = SelectStatement::new(&self.model)
            .column(self.model.col(&self.old_value), &self.old_value)
            .column(self.model.col(&self.new_value), &self.new_value)
            .from(Statement::table(&self.model))
            .order_by(order);
        let rows = session
            .query_command(&Command::Select(select.into_statement()), cancel)
            .await?;
        rows.iter()
            .map(|row| {
                let old = row.get::<i64>(&self.old_value.name)?;
                let native = row.native(&self.new_value.name).ok_or_else(|| {
                    DataError::DatabaseError("identity mapping row has no NewValue".to_string())
                })?;
                Ok((old, decode(&identity.value_type, native)?))
            })
            .collect()
    }

    /// `UPDATE map SET NewValue = pairs.NewValue FROM map INNER JOIN
    /// OPENJSON(@p1) pairs ON map.OldValue = pairs.OldValue`, rewriting the
    /// mapping table so each `OldValue` carries its row's new key.
    fn realign_command(
        &self,
        identity: &Column,
        pairs: &[(i64, Value)],
        mapper: &TypeMapper,
    ) -> DataResult<Command> {
        let mut resolved = DataSet::new(&self.model);
        resolved.with_identity_suspended(|resolved| -> DataResult<()> {
            for (old, new) in pairs {
                let old = Value::integral(&identity.value_type, *old).ok_or_else(|| {
                    DataError::ArgumentOutOfRange(format!(
                        "identity value {old} does not fit column '{}'",
                        identity.name
                    ))
                })?;
                resolved.add_row_with(vec![(&self.old_value, old), (&self.new_value, new.clone())])?;
            }
            Ok(())
        })?;
        let rowset = JsonRowset::build(
            &resolved,
            &[Arc::clone(&self.old_value), Arc::clone(&self.new_value)],
            mapper,
        )?;
        let join = Statement::join(
            Statement::table(&self.model),
            Statement::table(&rowset.model),
            JoinKind::Inner,
            vec![(
                ColumnRef::new(self.model.id, Arc::clone(&self.old_value)),
                ColumnRef::new(rowset.model.id, Arc::clone(&self.old_value)),
            )],
            None,
        );
        Ok(Command::Update(Box::new(UpdateStatement {
            target: Arc::clone(&self.model),
            assignments: vec![ColumnMapping::new(
                rowset.model.col(&self.new_value),
                &self.new_value,
            )],
            from: Some(join),
            where_: None,
        })))
    }

    /// `UPDATE child SET fk = map.NewValue FROM child INNER JOIN map ON
    /// child.fk = map.OldValue`.
    fn remap_command(&self, child: &Arc<Model>, column: &Arc<Column>) -> Command {
        let join = Statement::join(
            Statement::table(child),
            Statement::table(&self.model),
            JoinKind::Inner,
            vec![(
                ColumnRef::new(child.id, Arc::clone(column)),
                ColumnRef::new(self.model.id, Arc::clone(&self.old_value)),
            )],
            None,
        );
        Command::Update(Box::new(UpdateStatement {
            target: Arc::clone(child),
            assignments: vec![ColumnMapping::new(self.model.col(&self.new_value), column)],
            from: Some(join),
            where_: None,
        }))
    }
}

fn insert_command(target: &Arc<Model>, rowset: &JsonRowset, mapping: Option<&Arc<Model>>) -> Command {
    let source = rowset.model.columns[1..]
        .iter()
        .fold(SelectStatement::new(&rowset.model), |select, column| {
            select.column(rowset.model.col(column), column)
        })
        .from(Statement::table(&rowset.model))
        .order_by(OrderBy::asc(rowset.model.col(&rowset.row_id)));
    Command::Insert(Box::new(InsertStatement {
        target: Arc::clone(target),
        columns: Vec::new(),
        source: source.into_statement(),
        identity_output: mapping.cloned(),
    }))
}

/// Row `k` must hold `seed + k * increment` and be unsealed, or the mapping
/// table cannot pair output rows with in-memory rows.
fn check_provisional_identities(data: &DataSet, identity: &Column) -> DataResult<()> {
    let Some(spec) = identity.identity else {
        return Ok(());
    };
    let mut expected = spec.seed;
    for (position, row) in data.rows().iter().enumerate() {
        if row.is_pk_sealed() {
            return Err(DataError::InvalidStatement(format!(
                "row {position} of '{}' already has a database key",
                data.model().name
            )));
        }
        let actual = data.value(position, identity).and_then(Value::as_i64);
        if actual != Some(expected) {
            return Err(DataError::InvalidStatement(format!(
                "row {position} of '{}' holds identity {actual:?}, expected provisional value {expected}",
                data.model().name
            )));
        }
        expected = expected.checked_add(spec.increment).ok_or_else(|| {
            DataError::ArgumentOutOfRange(format!(
                "provisional identity of '{}' overflows after row {position}",
                identity.name
            ))
        })?;
    }
    Ok(())
}

/// New keys paired with the provisional key of the row at the same
/// position.
struct ResolvedKeys {
    pairs: Vec<(i64, Value)>,
    /// `true` when the server's `OldValue` numbering disagrees with the
    /// pairing, so the mapping table must be rewritten before use.
    misaligned: bool,
}

/// Pairs the k-th mapped key with row k.
///
/// Every `OldValue` must still be one of the provisional keys and the
/// mapping must cover every row.
fn resolve_pairs(
    data: &DataSet,
    identity: &Column,
    mapped: Vec<(i64, Value)>,
) -> DataResult<ResolvedKeys> {
    let mut provisional = Vec::with_capacity(data.len());
    for row in 0..data.len() {
        let old = data.value(row, identity).and_then(Value::as_i64).ok_or_else(|| {
            DataError::InvalidStatement(format!(
                "row {row} of '{}' has no provisional identity",
                data.model().name
            ))
        })?;
        provisional.push(old);
    }
    let known: HashSet<i64> = provisional.iter().copied().collect();
    if let Some((old, _)) = mapped.iter().find(|(old, _)| !known.contains(old)) {
        return Err(DataError::InvalidStatement(format!(
            "identity mapping OldValue {old} matches no row of '{}'",
            data.model().name
        )));
    }
    if mapped.len() != provisional.len() {
        return Err(DataError::DatabaseError(format!(
            "identity mapping holds {} rows for {} rows of '{}'",
            mapped.len(),
            provisional.len(),
            data.model().name
        )));
    }

    let mut misaligned = false;
    let pairs = provisional
        .into_iter()
        .zip(mapped)
        .map(|(old, (server_old, new))| {
            misaligned |= old != server_old;
            (old, new)
        })
        .collect();
    Ok(ResolvedKeys { pairs, misaligned })
}

/// Writes the k-th new key into row k and returns the old → new map.
fn write_back(
    data: &mut DataSet,
    identity: &Column,
    pairs: &[(i64, Value)],
) -> DataResult<HashMap<i64, Value>> {
    let mut remap = HashMap::with_capacity(pairs.len());
    data.with_identity_suspended(|data| -> DataResult<()> {
        for (row, (old, new)) in pairs.iter().enumerate() {
            data.set_value(row, identity, new.clone())?;
            data.seal_primary_key(row)?;
            remap.insert(*old, new.clone());
        }
        Ok(())
    })?;
    Ok(remap)
}

/// Single-column foreign keys of `child` that reference `identity` of
/// `parent`.
fn fk_columns(child: &Model, parent: &Model, identity: &Column) -> Vec<Arc<Column>> {
    child
        .foreign_keys_to(parent, identity)
        .filter_map(|constraint| match constraint {
            Constraint::ForeignKey(fk) if fk.columns.len() == 1 => Some(Arc::clone(&fk.columns[0])),
            _ => None,
        })
        .collect()
}
