//! Merging one table across all feeds.
//!
//! For each table the [`LineMerger`]:
//!
//! 1. picks the table rule and the field set every written feed shares,
//! 2. walks each feed's rows newest feed first, asking the rule for a
//!    [`RowPlan`],
//! 3. resolves every field of a kept row (overrides, scoping, remapped and
//!    skipped references),
//! 4. checks the resolved row against the reference registry and drops
//!    duplicates and dangling references,
//! 5. drops rows whose content was already written, and
//! 6. buffers the rest for the output archive.

use std::collections::HashSet;
use std::path::Path;

use gtfs_schema::{Field, Reference, TableDescriptor};

use crate::archive::TableData;
use crate::feed::MergeType;
use crate::registry::{FieldCheck, Violation};

use super::context::{Flow, MergeContext, RunState};
use super::frame::{Overrides, RowFrame, RowPlan, SkipReason};
use super::result::ScopedKey;
use super::rules::TableRule;
use super::table::{Disposition, TableKind};
use super::writer::{TableOutput, TableWriter};

/// Merges one table from every feed.
pub struct LineMerger<'a> {
    ctx: &'a MergeContext<'a>,
    table: &'a TableDescriptor,
    kind: TableKind,
    inputs: Vec<Option<TableData>>,
    dispositions: Vec<Disposition>,
}

/// Per-table state once the rule and shared fields are known.
struct TableRun<'a> {
    rule: TableRule,
    fields: Vec<&'static Field>,
    key_field: Option<&'static str>,
    seen: HashSet<Vec<String>>,
    writer: TableWriter,
    ctx: &'a MergeContext<'a>,
    table: &'a TableDescriptor,
    kind: TableKind,
}

impl<'a> LineMerger<'a> {
    /// `inputs[i]` is feed `i`'s copy of the table, if it has one.
    #[must_use]
    pub fn new(
        ctx: &'a MergeContext<'a>,
        table: &'a TableDescriptor,
        inputs: Vec<Option<TableData>>,
    ) -> Self {
        let kind = TableKind::of(table.name);
        let dispositions = (0..inputs.len())
            .map(|idx| kind.disposition(ctx, ctx.role(idx)))
            .collect();
        Self {
            ctx,
            table,
            kind,
            inputs,
            dispositions,
        }
    }

    /// Merge every feed's rows and return the buffered table, or `None` when
    /// no row was written.
    ///
    /// # Errors
    /// Halts on I/O errors and on conditions that fail the merge.
    pub fn run(self, destination: &Path, state: &mut RunState) -> Flow<Option<TableOutput>> {
        if self.inputs.iter().any(Option::is_some) {
            state.registry.open_table(self.table.name);
        }

        let written: Vec<&TableData> = self
            .inputs
            .iter()
            .zip(&self.dispositions)
            .filter(|(_, d)| **d == Disposition::Write)
            .filter_map(|(data, _)| data.as_ref())
            .collect();
        let rule = TableRule::select(
            self.kind,
            self.table,
            self.ctx,
            &self.inputs,
            &written,
            state,
        )?;
        let key_field = rule.key_field(self.table);

        let fields = self.shared_fields(state);
        if fields.is_empty() {
            return Ok(None);
        }
        let header = fields.iter().map(|f| f.name).collect();
        let mut run = TableRun {
            rule,
            fields,
            key_field,
            seen: HashSet::new(),
            writer: TableWriter::new(destination, self.table.name, header),
            ctx: self.ctx,
            table: self.table,
            kind: self.kind,
        };

        for (idx, data) in self.inputs.iter().enumerate() {
            let Some(data) = data else { continue };
            match self.dispositions[idx] {
                Disposition::Skip => {
                    tracing::debug!(table = self.table.name, feed = idx, "table skipped for feed");
                }
                Disposition::CheckOnly => run.check_feed(idx, data, state)?,
                Disposition::Write => {
                    if !self.has_key_column(idx, data, state) {
                        tracing::warn!(
                            table = self.table.name,
                            feed = %self.ctx.feeds[idx].version.id,
                            "key field missing from table; skipping it for this feed"
                        );
                        continue;
                    }
                    run.merge_feed(idx, data, state)?;
                }
            }
        }

        let lines = run.writer.rows();
        tracing::info!(table = self.table.name, lines, "table merged");
        Ok(run.writer.finish()?)
    }

    fn has_key_column(&self, idx: usize, data: &TableData, state: &RunState) -> bool {
        self.table.key_field.is_none_or(|key| {
            data.has_column(key) || (key == "agency_id" && state.agency_ids[idx].is_some())
        })
    }

    /// Schema fields present in every written copy of the table. A blank
    /// `agency_id` filled from a synthesized agency counts as present.
    fn shared_fields(&self, state: &RunState) -> Vec<&'static Field> {
        let copies: Vec<(usize, &TableData)> = self
            .inputs
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.dispositions[*idx] == Disposition::Write)
            .filter_map(|(idx, data)| data.as_ref().map(|d| (idx, d)))
            .filter(|(idx, data)| self.has_key_column(*idx, data, state))
            .collect();
        if copies.is_empty() {
            return Vec::new();
        }
        self.table
            .fields
            .iter()
            .filter(|field| {
                copies.iter().all(|(idx, data)| {
                    data.has_column(field.name)
                        || (field.name == "agency_id" && state.agency_ids[*idx].is_some())
                })
            })
            .collect()
    }
}

impl TableRun<'_> {
    fn check_feed(&self, idx: usize, data: &TableData, state: &mut RunState) -> Flow<()> {
        self.rule.start_check(data, idx, state);
        let agency_id = state.agency_ids[idx].clone();
        for (n, record) in data.records().iter().enumerate() {
            let frame = RowFrame::new(
                self.table,
                idx,
                self.ctx.role(idx),
                &self.ctx.feeds[idx].scope,
                n + 2,
                data,
                record,
                agency_id.as_deref(),
            );
            self.rule.check_row(&frame, state)?;
        }
        Ok(())
    }

    fn merge_feed(&mut self, idx: usize, data: &TableData, state: &mut RunState) -> Flow<()> {
        let ctx = self.ctx;
        let scope = ctx.feeds[idx].scope.as_str();
        let agency_id = state.agency_ids[idx].clone();
        let role = ctx.role(idx);
        for (n, record) in data.records().iter().enumerate() {
            let frame = RowFrame::new(
                self.table,
                idx,
                role,
                scope,
                n + 2,
                data,
                record,
                agency_id.as_deref(),
            );
            let plan = self.rule.plan_row(&frame, ctx, state)?;
            self.apply(&frame, plan, state)?;
        }
        Ok(())
    }

    fn apply(&mut self, frame: &RowFrame<'_>, plan: RowPlan, state: &mut RunState) -> Flow<()> {
        match plan.skip {
            Some(skip) => {
                tracing::debug!(
                    table = self.table.name,
                    line = frame.line,
                    key = frame.key(),
                    reason = %skip.reason,
                    "row skipped"
                );
                state.result.skip(skip.record);
            }
            None => {
                if let Some(values) = self.resolve_row(frame, &plan.overrides, state) {
                    self.write_checked(frame, values, state)?;
                }
            }
        }
        for extra in &plan.extras {
            let values = self
                .fields
                .iter()
                .map(|f| {
                    extra
                        .get(f.name)
                        .cloned()
                        .unwrap_or_else(|| frame.raw(f.name).to_owned())
                })
                .collect();
            self.write_checked(frame, values, state)?;
        }
        Ok(())
    }

    /// Output values for every shared field, or `None` when the row
    /// references something that was dropped.
    fn resolve_row(
        &self,
        frame: &RowFrame<'_>,
        overrides: &Overrides,
        state: &mut RunState,
    ) -> Option<Vec<String>> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let Some(value) = self.resolve_field(frame, field, overrides, state) else {
                tracing::debug!(
                    table = self.table.name,
                    line = frame.line,
                    field = field.name,
                    value = frame.raw(field.name),
                    "row references a skipped record"
                );
                state.result.skip(Some(frame.scoped_key()));
                return None;
            };
            values.push(value);
        }
        Some(values)
    }

    fn resolve_field(
        &self,
        frame: &RowFrame<'_>,
        field: &Field,
        overrides: &Overrides,
        state: &mut RunState,
    ) -> Option<String> {
        if let Some(value) = overrides.get(field.name) {
            return Some(value.clone());
        }
        let raw = frame.raw(field.name);
        if raw.is_empty() {
            return Some(String::new());
        }
        let namespace = self.ctx.merge_type == MergeType::Namespace;
        let scoped = || self.ctx.config.scoped(frame.scope, raw);

        let Some(target) = field.reference else {
            let is_key = self.table.key_field == Some(field.name);
            return Some(if namespace && is_key { scoped() } else { raw.to_owned() });
        };

        let source_keys: Vec<ScopedKey> = target_tables(target)
            .into_iter()
            .map(|table| ScopedKey::new(table, frame.scope, raw))
            .collect();
        let remapped = source_keys
            .iter()
            .find_map(|key| state.result.resolve_remap(key));
        let shadowed = remapped.is_none()
            && target == Reference::Service
            && self.ctx.shadows_service(frame.role, raw);
        let value =
            remapped.unwrap_or_else(|| if namespace { scoped() } else { raw.to_owned() });

        if source_keys.iter().any(|key| state.result.is_skipped(key)) {
            // A service can survive its calendar row through calendar_dates,
            // and a flex stop id may still name a kept location.
            let retained = target.has_alternatives()
                && !shadowed
                && state.registry.resolves(target, &value);
            if !retained {
                return None;
            }
        }
        Some(value)
    }

    /// Check a resolved row against the registry and the rows already
    /// written, then buffer it.
    fn write_checked(
        &mut self,
        frame: &RowFrame<'_>,
        values: Vec<String>,
        state: &mut RunState,
    ) -> Flow<()> {
        if let Some(violation) = self.register(frame.line, &values, state) {
            tracing::debug!(%violation, "row rejected");
            match violation {
                Violation::DuplicateKey { field, value, .. } => {
                    state.result.conflict(self.table.name, &field, &value);
                    state.result.skip(None);
                }
                Violation::MissingReference { .. } => {
                    state.result.skip(Some(frame.scoped_key()));
                }
            }
            return Ok(());
        }

        if self.seen.contains(&values) {
            tracing::debug!(
                table = self.table.name,
                line = frame.line,
                reason = %SkipReason::Duplicate,
                "identical row already written"
            );
            state.result.skip(None);
            return Ok(());
        }

        if self.kind.defines_services()
            && let Some(idx) = self.fields.iter().position(|f| f.name == "service_id")
        {
            state.result.service_ids.insert(values[idx].clone());
        }
        self.writer.write_row(&values)?;
        self.seen.insert(values);
        Ok(())
    }

    /// Run every field through the registry: plain fields first so a
    /// dangling reference is found before any key is registered.
    fn register(&self, line: usize, values: &[String], state: &mut RunState) -> Option<Violation> {
        let key_value = self
            .table
            .key_field
            .and_then(|k| self.fields.iter().position(|f| f.name == k))
            .map_or("", |idx| values[idx].as_str());
        let (identifying, plain): (Vec<_>, Vec<_>) = self
            .fields
            .iter()
            .zip(values)
            .partition(|(f, _)| self.table.is_identifying(f.name));

        plain.into_iter().chain(identifying).find_map(|(field, value)| {
            state
                .registry
                .check(&FieldCheck {
                    table: self.table,
                    field,
                    value,
                    key_value,
                    key_field: self.key_field.unwrap_or_default(),
                    order_field: self.table.order_field,
                    line,
                })
                .into_iter()
                .next()
        })
    }
}

/// Tables whose dropped and remapped keys a reference can resolve through.
/// Service keys are recorded under `calendar`.
fn target_tables(target: Reference) -> Vec<&'static str> {
    match target {
        Reference::Table { table, .. } => vec![table],
        Reference::Service => vec!["calendar"],
        Reference::OneOf(targets) => targets.iter().map(|(table, _)| *table).collect(),
    }
}
