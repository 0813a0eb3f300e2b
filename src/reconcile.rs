//! Keeps the children of an aggregate (meal items of a meal, scheduled meals of a
//! plan) in line with the list a client sends.
//!
//! A call is one full reconciliation: descriptors that name a current child update
//! it in place, everything else is created, and current children nobody named are
//! deleted afterwards. Callers run it inside the transaction that also writes the
//! parent, so a failure on any row leaves the previous children in place.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// What to do with a descriptor whose id is not one of the parent's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Treat it as a request to create a new child.
    #[default]
    Lenient,
    /// Reject the whole call with `NotFound`.
    Strict,
}

impl ReconcileMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ReconcileMode::Strict
        } else {
            ReconcileMode::Lenient
        }
    }
}

/// Persistence for one kind of child row.
#[async_trait]
pub trait ChildStore: Send {
    type Row: Send + Sync;
    type Desired: Send + Sync;

    /// Used in error messages, e.g. "meal item".
    const KIND: &'static str;
    /// Request field holding the descriptors, e.g. "meal_items".
    const FIELD: &'static str;

    fn row_id(row: &Self::Row) -> Uuid;
    fn desired_id(desired: &Self::Desired) -> Option<Uuid>;

    async fn load(&mut self, parent: Uuid) -> Result<Vec<Self::Row>, AppError>;
    async fn update(&mut self, id: Uuid, desired: &Self::Desired) -> Result<(), AppError>;
    async fn create(&mut self, parent: Uuid, desired: &Self::Desired) -> Result<Uuid, AppError>;
    async fn delete(&mut self, id: Uuid) -> Result<(), AppError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: Vec<Uuid>,
    pub created: Vec<Uuid>,
    pub deleted: Vec<Uuid>,
}

/// A child id may be named by at most one descriptor per call.
fn reject_repeated_ids<S: ChildStore>(desired: &[S::Desired]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(desired.len());
    for (i, d) in desired.iter().enumerate() {
        if let Some(id) = S::desired_id(d) {
            if !seen.insert(id) {
                return Err(AppError::validation(
                    format!("{}[{i}].id", S::FIELD),
                    "duplicate id",
                ));
            }
        }
    }
    Ok(())
}

pub async fn reconcile<S: ChildStore>(
    store: &mut S,
    parent: Uuid,
    desired: &[S::Desired],
    mode: ReconcileMode,
) -> Result<ReconcileReport, AppError> {
    reject_repeated_ids::<S>(desired)?;

    let current: HashMap<Uuid, S::Row> = store
        .load(parent)
        .await?
        .into_iter()
        .map(|row| (S::row_id(&row), row))
        .collect();

    let mut kept = HashSet::with_capacity(desired.len());
    let mut report = ReconcileReport::default();

    for d in desired {
        match S::desired_id(d) {
            Some(id) if current.contains_key(&id) => {
                store.update(id, d).await?;
                kept.insert(id);
                report.updated.push(id);
            }
            Some(id) if mode == ReconcileMode::Strict => {
                return Err(AppError::not_found(format!("{} {}", S::KIND, id)));
            }
            _ => {
                let id = store.create(parent, d).await?;
                kept.insert(id);
                report.created.push(id);
            }
        }
    }

    for id in current.keys() {
        if !kept.contains(id) {
            store.delete(*id).await?;
            report.deleted.push(*id);
        }
    }

    debug!(
        kind = S::KIND,
        %parent,
        updated = report.updated.len(),
        created = report.created.len(),
        deleted = report.deleted.len(),
        "children reconciled"
    );
    Ok(report)
}

/// Update-path entry point: `None` means the request did not name the children,
/// so they are left as they are.
pub async fn reconcile_named<S: ChildStore>(
    store: &mut S,
    parent: Uuid,
    desired: Option<&[S::Desired]>,
    mode: ReconcileMode,
) -> Result<Option<ReconcileReport>, AppError> {
    match desired {
        Some(desired) => reconcile(store, parent, desired, mode).await.map(Some),
        None => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use super::memory::*;
    use super::*;

    fn input(id: Option<Uuid>, key: Uuid, amount: f64) -> LineInput {
        LineInput { id, key, amount }
    }

    /// Runs one reconciliation as its own unit of work.
    async fn apply(
        table: &mut LineTable,
        parent: Uuid,
        desired: &[LineInput],
        mode: ReconcileMode,
    ) -> Result<ReconcileReport, AppError> {
        let mut tx = table.begin();
        let report = reconcile(&mut tx, parent, desired, mode).await?;
        table.commit(tx);
        Ok(report)
    }

    #[tokio::test]
    async fn creates_everything_for_a_new_parent() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let report = apply(
            &mut table,
            parent,
            &[input(None, a, 1.0), input(None, b, 2.5)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(report.created.len(), 2);
        assert!(report.updated.is_empty());
        assert!(report.deleted.is_empty());
        assert_eq!(table.children(parent).len(), 2);
    }

    #[tokio::test]
    async fn updates_in_place_creates_new_and_deletes_omitted() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        apply(
            &mut table,
            parent,
            &[input(None, a, 1.0), input(None, b, 1.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();
        let kept = table.children(parent).into_iter().find(|r| r.key == a).unwrap();

        let report = apply(
            &mut table,
            parent,
            &[input(Some(kept.id), a, 3.0), input(None, c, 0.5)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(report.updated, vec![kept.id]);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.deleted.len(), 1);

        let rows = table.children(parent);
        assert_eq!(rows.len(), 2);
        let updated = rows.iter().find(|r| r.id == kept.id).unwrap();
        assert_eq!(updated.amount, 3.0);
        assert!(rows.iter().any(|r| r.key == c));
        assert!(!rows.iter().any(|r| r.key == b));
    }

    #[tokio::test]
    async fn same_list_twice_changes_nothing() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        apply(
            &mut table,
            parent,
            &[input(None, Uuid::new_v4(), 1.0), input(None, Uuid::new_v4(), 2.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();

        let echoed: Vec<LineInput> = table
            .children(parent)
            .iter()
            .map(|r| input(Some(r.id), r.key, r.amount))
            .collect();
        let first = table.children(parent);

        let report = apply(&mut table, parent, &echoed, ReconcileMode::Lenient)
            .await
            .unwrap();
        assert_eq!(report.updated.len(), 2);
        assert!(report.created.is_empty());
        assert!(report.deleted.is_empty());
        assert_eq!(table.children(parent), first);

        apply(&mut table, parent, &echoed, ReconcileMode::Lenient)
            .await
            .unwrap();
        assert_eq!(table.children(parent), first);
    }

    #[tokio::test]
    async fn result_content_matches_desired_content() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        let keys: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        apply(
            &mut table,
            parent,
            &[input(None, keys[0], 1.0), input(None, keys[1], 1.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();
        let existing = table.children(parent);

        let desired = vec![
            input(Some(existing[0].id), keys[2], 4.0),
            input(None, keys[3], 0.25),
            input(Some(Uuid::new_v4()), keys[1], 9.0),
        ];
        // keys[1] is still held by existing[1] until the deletes run
        let result = apply(&mut table, parent, &desired, ReconcileMode::Lenient).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));

        let desired = vec![
            input(Some(existing[0].id), keys[2], 4.0),
            input(None, keys[3], 0.25),
        ];
        apply(&mut table, parent, &desired, ReconcileMode::Lenient)
            .await
            .unwrap();

        let mut expected: Vec<(Uuid, u64)> = desired
            .iter()
            .map(|d| (d.key, d.amount.to_bits()))
            .collect();
        expected.sort();
        assert_eq!(table.content(parent), expected);
    }

    #[tokio::test]
    async fn empty_list_deletes_all_children() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        apply(
            &mut table,
            parent,
            &[input(None, Uuid::new_v4(), 1.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();

        let report = apply(&mut table, parent, &[], ReconcileMode::Lenient)
            .await
            .unwrap();
        assert_eq!(report.deleted.len(), 1);
        assert!(table.children(parent).is_empty());
    }

    #[tokio::test]
    async fn foreign_id_is_created_in_lenient_mode() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        let other_parent = Uuid::new_v4();
        apply(
            &mut table,
            other_parent,
            &[input(None, Uuid::new_v4(), 1.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();
        let foreign = table.children(other_parent)[0].id;

        let report = apply(
            &mut table,
            parent,
            &[input(Some(foreign), Uuid::new_v4(), 2.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(report.created.len(), 1);
        assert_ne!(report.created[0], foreign);
        // the other parent's row is not touched
        assert_eq!(table.children(other_parent).len(), 1);
        assert_eq!(table.children(other_parent)[0].amount, 1.0);
    }

    #[tokio::test]
    async fn foreign_id_is_rejected_in_strict_mode() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        apply(
            &mut table,
            parent,
            &[input(None, Uuid::new_v4(), 1.0)],
            ReconcileMode::Strict,
        )
        .await
        .unwrap();
        let before = table.children(parent);

        let err = apply(
            &mut table,
            parent,
            &[
                input(None, Uuid::new_v4(), 1.0),
                input(Some(Uuid::new_v4()), Uuid::new_v4(), 1.0),
            ],
            ReconcileMode::Strict,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(table.children(parent), before);
    }

    #[tokio::test]
    async fn duplicate_key_fails_and_keeps_previous_children() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        apply(
            &mut table,
            parent,
            &[input(None, Uuid::new_v4(), 1.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();
        let before = table.children(parent);

        let dup = Uuid::new_v4();
        let err = apply(
            &mut table,
            parent,
            &[input(None, dup, 1.0), input(None, dup, 2.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(table.children(parent), before);
    }

    #[tokio::test]
    async fn repeated_child_id_is_rejected_before_any_write() {
        for mode in [ReconcileMode::Lenient, ReconcileMode::Strict] {
            let mut table = LineTable::default();
            let parent = Uuid::new_v4();
            apply(&mut table, parent, &[input(None, Uuid::new_v4(), 1.0)], mode)
                .await
                .unwrap();
            let before = table.children(parent);
            let existing = before[0].id;

            let err = apply(
                &mut table,
                parent,
                &[
                    input(Some(existing), Uuid::new_v4(), 1.0),
                    input(Some(existing), Uuid::new_v4(), 2.0),
                ],
                mode,
            )
            .await
            .unwrap_err();

            assert_eq!(err.to_string(), "lines[1].id: duplicate id");
            assert_eq!(table.children(parent), before);
        }
    }

    #[tokio::test]
    async fn unnamed_children_are_left_alone() {
        let mut table = LineTable::default();
        let parent = Uuid::new_v4();
        apply(
            &mut table,
            parent,
            &[input(None, Uuid::new_v4(), 1.0), input(None, Uuid::new_v4(), 2.0)],
            ReconcileMode::Lenient,
        )
        .await
        .unwrap();
        let before = table.children(parent);

        let mut tx = table.begin();
        let report = reconcile_named(&mut tx, parent, None, ReconcileMode::Lenient)
            .await
            .unwrap();
        table.commit(tx);

        assert_eq!(report, None);
        assert_eq!(table.children(parent), before);

        let mut tx = table.begin();
        let report = reconcile_named(&mut tx, parent, Some(&[][..]), ReconcileMode::Lenient)
            .await
            .unwrap();
        table.commit(tx);
        assert_eq!(report.map(|r| r.deleted.len()), Some(2));
        assert!(table.children(parent).is_empty());
    }
}
