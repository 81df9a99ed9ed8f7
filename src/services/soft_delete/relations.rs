//! Recorrido de relaciones declaradas en las políticas
//!
//! Conteos para los analizadores y el conjunto de registros que toca un
//! borrado (raíz + cascadas opcionales elegidas + cascadas automáticas
//! recursivas), sin duplicados.

use std::collections::{BTreeSet, VecDeque};

use super::options::{CascadeDecision, DeletionOptions};
use super::policy::{policy_for, CascadeRelation, ParentRelation};
use crate::models::{LifecycleRecord, RecordRef, RecordScope};
use crate::repositories::{load_record, FleetTx};
use crate::utils::errors::AppResult;

/// Ids del destino de una cascada que apuntan a `parent_id`
pub async fn cascade_ids(
    tx: &mut dyn FleetTx,
    relation: &CascadeRelation,
    parent_id: i64,
    scope: RecordScope,
) -> AppResult<Vec<i64>> {
    tx.related_ids(relation.target, relation.key, parent_id, scope).await
}

/// Padre inmediato del registro, si la clave está informada y existe
pub async fn load_parent(
    tx: &mut dyn FleetTx,
    record: &LifecycleRecord,
    relation: &ParentRelation,
) -> AppResult<Option<LifecycleRecord>> {
    match record.foreign_key(relation.key) {
        Some(parent_id) => load_record(tx, RecordRef::new(relation.kind, parent_id)).await,
        None => Ok(None),
    }
}

/// Registros vigentes que se descartarán junto a `root`
pub async fn deletion_set(
    tx: &mut dyn FleetTx,
    root: &LifecycleRecord,
    options: &DeletionOptions,
) -> AppResult<BTreeSet<RecordRef>> {
    let mut members = BTreeSet::new();
    let mut pending = VecDeque::new();
    members.insert(root.record_ref());
    pending.push_back(root.record_ref());

    for relation in policy_for(root.kind()).cascade_relations {
        let chosen = relation.optional && options.decision_for(relation.name) == Some(CascadeDecision::Delete);
        if !chosen || !relation.applies_to(root) {
            continue;
        }
        for id in cascade_ids(tx, relation, root.id(), RecordScope::Kept).await? {
            let member = RecordRef::new(relation.target, id);
            if members.insert(member) {
                pending.push_back(member);
            }
        }
    }

    while let Some(current) = pending.pop_front() {
        for relation in policy_for(current.kind).cascade_relations {
            if relation.optional {
                continue;
            }
            if relation.condition.is_some() {
                let applies = match load_record(tx, current).await? {
                    Some(record) => relation.applies_to(&record),
                    None => false,
                };
                if !applies {
                    continue;
                }
            }

            for id in cascade_ids(tx, relation, current.id, RecordScope::Kept).await? {
                let member = RecordRef::new(relation.target, id);
                if members.insert(member) {
                    pending.push_back(member);
                }
            }
        }
    }

    Ok(members)
}

/// Desvincula los registros vigentes que apuntan a `member`
pub async fn nullify_references(tx: &mut dyn FleetTx, member: RecordRef) -> AppResult<u64> {
    let mut total = 0;

    for relation in policy_for(member.kind).nullify_relations {
        let affected = tx.nullify(relation.target, relation.key, member.id).await?;
        if affected == 0 {
            continue;
        }
        total += affected;

        if relation.notify {
            log::info!(
                "🔗 {} registros de {} desvinculados de {}",
                affected,
                relation.target,
                member
            );
        } else {
            log::debug!("🔗 {} {} desvinculados de {}", affected, relation.name, member);
        }
    }

    Ok(total)
}
