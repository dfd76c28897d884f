/*
    reconcile.rs - Last-writer-wins reconciliation

    Decides whether a remote operation must be skipped because the local
    log already holds a strictly newer write to the same field. Field
    granularity is (subject, metadata, key); an upsert covers every key
    present in the entity it writes.

    `sorted_local` must be ordered by clock reading, newest first: the scan
    stops at the first local operation that is not newer than the remote one.
*/

use crate::oplog::{Operation, Verb};

/// Outcome of reconciling one remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Skip,
}

/// Whether `remote` is superseded by a newer write in `sorted_local`
pub fn is_superseded(remote: &Operation, sorted_local: &[&Operation]) -> bool {
    for local in sorted_local {
        if local.hlc <= remote.hlc {
            break;
        }

        let superseded = match local.verb {
            Verb::Upsert => {
                local.targets(&remote.subject, &remote.metadata)
                    && remote.key.as_deref().map_or(false, |key| local.upsert_contains_key(key))
            }
            Verb::Update | Verb::Delete => {
                local.touches_field(&remote.subject, &remote.metadata, remote.key.as_deref())
            }
        };

        if superseded {
            return true;
        }
    }

    false
}

/// `is_superseded` expressed as an apply/skip decision
pub fn decide(remote: &Operation, sorted_local: &[&Operation]) -> Decision {
    if is_superseded(remote, sorted_local) {
        Decision::Skip
    } else {
        Decision::Apply
    }
}
