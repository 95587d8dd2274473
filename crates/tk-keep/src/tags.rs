use std::collections::BTreeSet;

use tk_store::{Claim, ClaimOp};
use tk_types::{attr, ObjectId};

/// One claim against a node's `tag` attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagMutation {
    pub op: ClaimOp,
    pub tag: String,
}

impl TagMutation {
    pub fn claim(&self, node: ObjectId) -> Claim {
        match self.op {
            ClaimOp::Set => Claim::set_attr(node, attr::TAG, self.tag.clone()),
            ClaimOp::Add => Claim::add_attr(node, attr::TAG, self.tag.clone()),
            ClaimOp::Delete => Claim::del_attr(node, attr::TAG, self.tag.clone()),
        }
    }
}

/// Mutations taking a node's tags from `existing` to `wanted`, in apply order.
///
/// Equal sets need nothing. A single wanted tag is one `Set`. Otherwise every
/// tag only in `wanted` is added, then every tag only in `existing` is
/// deleted. Shared tags are never touched.
pub fn reconcile(existing: &BTreeSet<String>, wanted: &BTreeSet<String>) -> Vec<TagMutation> {
    if existing == wanted {
        return Vec::new();
    }
    if wanted.len() == 1 {
        return wanted
            .iter()
            .map(|tag| TagMutation {
                op: ClaimOp::Set,
                tag: tag.clone(),
            })
            .collect();
    }

    let adds = wanted.difference(existing).map(|tag| TagMutation {
        op: ClaimOp::Add,
        tag: tag.clone(),
    });
    let deletes = existing.difference(wanted).map(|tag| TagMutation {
        op: ClaimOp::Delete,
        tag: tag.clone(),
    });
    adds.chain(deletes).collect()
}
