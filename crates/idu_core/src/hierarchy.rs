//! Level maintenance for self-referencing trees.
//!
//! The engine never touches storage directly. Each write path hands it a
//! [`HierarchyTx`] bound to its open transaction, so every read and write the
//! engine performs commits or rolls back together with the caller's own rows.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{IduError, IduResult};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HierarchyKind {
    Territory,
    UrbanFunction,
    PhysicalObjectFunction,
}

impl HierarchyKind {
    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Territory => "territory",
            Self::UrbanFunction => "urban function",
            Self::PhysicalObjectFunction => "physical object function",
        }
    }

    /// Key for `pg_advisory_xact_lock`; one lock per hierarchy.
    pub fn lock_key(self) -> i64 {
        match self {
            Self::Territory => 0x1d0_0001,
            Self::UrbanFunction => 0x1d0_0002,
            Self::PhysicalObjectFunction => 0x1d0_0003,
        }
    }

    pub fn has_list_label(self) -> bool {
        !matches!(self, Self::Territory)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HierarchyNode {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub level: i32,
}

/// Transaction-scoped access to one hierarchy table.
#[async_trait]
pub trait HierarchyTx: Send {
    async fn node(&mut self, id: i32) -> IduResult<Option<HierarchyNode>>;
    async fn children(&mut self, parent_ids: &[i32]) -> IduResult<Vec<HierarchyNode>>;
    async fn set_parent(&mut self, id: i32, parent_id: Option<i32>) -> IduResult<()>;
    async fn set_level(&mut self, ids: &[i32], level: i32) -> IduResult<()>;
    /// Rewrites `parent_id` of every direct child of `from`; returns the moved ids.
    async fn reparent_children(&mut self, from: i32, to: Option<i32>) -> IduResult<Vec<i32>>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MoveOutcome {
    pub previous_parent: Option<i32>,
    pub level: i32,
    pub relevelled: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpliceOutcome {
    pub parent_id: Option<i32>,
    pub children: Vec<i32>,
    pub relevelled: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct HierarchyEngine {
    kind: HierarchyKind,
    max_depth: usize,
}

impl HierarchyEngine {
    pub fn new(kind: HierarchyKind, max_depth: usize) -> Self {
        Self {
            kind,
            max_depth: max_depth.max(1),
        }
    }

    pub fn kind(&self) -> HierarchyKind {
        self.kind
    }

    /// Level of a new node: 0 at the root, otherwise one below its parent.
    pub async fn level_for_parent<T>(&self, tx: &mut T, parent_id: Option<i32>) -> IduResult<i32>
    where
        T: HierarchyTx + ?Sized,
    {
        let Some(parent_id) = parent_id else {
            return Ok(0);
        };
        let parent = tx.node(parent_id).await?.ok_or_else(|| {
            IduError::missing_reference(format!(
                "parent {} {parent_id} does not exist",
                self.kind.entity_name()
            ))
        })?;
        let level = parent.level + 1;
        self.check_depth(level)?;
        Ok(level)
    }

    /// Rejects a parent that is the node itself or one of its descendants.
    pub async fn ensure_acyclic<T>(&self, tx: &mut T, id: i32, new_parent: Option<i32>) -> IduResult<()>
    where
        T: HierarchyTx + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut current = new_parent;
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(IduError::hierarchy_cycle(format!(
                    "{} {id} cannot become a descendant of itself",
                    self.kind.entity_name()
                )));
            }
            if !seen.insert(ancestor) || seen.len() > self.max_depth {
                return Err(IduError::hierarchy_cycle(format!(
                    "ancestor chain of {} {ancestor} does not terminate",
                    self.kind.entity_name()
                )));
            }
            let node = tx.node(ancestor).await?.ok_or_else(|| {
                IduError::missing_reference(format!(
                    "parent {} {ancestor} does not exist",
                    self.kind.entity_name()
                ))
            })?;
            current = node.parent_id;
        }
        Ok(())
    }

    /// Re-parents `id` and relevels its whole subtree.
    pub async fn move_node<T>(&self, tx: &mut T, id: i32, new_parent: Option<i32>) -> IduResult<MoveOutcome>
    where
        T: HierarchyTx + ?Sized,
    {
        let node = tx.node(id).await?.ok_or_else(|| {
            IduError::not_found(format!("{} {id} not found", self.kind.entity_name()))
        })?;
        if node.parent_id == new_parent {
            return Ok(MoveOutcome {
                previous_parent: node.parent_id,
                level: node.level,
                relevelled: 0,
            });
        }
        self.ensure_acyclic(tx, id, new_parent).await?;
        let level = self.level_for_parent(tx, new_parent).await?;
        tx.set_parent(id, new_parent).await?;
        let mut relevelled = 0;
        if level != node.level {
            tx.set_level(&[id], level).await?;
            relevelled = 1 + self.cascade_levels(tx, vec![id], level).await?;
        }
        Ok(MoveOutcome {
            previous_parent: node.parent_id,
            level,
            relevelled,
        })
    }

    /// Pushes `level + 1` down to the children of `frontier`, one generation at a time.
    pub async fn cascade_levels<T>(&self, tx: &mut T, mut frontier: Vec<i32>, level: i32) -> IduResult<usize>
    where
        T: HierarchyTx + ?Sized,
    {
        let mut level = level;
        let mut touched = 0;
        while !frontier.is_empty() {
            let children = tx.children(&frontier).await?;
            if children.is_empty() {
                break;
            }
            level += 1;
            self.check_depth(level)?;
            let stale: Vec<i32> = children
                .iter()
                .filter(|child| child.level != level)
                .map(|child| child.id)
                .collect();
            if !stale.is_empty() {
                tx.set_level(&stale, level).await?;
                touched += stale.len();
            }
            frontier = children.into_iter().map(|child| child.id).collect();
        }
        Ok(touched)
    }

    /// Hands the children of `id` to its parent and relevels them. The caller
    /// deletes the node itself once its other dependents are handled.
    pub async fn splice_out<T>(&self, tx: &mut T, id: i32) -> IduResult<SpliceOutcome>
    where
        T: HierarchyTx + ?Sized,
    {
        let node = tx.node(id).await?.ok_or_else(|| {
            IduError::not_found(format!("{} {id} not found", self.kind.entity_name()))
        })?;
        let children = tx.reparent_children(id, node.parent_id).await?;
        let mut relevelled = 0;
        if !children.is_empty() {
            let level = self.level_for_parent(tx, node.parent_id).await?;
            tx.set_level(&children, level).await?;
            relevelled = children.len() + self.cascade_levels(tx, children.clone(), level).await?;
        }
        Ok(SpliceOutcome {
            parent_id: node.parent_id,
            children,
            relevelled,
        })
    }

    fn check_depth(&self, level: i32) -> IduResult<()> {
        if level < 0 || level as usize > self.max_depth {
            return Err(IduError::validation(format!(
                "{} hierarchy deeper than {} levels",
                self.kind.entity_name(),
                self.max_depth
            )));
        }
        Ok(())
    }
}

/// Dotted position labels of the function dictionaries ("2", "2.1", "2.1.3").
pub mod list_label {
    pub fn child_label(parent_label: Option<&str>, position: usize) -> String {
        match parent_label {
            Some(parent) => format!("{parent}.{position}"),
            None => position.to_string(),
        }
    }

    /// Last segment of a label, if it parses.
    pub fn position(label: &str) -> Option<u32> {
        label.rsplit('.').next().and_then(|tail| tail.parse().ok())
    }

    /// Numbers a sibling group 1..n, keeping the current order. Unlabelled
    /// siblings go to the end in id order. Returns only the changed labels.
    pub fn renumber(parent_label: Option<&str>, siblings: &[(i32, Option<String>)]) -> Vec<(i32, String)> {
        let mut ordered: Vec<&(i32, Option<String>)> = siblings.iter().collect();
        ordered.sort_by_key(|(id, label)| {
            (
                label.as_deref().and_then(position).unwrap_or(u32::MAX),
                *id,
            )
        });
        ordered
            .into_iter()
            .enumerate()
            .filter_map(|(index, (id, label))| {
                let next = child_label(parent_label, index + 1);
                (label.as_deref() != Some(next.as_str())).then_some((*id, next))
            })
            .collect()
    }
}
