use std::collections::BTreeMap;

use async_trait::async_trait;
use idu_urban_core::{
    HierarchyEngine, HierarchyKind, HierarchyNode, HierarchyTx, IduError, IduResult,
};
use proptest::prelude::*;

#[derive(Default)]
struct MemoryTree {
    nodes: BTreeMap<i32, HierarchyNode>,
    next_id: i32,
}

#[async_trait]
impl HierarchyTx for MemoryTree {
    async fn node(&mut self, id: i32) -> IduResult<Option<HierarchyNode>> {
        Ok(self.nodes.get(&id).copied())
    }

    async fn children(&mut self, parent_ids: &[i32]) -> IduResult<Vec<HierarchyNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .copied()
            .collect())
    }

    async fn set_parent(&mut self, id: i32, parent_id: Option<i32>) -> IduResult<()> {
        let node = self.nodes.get_mut(&id).ok_or_else(|| IduError::not_found("node"))?;
        node.parent_id = parent_id;
        Ok(())
    }

    async fn set_level(&mut self, ids: &[i32], level: i32) -> IduResult<()> {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.level = level;
            }
        }
        Ok(())
    }

    async fn reparent_children(&mut self, from: i32, to: Option<i32>) -> IduResult<Vec<i32>> {
        let mut moved = Vec::new();
        for node in self.nodes.values_mut() {
            if node.parent_id == Some(from) {
                node.parent_id = to;
                moved.push(node.id);
            }
        }
        Ok(moved)
    }
}

impl MemoryTree {
    async fn insert(&mut self, engine: &HierarchyEngine, parent_id: Option<i32>) -> IduResult<i32> {
        let level = engine.level_for_parent(&mut *self, parent_id).await?;
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(
            id,
            HierarchyNode {
                id,
                parent_id,
                level,
            },
        );
        Ok(id)
    }

    async fn delete(&mut self, engine: &HierarchyEngine, id: i32) -> IduResult<()> {
        engine.splice_out(&mut *self, id).await?;
        self.nodes.remove(&id);
        Ok(())
    }

    fn pick(&self, index: usize) -> Option<i32> {
        if self.nodes.is_empty() {
            return None;
        }
        self.nodes.keys().nth(index % self.nodes.len()).copied()
    }

    fn depth(&self, id: i32) -> i32 {
        let mut depth = 0;
        let mut current = self.nodes.get(&id).and_then(|node| node.parent_id);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes.get(&parent).and_then(|node| node.parent_id);
        }
        depth
    }

    fn assert_consistent(&self) {
        for node in self.nodes.values() {
            if let Some(parent) = node.parent_id {
                assert!(self.nodes.contains_key(&parent), "node {} is orphaned", node.id);
            }
            assert_eq!(node.level, self.depth(node.id), "level of node {}", node.id);
        }
    }
}

fn engine() -> HierarchyEngine {
    HierarchyEngine::new(HierarchyKind::Territory, 256)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

#[tokio::test]
async fn deleting_middle_node_relevels_grandchild() -> IduResult<()> {
    let engine = engine();
    let mut tree = MemoryTree::default();
    let a = tree.insert(&engine, None).await?;
    let b = tree.insert(&engine, Some(a)).await?;
    let c = tree.insert(&engine, Some(b)).await?;
    assert_eq!(tree.nodes[&c].level, 2);
    tree.delete(&engine, b).await?;
    assert_eq!(tree.nodes[&c].parent_id, Some(a));
    assert_eq!(tree.nodes[&c].level, 1);
    tree.assert_consistent();
    Ok(())
}

#[tokio::test]
async fn moving_under_own_descendant_is_rejected() -> IduResult<()> {
    let engine = engine();
    let mut tree = MemoryTree::default();
    let a = tree.insert(&engine, None).await?;
    let b = tree.insert(&engine, Some(a)).await?;
    let c = tree.insert(&engine, Some(b)).await?;
    let err = engine.move_node(&mut tree, a, Some(c)).await.expect_err("cycle");
    assert!(matches!(err, IduError::HierarchyCycle { .. }));
    let err = engine.move_node(&mut tree, a, Some(a)).await.expect_err("self parent");
    assert!(matches!(err, IduError::HierarchyCycle { .. }));
    tree.assert_consistent();
    Ok(())
}

#[tokio::test]
async fn moving_subtree_relevels_every_descendant() -> IduResult<()> {
    let engine = engine();
    let mut tree = MemoryTree::default();
    let root = tree.insert(&engine, None).await?;
    let other = tree.insert(&engine, None).await?;
    let deep = tree.insert(&engine, Some(other)).await?;
    let mid = tree.insert(&engine, Some(root)).await?;
    let leaf = tree.insert(&engine, Some(mid)).await?;
    let leaf2 = tree.insert(&engine, Some(leaf)).await?;
    let outcome = engine.move_node(&mut tree, mid, Some(deep)).await?;
    assert_eq!(outcome.level, 2);
    assert_eq!(outcome.relevelled, 3);
    assert_eq!(tree.nodes[&leaf].level, 3);
    assert_eq!(tree.nodes[&leaf2].level, 4);
    tree.assert_consistent();
    Ok(())
}

#[tokio::test]
async fn missing_parent_is_reported() {
    let engine = engine();
    let mut tree = MemoryTree::default();
    let err = tree.insert(&engine, Some(99)).await.expect_err("missing");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
}

#[tokio::test]
async fn depth_limit_is_enforced() -> IduResult<()> {
    let engine = HierarchyEngine::new(HierarchyKind::UrbanFunction, 2);
    let mut tree = MemoryTree::default();
    let a = tree.insert(&engine, None).await?;
    let b = tree.insert(&engine, Some(a)).await?;
    let c = tree.insert(&engine, Some(b)).await?;
    let err = tree.insert(&engine, Some(c)).await.expect_err("too deep");
    assert!(matches!(err, IduError::Validation { .. }));
    Ok(())
}

#[derive(Clone, Debug)]
enum TreeOp {
    Insert(Option<usize>),
    Move(usize, Option<usize>),
    Delete(usize),
}

fn tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        3 => proptest::option::of(any::<usize>()).prop_map(TreeOp::Insert),
        2 => (any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(node, parent)| TreeOp::Move(node, parent)),
        1 => any::<usize>().prop_map(TreeOp::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn levels_match_ancestor_count(ops in proptest::collection::vec(tree_op(), 1..60)) {
        let runtime = runtime();
        runtime.block_on(async {
            let engine = engine();
            let mut tree = MemoryTree::default();
            for op in ops {
                match op {
                    TreeOp::Insert(parent) => {
                        let parent = parent.and_then(|index| tree.pick(index));
                        tree.insert(&engine, parent).await.expect("insert");
                    }
                    TreeOp::Move(node, parent) => {
                        let Some(node) = tree.pick(node) else { continue };
                        let parent = parent.and_then(|index| tree.pick(index));
                        match engine.move_node(&mut tree, node, parent).await {
                            Ok(_) | Err(IduError::HierarchyCycle { .. }) => {}
                            Err(err) => panic!("unexpected move failure: {err}"),
                        }
                    }
                    TreeOp::Delete(node) => {
                        let Some(node) = tree.pick(node) else { continue };
                        tree.delete(&engine, node).await.expect("delete");
                    }
                }
                tree.assert_consistent();
            }
        });
    }
}
