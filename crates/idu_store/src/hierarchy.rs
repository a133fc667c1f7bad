use std::collections::VecDeque;

use async_trait::async_trait;
use sea_orm::DatabaseTransaction;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Query, SelectStatement};

use idu_urban_core::hierarchy::list_label;
use idu_urban_core::{HierarchyKind, HierarchyNode, HierarchyTx, IduResult};

use crate::db::{PhysicalObjectFunctionsDict, TerritoriesData, UrbanFunctionsDict};
use crate::store::{col_name, exec, query_all, query_one};

/// Table and column names of one self-referencing hierarchy.
#[derive(Clone, Debug)]
pub(crate) struct HierarchyTable {
    pub table: String,
    pub id: String,
    pub parent: String,
    pub level: String,
    pub label: Option<String>,
}

impl HierarchyTable {
    pub fn of(kind: HierarchyKind) -> Self {
        match kind {
            HierarchyKind::Territory => Self {
                table: col_name(TerritoriesData::Table),
                id: col_name(TerritoriesData::TerritoryId),
                parent: col_name(TerritoriesData::ParentId),
                level: col_name(TerritoriesData::Level),
                label: None,
            },
            HierarchyKind::UrbanFunction => Self {
                table: col_name(UrbanFunctionsDict::Table),
                id: col_name(UrbanFunctionsDict::UrbanFunctionId),
                parent: col_name(UrbanFunctionsDict::ParentId),
                level: col_name(UrbanFunctionsDict::Level),
                label: Some(col_name(UrbanFunctionsDict::ListLabel)),
            },
            HierarchyKind::PhysicalObjectFunction => Self {
                table: col_name(PhysicalObjectFunctionsDict::Table),
                id: col_name(PhysicalObjectFunctionsDict::PhysicalObjectFunctionId),
                parent: col_name(PhysicalObjectFunctionsDict::ParentId),
                level: col_name(PhysicalObjectFunctionsDict::Level),
                label: Some(col_name(PhysicalObjectFunctionsDict::ListLabel)),
            },
        }
    }

    pub fn table(&self) -> Alias {
        Alias::new(self.table.as_str())
    }

    pub fn col(&self, name: &str) -> Alias {
        Alias::new(name)
    }

    fn select_nodes(&self) -> SelectStatement {
        Query::select()
            .from(self.table())
            .column(self.col(&self.id))
            .column(self.col(&self.parent))
            .column(self.col(&self.level))
            .to_owned()
    }

    fn read_node(&self, row: &sea_orm::QueryResult) -> IduResult<HierarchyNode> {
        Ok(HierarchyNode {
            id: row.try_get("", &self.id)?,
            parent_id: row.try_get("", &self.parent)?,
            level: row.try_get("", &self.level)?,
        })
    }

    pub fn parent_is(&self, parent_id: Option<i32>) -> Expr {
        match parent_id {
            Some(parent) => Expr::col(self.col(&self.parent)).eq(parent),
            None => Expr::col(self.col(&self.parent)).is_null(),
        }
    }
}

/// [`HierarchyTx`] over an open SQL transaction.
pub(crate) struct SqlHierarchy<'a> {
    tx: &'a DatabaseTransaction,
    table: HierarchyTable,
}

impl<'a> SqlHierarchy<'a> {
    pub fn new(tx: &'a DatabaseTransaction, kind: HierarchyKind) -> Self {
        Self {
            tx,
            table: HierarchyTable::of(kind),
        }
    }
}

#[async_trait]
impl HierarchyTx for SqlHierarchy<'_> {
    async fn node(&mut self, id: i32) -> IduResult<Option<HierarchyNode>> {
        let select = self
            .table
            .select_nodes()
            .and_where(Expr::col(self.table.col(&self.table.id)).eq(id))
            .to_owned();
        match query_one(self.tx, &select).await? {
            Some(row) => Ok(Some(self.table.read_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn children(&mut self, parent_ids: &[i32]) -> IduResult<Vec<HierarchyNode>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let select = self
            .table
            .select_nodes()
            .and_where(Expr::col(self.table.col(&self.table.parent)).is_in(parent_ids.iter().copied()))
            .to_owned();
        query_all(self.tx, &select)
            .await?
            .iter()
            .map(|row| self.table.read_node(row))
            .collect()
    }

    async fn set_parent(&mut self, id: i32, parent_id: Option<i32>) -> IduResult<()> {
        let update = Query::update()
            .table(self.table.table())
            .values([(self.table.col(&self.table.parent), parent_id.into())])
            .and_where(Expr::col(self.table.col(&self.table.id)).eq(id))
            .to_owned();
        exec(self.tx, &update).await?;
        Ok(())
    }

    async fn set_level(&mut self, ids: &[i32], level: i32) -> IduResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let update = Query::update()
            .table(self.table.table())
            .values([(self.table.col(&self.table.level), level.into())])
            .and_where(Expr::col(self.table.col(&self.table.id)).is_in(ids.iter().copied()))
            .to_owned();
        exec(self.tx, &update).await?;
        Ok(())
    }

    async fn reparent_children(&mut self, from: i32, to: Option<i32>) -> IduResult<Vec<i32>> {
        let children = self.children(&[from]).await?;
        let ids: Vec<i32> = children.into_iter().map(|child| child.id).collect();
        if ids.is_empty() {
            return Ok(ids);
        }
        let update = Query::update()
            .table(self.table.table())
            .values([(self.table.col(&self.table.parent), to.into())])
            .and_where(Expr::col(self.table.col(&self.table.parent)).eq(from))
            .to_owned();
        exec(self.tx, &update).await?;
        Ok(ids)
    }
}

/// Clears the list labels of `ids` so the next relabel appends them.
pub(crate) async fn clear_labels(tx: &DatabaseTransaction, kind: HierarchyKind, ids: &[i32]) -> IduResult<()> {
    let table = HierarchyTable::of(kind);
    let Some(label) = table.label.as_deref() else {
        return Ok(());
    };
    if ids.is_empty() {
        return Ok(());
    }
    let update = Query::update()
        .table(table.table())
        .values([(table.col(label), Option::<String>::None.into())])
        .and_where(Expr::col(table.col(&table.id)).is_in(ids.iter().copied()))
        .to_owned();
    exec(tx, &update).await?;
    Ok(())
}

/// Renumbers the children of `parent_id` and carries changed prefixes down
/// through their subtrees. Returns the number of labels rewritten.
pub(crate) async fn relabel_group(
    tx: &DatabaseTransaction,
    kind: HierarchyKind,
    parent_id: Option<i32>,
) -> IduResult<usize> {
    let table = HierarchyTable::of(kind);
    let Some(label) = table.label.clone() else {
        return Ok(0);
    };
    let mut rewritten = 0;
    let mut pending = VecDeque::from([parent_id]);
    while let Some(parent) = pending.pop_front() {
        let parent_label = match parent {
            Some(parent) => {
                let select = Query::select()
                    .from(table.table())
                    .column(table.col(&label))
                    .and_where(Expr::col(table.col(&table.id)).eq(parent))
                    .to_owned();
                match query_one(tx, &select).await? {
                    Some(row) => row.try_get::<Option<String>>("", &label)?,
                    None => continue,
                }
            }
            None => None,
        };
        let select = Query::select()
            .from(table.table())
            .column(table.col(&table.id))
            .column(table.col(&label))
            .and_where(table.parent_is(parent))
            .to_owned();
        let mut siblings = Vec::new();
        for row in query_all(tx, &select).await? {
            let id: i32 = row.try_get("", &table.id)?;
            let current: Option<String> = row.try_get("", &label)?;
            siblings.push((id, current));
        }
        for (id, next) in list_label::renumber(parent_label.as_deref(), &siblings) {
            let update = Query::update()
                .table(table.table())
                .values([(table.col(&label), next.into())])
                .and_where(Expr::col(table.col(&table.id)).eq(id))
                .to_owned();
            exec(tx, &update).await?;
            rewritten += 1;
            pending.push_back(Some(id));
        }
    }
    Ok(rewritten)
}
