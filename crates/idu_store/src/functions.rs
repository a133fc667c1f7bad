use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Query, SelectStatement};
use sea_orm::{ConnectionTrait, QueryResult};

use idu_urban_core::hierarchy::list_label;
use idu_urban_core::{
    FunctionDictionaryApi, FunctionInput, FunctionKind, FunctionRecord, IduError, IduResult,
    PhysicalObjectFunctionId, PhysicalObjectType, PhysicalObjectTypeId, PhysicalObjectTypeInput,
};

use crate::db::{
    PhysicalObjectFunctionsDict, PhysicalObjectTypesDict, ServiceTypesDict,
    ServiceTypesNormativesData, UrbanFunctionsDict,
};
use crate::hierarchy::{HierarchyTable, SqlHierarchy, clear_labels, relabel_group};
use crate::store::{
    UrbanStore, col_name, ensure_exists, exec, insert_returning_id, query_all, query_one,
    read_opt_i32, required_name,
};

/// Column layout shared by both function dictionaries.
struct FunctionTable {
    nodes: HierarchyTable,
    label: String,
    name: String,
    code: String,
}

impl FunctionTable {
    fn of(kind: FunctionKind) -> Self {
        let nodes = HierarchyTable::of(kind.hierarchy());
        let (name, code) = match kind {
            FunctionKind::UrbanFunction => (
                col_name(UrbanFunctionsDict::Name),
                col_name(UrbanFunctionsDict::Code),
            ),
            FunctionKind::PhysicalObjectFunction => (
                col_name(PhysicalObjectFunctionsDict::Name),
                col_name(PhysicalObjectFunctionsDict::Code),
            ),
        };
        let label = nodes.label.clone().unwrap_or_else(|| "list_label".to_string());
        Self {
            nodes,
            label,
            name,
            code,
        }
    }

    fn select(&self) -> SelectStatement {
        Query::select()
            .from(self.nodes.table())
            .columns([
                Alias::new(self.nodes.id.as_str()),
                Alias::new(self.nodes.parent.as_str()),
                Alias::new(self.name.as_str()),
                Alias::new(self.nodes.level.as_str()),
                Alias::new(self.label.as_str()),
                Alias::new(self.code.as_str()),
            ])
            .to_owned()
    }

    fn read(&self, kind: FunctionKind, row: &QueryResult) -> IduResult<FunctionRecord> {
        Ok(FunctionRecord {
            kind,
            function_id: row.try_get("", &self.nodes.id)?,
            parent_id: row.try_get("", &self.nodes.parent)?,
            name: row.try_get("", &self.name)?,
            level: row.try_get("", &self.nodes.level)?,
            list_label: row
                .try_get::<Option<String>>("", &self.label)?
                .unwrap_or_default(),
            code: row.try_get("", &self.code)?,
        })
    }
}

async fn fetch_function<C>(conn: &C, kind: FunctionKind, function_id: i32) -> IduResult<Option<FunctionRecord>>
where
    C: ConnectionTrait,
{
    let table = FunctionTable::of(kind);
    let select = table
        .select()
        .and_where(Expr::col(table.nodes.col(&table.nodes.id)).eq(function_id))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(table.read(kind, &row)?)),
        None => Ok(None),
    }
}

fn function_not_found(kind: FunctionKind, function_id: i32) -> IduError {
    IduError::not_found(format!(
        "{} {function_id} not found",
        kind.hierarchy().entity_name()
    ))
}

#[async_trait]
impl FunctionDictionaryApi for UrbanStore {
    async fn create_function(&self, kind: FunctionKind, input: FunctionInput) -> IduResult<FunctionRecord> {
        let name = required_name(&input.name, kind.hierarchy().entity_name())?;
        self.timed("create_function", async move {
            let hierarchy = kind.hierarchy();
            let table = FunctionTable::of(kind);
            let (_guard, tx) = self.begin_hierarchy_write(hierarchy).await?;
            let mut nodes = SqlHierarchy::new(&tx, hierarchy);
            let level = self
                .engine(hierarchy)
                .level_for_parent(&mut nodes, input.parent_id)
                .await?;
            let insert = Query::insert()
                .into_table(table.nodes.table())
                .columns([
                    Alias::new(table.nodes.parent.as_str()),
                    Alias::new(table.name.as_str()),
                    Alias::new(table.nodes.level.as_str()),
                    Alias::new(table.code.as_str()),
                ])
                .values_panic([
                    input.parent_id.into(),
                    name.into(),
                    level.into(),
                    input.code.clone().into(),
                ])
                .returning_col(Alias::new(table.nodes.id.as_str()))
                .to_owned();
            let function_id = insert_returning_id(&tx, &insert, Alias::new(table.nodes.id.as_str())).await?;
            relabel_group(&tx, hierarchy, input.parent_id).await?;
            self.maybe_failpoint("function.create.after_insert")?;
            let record = fetch_function(&tx, kind, function_id)
                .await?
                .ok_or_else(|| function_not_found(kind, function_id))?;
            tx.commit().await?;
            Ok(record)
        })
        .await
    }

    async fn update_function(
        &self,
        kind: FunctionKind,
        function_id: i32,
        input: FunctionInput,
    ) -> IduResult<FunctionRecord> {
        let name = required_name(&input.name, kind.hierarchy().entity_name())?;
        self.timed("update_function", async move {
            let hierarchy = kind.hierarchy();
            let table = FunctionTable::of(kind);
            let (_guard, tx) = self.begin_hierarchy_write(hierarchy).await?;
            let existing = fetch_function(&tx, kind, function_id)
                .await?
                .ok_or_else(|| function_not_found(kind, function_id))?;

            let mut nodes = SqlHierarchy::new(&tx, hierarchy);
            let moved = self
                .engine(hierarchy)
                .move_node(&mut nodes, function_id, input.parent_id)
                .await?;
            if existing.parent_id != input.parent_id {
                // The moved node joins the end of its new sibling group.
                clear_labels(&tx, hierarchy, &[function_id]).await?;
                relabel_group(&tx, hierarchy, existing.parent_id).await?;
                relabel_group(&tx, hierarchy, input.parent_id).await?;
                log::debug!(
                    "{} {function_id} moved under {:?}, {} levels rewritten",
                    hierarchy.entity_name(),
                    input.parent_id,
                    moved.relevelled
                );
            }
            self.maybe_failpoint("function.update.after_move")?;

            let update = Query::update()
                .table(table.nodes.table())
                .values([
                    (Alias::new(table.name.as_str()), name.into()),
                    (Alias::new(table.code.as_str()), input.code.clone().into()),
                ])
                .and_where(Expr::col(table.nodes.col(&table.nodes.id)).eq(function_id))
                .to_owned();
            exec(&tx, &update).await?;
            let record = fetch_function(&tx, kind, function_id)
                .await?
                .ok_or_else(|| function_not_found(kind, function_id))?;
            tx.commit().await?;
            Ok(record)
        })
        .await
    }

    async fn delete_function(&self, kind: FunctionKind, function_id: i32) -> IduResult<()> {
        self.timed("delete_function", async move {
            let hierarchy = kind.hierarchy();
            let table = FunctionTable::of(kind);
            let (_guard, tx) = self.begin_hierarchy_write(hierarchy).await?;
            let existing = fetch_function(&tx, kind, function_id)
                .await?
                .ok_or_else(|| function_not_found(kind, function_id))?;
            let parent = existing.parent_id;

            match kind {
                FunctionKind::UrbanFunction => {
                    let referencing = Query::select()
                        .column(ServiceTypesDict::ServiceTypeId)
                        .from(ServiceTypesDict::Table)
                        .and_where(Expr::col(ServiceTypesDict::UrbanFunctionId).eq(function_id))
                        .limit(1)
                        .to_owned();
                    let in_use = query_one(&tx, &referencing).await?.is_some();
                    if in_use && parent.is_none() {
                        return Err(IduError::conflict(format!(
                            "root urban function {function_id} is still used by service types"
                        )));
                    }
                    let service_types = Query::update()
                        .table(ServiceTypesDict::Table)
                        .values([(ServiceTypesDict::UrbanFunctionId, parent.into())])
                        .and_where(Expr::col(ServiceTypesDict::UrbanFunctionId).eq(function_id))
                        .to_owned();
                    exec(&tx, &service_types).await?;
                    let normatives = Query::delete()
                        .from_table(ServiceTypesNormativesData::Table)
                        .and_where(Expr::col(ServiceTypesNormativesData::UrbanFunctionId).eq(function_id))
                        .to_owned();
                    exec(&tx, &normatives).await?;
                }
                FunctionKind::PhysicalObjectFunction => {
                    let object_types = Query::update()
                        .table(PhysicalObjectTypesDict::Table)
                        .values([(PhysicalObjectTypesDict::PhysicalObjectFunctionId, parent.into())])
                        .and_where(
                            Expr::col(PhysicalObjectTypesDict::PhysicalObjectFunctionId).eq(function_id),
                        )
                        .to_owned();
                    exec(&tx, &object_types).await?;
                }
            }

            let mut nodes = SqlHierarchy::new(&tx, hierarchy);
            let splice = self
                .engine(hierarchy)
                .splice_out(&mut nodes, function_id)
                .await?;
            clear_labels(&tx, hierarchy, &splice.children).await?;
            self.maybe_failpoint("function.delete.before_row")?;

            let delete = Query::delete()
                .from_table(table.nodes.table())
                .and_where(Expr::col(table.nodes.col(&table.nodes.id)).eq(function_id))
                .to_owned();
            exec(&tx, &delete).await?;
            let relabelled = relabel_group(&tx, hierarchy, parent).await?;
            tx.commit().await?;
            log::debug!(
                "deleted {} {function_id}: {} children moved to {parent:?}, {relabelled} labels rewritten",
                hierarchy.entity_name(),
                splice.children.len()
            );
            Ok(())
        })
        .await
    }

    async fn get_function(&self, kind: FunctionKind, function_id: i32) -> IduResult<FunctionRecord> {
        self.timed("get_function", async move {
            fetch_function(&self.conn, kind, function_id)
                .await?
                .ok_or_else(|| function_not_found(kind, function_id))
        })
        .await
    }

    async fn list_functions(&self, kind: FunctionKind, parent_id: Option<i32>) -> IduResult<Vec<FunctionRecord>> {
        self.timed("list_functions", async move {
            let table = FunctionTable::of(kind);
            let select = table
                .select()
                .and_where(table.nodes.parent_is(parent_id))
                .to_owned();
            let mut records = query_all(&self.conn, &select)
                .await?
                .iter()
                .map(|row| table.read(kind, row))
                .collect::<IduResult<Vec<_>>>()?;
            records.sort_by_key(|record| {
                (
                    list_label::position(&record.list_label).unwrap_or(u32::MAX),
                    record.function_id,
                )
            });
            Ok(records)
        })
        .await
    }

    async fn create_physical_object_type(
        &self,
        input: PhysicalObjectTypeInput,
    ) -> IduResult<PhysicalObjectType> {
        let name = required_name(&input.name, "physical object type")?;
        self.timed("create_physical_object_type", async move {
            if let Some(function_id) = input.physical_object_function_id {
                ensure_exists(
                    &self.conn,
                    PhysicalObjectFunctionsDict::Table,
                    PhysicalObjectFunctionsDict::PhysicalObjectFunctionId,
                    function_id.get(),
                    "physical object function",
                )
                .await?;
            }
            let insert = Query::insert()
                .into_table(PhysicalObjectTypesDict::Table)
                .columns([
                    PhysicalObjectTypesDict::Name,
                    PhysicalObjectTypesDict::PhysicalObjectFunctionId,
                ])
                .values_panic([
                    name.clone().into(),
                    input.physical_object_function_id.map(PhysicalObjectFunctionId::get).into(),
                ])
                .returning_col(PhysicalObjectTypesDict::PhysicalObjectTypeId)
                .to_owned();
            let id = insert_returning_id(&self.conn, &insert, PhysicalObjectTypesDict::PhysicalObjectTypeId).await?;
            Ok(PhysicalObjectType {
                physical_object_type_id: PhysicalObjectTypeId(id),
                name,
                physical_object_function_id: input.physical_object_function_id,
            })
        })
        .await
    }

    async fn get_physical_object_type(
        &self,
        physical_object_type_id: PhysicalObjectTypeId,
    ) -> IduResult<PhysicalObjectType> {
        self.timed("get_physical_object_type", async move {
            let select = Query::select()
                .from(PhysicalObjectTypesDict::Table)
                .columns([
                    PhysicalObjectTypesDict::PhysicalObjectTypeId,
                    PhysicalObjectTypesDict::Name,
                    PhysicalObjectTypesDict::PhysicalObjectFunctionId,
                ])
                .and_where(
                    Expr::col(PhysicalObjectTypesDict::PhysicalObjectTypeId)
                        .eq(physical_object_type_id.get()),
                )
                .to_owned();
            let row = query_one(&self.conn, &select).await?.ok_or_else(|| {
                IduError::not_found(format!(
                    "physical object type {physical_object_type_id} not found"
                ))
            })?;
            Ok(PhysicalObjectType {
                physical_object_type_id,
                name: row.try_get("", &col_name(PhysicalObjectTypesDict::Name))?,
                physical_object_function_id: read_opt_i32(
                    &row,
                    PhysicalObjectTypesDict::PhysicalObjectFunctionId,
                )?
                .map(PhysicalObjectFunctionId),
            })
        })
        .await
    }
}
