use sea_orm_migration::prelude::*;

mod m20240428_000001_init;
mod m20240827_000002_user_projects;
mod m20241203_000003_project_indicator_identity;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240428_000001_init::Migration),
            Box::new(m20240827_000002_user_projects::Migration),
            Box::new(m20241203_000003_project_indicator_identity::Migration),
        ]
    }
}

fn id_col(col: impl Iden) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn ref_col(col: impl Iden, nullable: bool) -> ColumnDef {
    let mut col_def = ColumnDef::new(col);
    col_def.integer();
    if nullable {
        col_def.null();
    } else {
        col_def.not_null();
    }
    col_def.to_owned()
}

/// GeoJSON text.
fn geometry_col(col: impl Iden) -> ColumnDef {
    ColumnDef::new(col).text().not_null().to_owned()
}

fn json_col(col: impl Iden) -> ColumnDef {
    ColumnDef::new(col).text().not_null().default("{}").to_owned()
}

fn timestamp_col(col: impl Iden) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}
