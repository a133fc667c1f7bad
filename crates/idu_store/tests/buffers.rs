mod support;

use idu_urban_store::{
    BufferApi, BufferInput, BufferTypeId, BufferTypeInput, DefaultBufferValueInput,
    FunctionDictionaryApi, FunctionInput, FunctionKind, Geometry, GeometryApi, IduError,
    IduResult, InfrastructureType, ObjectGeometryId, ObjectGeometryInput, PhysicalObjectTypeId,
    PhysicalObjectTypeInput, Properties, ServiceApi, ServiceInput, ServiceTypeId,
    ServiceTypeInput, UrbanFunctionId, UrbanObjectId, UrbanObjectInput, UrbanStore,
};
use support::{count_rows, open, square};
use tempfile::tempdir;

struct Fixture {
    buffer_type: BufferTypeId,
    geometry: ObjectGeometryId,
    object_type: PhysicalObjectTypeId,
    service_type: ServiceTypeId,
}

async fn fixture(store: &UrbanStore) -> IduResult<Fixture> {
    let buffer_type = store
        .create_buffer_type(BufferTypeInput {
            name: "walking".to_string(),
            description: Some("pedestrian reach".to_string()),
        })
        .await?
        .buffer_type_id;
    let geometry = store
        .create_object_geometry(ObjectGeometryInput {
            territory_id: None,
            geometry: Geometry::Point([30.3, 59.9]),
            centre_point: None,
            address: None,
            osm_id: Some("n42".to_string()),
        })
        .await?
        .object_geometry_id;
    let object_type = store
        .create_physical_object_type(PhysicalObjectTypeInput {
            name: "Building".to_string(),
            physical_object_function_id: None,
        })
        .await?
        .physical_object_type_id;
    let function = store
        .create_function(
            FunctionKind::UrbanFunction,
            FunctionInput {
                parent_id: None,
                name: "Education".to_string(),
                code: None,
            },
        )
        .await?;
    let service_type = store
        .create_service_type(ServiceTypeInput {
            urban_function_id: UrbanFunctionId(function.function_id),
            name: "School".to_string(),
            code: None,
            capacity_modeled: None,
            infrastructure_type: InfrastructureType::Basic,
            properties: Properties::new(),
        })
        .await?
        .service_type_id;
    Ok(Fixture {
        buffer_type,
        geometry,
        object_type,
        service_type,
    })
}

fn default_for_type(fixture: &Fixture, value: f64) -> DefaultBufferValueInput {
    DefaultBufferValueInput {
        buffer_type_id: fixture.buffer_type,
        physical_object_type_id: Some(fixture.object_type),
        service_type_id: None,
        buffer_value: value,
    }
}

fn buffer(fixture: &Fixture, urban_object_id: UrbanObjectId, is_custom: bool) -> BufferInput {
    BufferInput {
        buffer_type_id: fixture.buffer_type,
        urban_object_id,
        geometry: square(30.29, 59.89, 0.02),
        is_custom,
    }
}

#[tokio::test]
async fn default_radius_prefers_service_type_over_object_type() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let fixture = fixture(&store).await?;

    let service = store
        .create_service(ServiceInput {
            service_type_id: fixture.service_type,
            territory_type_id: None,
            name: None,
            capacity: None,
            is_capacity_real: None,
            properties: Properties::new(),
        })
        .await?;
    let school = store
        .create_urban_object(UrbanObjectInput {
            object_geometry_id: fixture.geometry,
            physical_object_type_id: Some(fixture.object_type),
            service_id: Some(service.service_id),
        })
        .await?;

    assert_eq!(
        store
            .default_buffer_radius(fixture.buffer_type, school.urban_object_id)
            .await?,
        None
    );
    store.set_default_buffer_value(default_for_type(&fixture, 300.0)).await?;
    assert_eq!(
        store
            .default_buffer_radius(fixture.buffer_type, school.urban_object_id)
            .await?,
        Some(300.0)
    );
    store
        .set_default_buffer_value(DefaultBufferValueInput {
            buffer_type_id: fixture.buffer_type,
            physical_object_type_id: None,
            service_type_id: Some(fixture.service_type),
            buffer_value: 500.0,
        })
        .await?;
    assert_eq!(
        store
            .default_buffer_radius(fixture.buffer_type, school.urban_object_id)
            .await?,
        Some(500.0)
    );

    // Setting again overwrites rather than adding a second row.
    store.set_default_buffer_value(default_for_type(&fixture, 350.0)).await?;
    assert_eq!(count_rows(&store, "default_buffer_values_dict").await?, 2);

    let err = store
        .default_buffer_radius(fixture.buffer_type, UrbanObjectId(404))
        .await
        .expect_err("missing object");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    Ok(())
}

#[tokio::test]
async fn default_values_need_exactly_one_subject() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let fixture = fixture(&store).await?;

    let mut both = default_for_type(&fixture, 100.0);
    both.service_type_id = Some(fixture.service_type);
    let err = store.set_default_buffer_value(both).await.expect_err("both");
    assert!(matches!(err, IduError::Validation { .. }));

    let mut neither = default_for_type(&fixture, 100.0);
    neither.physical_object_type_id = None;
    let err = store.set_default_buffer_value(neither).await.expect_err("neither");
    assert!(matches!(err, IduError::Validation { .. }));

    let err = store
        .set_default_buffer_value(default_for_type(&fixture, -1.0))
        .await
        .expect_err("negative");
    assert!(matches!(err, IduError::Validation { .. }));

    let mut unknown_type = default_for_type(&fixture, 100.0);
    unknown_type.buffer_type_id = BufferTypeId(99);
    let err = store
        .set_default_buffer_value(unknown_type)
        .await
        .expect_err("unknown buffer type");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));

    assert_eq!(count_rows(&store, "default_buffer_values_dict").await?, 0);
    Ok(())
}

#[tokio::test]
async fn buffers_are_keyed_by_type_and_object() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let fixture = fixture(&store).await?;
    let house = store
        .create_urban_object(UrbanObjectInput {
            object_geometry_id: fixture.geometry,
            physical_object_type_id: Some(fixture.object_type),
            service_id: None,
        })
        .await?;

    // Without a default only a custom buffer can be stored.
    let err = store
        .put_buffer(buffer(&fixture, house.urban_object_id, false))
        .await
        .expect_err("no default");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    let custom = store
        .put_buffer(buffer(&fixture, house.urban_object_id, true))
        .await?;
    assert!(custom.is_custom);

    store.set_default_buffer_value(default_for_type(&fixture, 200.0)).await?;
    let mut regenerated = buffer(&fixture, house.urban_object_id, false);
    regenerated.geometry = square(30.28, 59.88, 0.04);
    let regenerated = store.put_buffer(regenerated).await?;
    assert!(!regenerated.is_custom);
    assert_eq!(regenerated.geometry, square(30.28, 59.88, 0.04));
    assert_eq!(count_rows(&store, "buffers_data").await?, 1);
    assert_eq!(
        store
            .get_buffer(fixture.buffer_type, house.urban_object_id)
            .await?,
        regenerated
    );

    let mut point = buffer(&fixture, house.urban_object_id, true);
    point.geometry = Geometry::Point([30.3, 59.9]);
    let err = store.put_buffer(point).await.expect_err("point buffer");
    assert!(matches!(err, IduError::InvalidGeometry { .. }));

    store
        .delete_buffer(fixture.buffer_type, house.urban_object_id)
        .await?;
    let err = store
        .get_buffer(fixture.buffer_type, house.urban_object_id)
        .await
        .expect_err("deleted");
    assert!(matches!(err, IduError::NotFound { .. }));
    let err = store
        .delete_buffer(fixture.buffer_type, house.urban_object_id)
        .await
        .expect_err("already deleted");
    assert!(matches!(err, IduError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn urban_objects_check_their_references() -> IduResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let fixture = fixture(&store).await?;
    let err = store
        .create_urban_object(UrbanObjectInput {
            object_geometry_id: ObjectGeometryId(404),
            physical_object_type_id: None,
            service_id: None,
        })
        .await
        .expect_err("missing geometry");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    let err = store
        .create_urban_object(UrbanObjectInput {
            object_geometry_id: fixture.geometry,
            physical_object_type_id: Some(PhysicalObjectTypeId(404)),
            service_id: None,
        })
        .await
        .expect_err("missing type");
    assert!(matches!(err, IduError::ReferencedEntityMissing { .. }));
    assert_eq!(count_rows(&store, "urban_objects_data").await?, 0);
    Ok(())
}
