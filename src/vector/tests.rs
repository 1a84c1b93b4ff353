use std::fs;

use geo_types::coord;

use super::{Access, Dataset, FeatureType, FieldDefn, FieldType, FieldValue, Geometry};
use crate::errors::{ErrorCategory, MitabError};
use crate::options::{DatasetOptions, Format};
use crate::spatial_ref::Bounds;
use crate::test_utils::{fixture, TempFixture};
use crate::{assert_near, ProjectionBoundsTable};

const LATLONG: &str = "Earth Projection 1, 104";

fn create(tmp: &TempFixture, format: Format) -> Dataset {
    let mut ds = Dataset::create(tmp.path(), format, LATLONG, Bounds::default()).unwrap();
    let mut name = FieldDefn::new("Name", FieldType::Char).unwrap();
    name.set_width(24);
    ds.add_field(name).unwrap();
    ds.add_field(FieldDefn::new("Pop", FieldType::Integer).unwrap())
        .unwrap();
    ds
}

#[test]
fn test_state_machine() {
    let tmp = TempFixture::empty("state.tab");
    let mut ds = create(&tmp, Format::Tab);
    assert_eq!(ds.access(), Access::OpenForWrite);
    let err = ds.next_feature_id(None).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidState);
    assert!(ds.read_feature(1).is_err());
    assert!(ds.indexed_feature_ids().is_err());

    ds.close().unwrap();
    assert_eq!(ds.access(), Access::Closed);
    ds.close().unwrap();
    assert!(matches!(
        ds.add_field(FieldDefn::new("Late", FieldType::Logical).unwrap()),
        Err(MitabError::InvalidState {
            method_name: "add_field",
            state: "closed"
        })
    ));

    let mut ds = Dataset::open(tmp.path()).unwrap();
    assert_eq!(ds.access(), Access::OpenForRead);
    assert_eq!(ds.next_feature_id(None).unwrap(), None);
    assert_eq!(ds.feature_count().unwrap(), 0);
    assert!(ds.create_feature(FeatureType::Point).is_err());
    assert!(ds.delete_feature(1).is_err());
    ds.close().unwrap();
}

#[test]
fn test_default_bounds_lookup() {
    let tmp = TempFixture::empty("default.tab");
    let ds = Dataset::create(tmp.path(), Format::Tab, LATLONG, Bounds::default()).unwrap();
    let bounds = ds.bounds().unwrap();
    assert_near!(bounds.xmin, -180.0, epsilon = 1e-6);
    assert_near!(bounds.ymax, 90.0, epsilon = 1e-6);

    let unknown = "Earth Projection 8, 104, \"m\", 9, 0, 0.9996, 500000, 0";
    let tmp = TempFixture::empty("unknown.tab");
    let err = Dataset::create(tmp.path(), Format::Tab, unknown, Bounds::default())
        .err()
        .unwrap();
    assert_eq!(err.category(), ErrorCategory::UnknownProjectionBounds);
    assert!(!tmp.path().exists());
    assert!(!tmp.path().with_extension("map").exists());
}

#[test]
fn test_private_bounds_table() {
    let table = ProjectionBoundsTable::load(fixture("mapinfow.prj")).unwrap();
    let utm = "Earth Projection 8, 104, \"m\", 3, 0, 0.9996, 500000, 0";
    let tmp = TempFixture::empty("utm.mif");
    let mut ds = Dataset::create_with_options(
        tmp.path(),
        DatasetOptions {
            format: Format::Mif,
            coordsys: Some(utm),
            bounds_table: Some(&table),
            ..DatasetOptions::default()
        },
    )
    .unwrap();
    let bounds = ds.bounds().unwrap();
    assert_eq!(bounds.xmin, -7745844.0);
    assert_eq!(bounds.ymax, 9997964.0);
    ds.close().unwrap();
}

#[test]
fn test_create_feature_adds_ndx() {
    for (name, format) in [("ndx.tab", Format::Tab), ("ndx.mif", Format::Mif)] {
        let tmp = TempFixture::empty(name);
        let mut ds =
            Dataset::create(tmp.path(), format, LATLONG, Bounds::default()).unwrap();
        let mut feature = ds.create_feature(FeatureType::Polyline).unwrap();
        assert_eq!(ds.defn().unwrap().field(0).unwrap().name(), "NDX");
        feature
            .geometry_mut()
            .unwrap()
            .add_part(&[coord! { x: 1.0, y: 1.0 }, coord! { x: 2.0, y: 3.0 }])
            .unwrap();
        assert_eq!(ds.write_feature(&mut feature).unwrap(), 1);
        let mut empty = ds.create_feature(FeatureType::NoGeom).unwrap();
        assert!(empty.geometry().is_none());
        ds.write_feature(&mut empty).unwrap();
        assert_eq!(ds.feature_count().unwrap(), 2);
        ds.close().unwrap();

        let ds = Dataset::open(tmp.path()).unwrap();
        let features: Vec<_> = ds.features().collect::<Result<_, _>>().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].feature_type(), FeatureType::Polyline);
        assert_eq!(features[1].feature_type(), FeatureType::NoGeom);
        assert_eq!(
            features[1].field("NDX").unwrap(),
            Some(FieldValue::IntegerValue(2))
        );
    }
}

#[test]
fn test_out_of_bounds_is_rejected() {
    let tmp = TempFixture::empty("oob.tab");
    let mut ds = Dataset::create(
        tmp.path(),
        Format::Tab,
        "NonEarth Units \"m\"",
        Bounds::new(0.0, 0.0, 1000.0, 1000.0),
    )
    .unwrap();
    let mut far = ds.create_feature(FeatureType::Point).unwrap();
    far.set_geometry(Geometry::point(1.0e12, 5.0));
    let err = ds.write_feature(&mut far).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::OutOfBounds);
    assert_eq!(ds.feature_count().unwrap(), 0);

    let mut near = ds.create_feature(FeatureType::Point).unwrap();
    near.set_geometry(Geometry::point(500.0, 5.0));
    assert_eq!(ds.write_feature(&mut near).unwrap(), 1);
    ds.close().unwrap();
}

#[test]
fn test_drop_closes_writer() {
    let tmp = TempFixture::empty("dropped.tab");
    {
        let mut ds = create(&tmp, Format::Tab);
        let mut f = ds.create_feature(FeatureType::Point).unwrap();
        f.set_geometry(Geometry::point(1.0, 2.0));
        f.set_field_string("Name", "Dropped").unwrap();
        ds.write_feature(&mut f).unwrap();
    }
    let ds = Dataset::open(tmp.path()).unwrap();
    assert_eq!(ds.feature_count().unwrap(), 1);
}

#[test]
fn test_open_by_sniffing() {
    let tmp = TempFixture::empty("towns.txt");
    fs::copy(fixture("towns.mif"), tmp.path()).unwrap();
    fs::copy(fixture("towns.mid"), tmp.path().with_extension("mid")).unwrap();
    let ds = Dataset::open(tmp.path()).unwrap();
    assert_eq!(ds.format(), Format::Mif);
    assert_eq!(ds.feature_count().unwrap(), 4);

    let missing = Dataset::open(fixture("missing.tab")).err().unwrap();
    assert_eq!(missing.category(), ErrorCategory::NotFound);
}

#[test]
fn test_mif_rejects_deletion() {
    let tmp = TempFixture::empty("nodelete.mif");
    let mut ds = create(&tmp, Format::Mif);
    let mut f = ds.create_feature(FeatureType::Point).unwrap();
    f.set_geometry(Geometry::point(1.0, 2.0));
    ds.write_feature(&mut f).unwrap();
    assert!(matches!(
        ds.delete_feature(1),
        Err(MitabError::BadArgument(_))
    ));
    ds.close().unwrap();
}

#[test]
fn test_extent() {
    for (name, format) in [("extent.tab", Format::Tab), ("extent.mif", Format::Mif)] {
        let tmp = TempFixture::empty(name);
        let mut ds = create(&tmp, format);
        for (x, y) in [(-10.0, 5.0), (20.0, -7.5), (3.0, 40.0)] {
            let mut f = ds.create_feature(FeatureType::Point).unwrap();
            f.set_geometry(Geometry::point(x, y));
            ds.write_feature(&mut f).unwrap();
        }
        ds.close().unwrap();

        let ds = Dataset::open(tmp.path()).unwrap();
        let extent = ds.extent().unwrap().unwrap();
        assert_near!(extent.min_x, -10.0, epsilon = 1e-6);
        assert_near!(extent.max_x, 20.0, epsilon = 1e-6);
        assert_near!(extent.min_y, -7.5, epsilon = 1e-6);
        assert_near!(extent.max_y, 40.0, epsilon = 1e-6);
    }
}

#[test]
fn test_fixture_copy() {
    let tmp = TempFixture::fixture("towns.mif");
    assert!(tmp.path().with_extension("mid").exists());
    let ds = Dataset::open(&tmp).unwrap();
    assert_eq!(ds.defn().unwrap().field_count(), 3);
    assert_eq!(ds.coordsys().unwrap().to_string(), LATLONG);
    assert!(ds.extent().unwrap().is_some());
}
