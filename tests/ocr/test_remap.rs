// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Coordinate remapping properties

use ocr_inference_adapter::vision::ocr::preprocessing::preprocess_for_paddle;
use ocr_inference_adapter::vision::ocr::remap::RemapOptions;
use ocr_inference_adapter::vision::ocr::{
    CoordinateRemapper, Geometry, GeometryFallback, OcrErrorKind, Point, RawPolygon,
};

fn remap_one(point: Point, geometry: Geometry, options: RemapOptions) -> Point {
    let result = CoordinateRemapper::default()
        .remap(
            vec![RawPolygon::Points(vec![point])],
            vec!["t".to_string()],
            vec![1.0],
            &[geometry],
            0,
            options,
        )
        .unwrap();
    result.polygons[0][0]
}

#[test]
fn test_identity_geometry() {
    let identity = Geometry::new(1, 1, 0, 0, 1.0).unwrap();
    for (x, y) in [(0.0, 0.0), (0.25, 0.75), (12.5, -3.0)] {
        let p = remap_one(Point::new(x, y), identity, RemapOptions::default());
        assert_eq!(p, Point::new(x, y));
    }
}

#[test]
fn test_identity_when_disabled() {
    let geometry = Geometry::new(640, 480, 20, 30, 0.5).unwrap();
    let options = RemapOptions {
        scale_coordinates: false,
        shift_coordinates: false,
    };
    let p = remap_one(Point::new(17.0, 23.0), geometry, options);
    assert_eq!(p, Point::new(17.0, 23.0));
}

#[test]
fn test_reference_point() {
    let geometry = Geometry::new(100, 50, 5, 0, 2.0).unwrap();
    let p = remap_one(Point::new(0.5, 0.4), geometry, RemapOptions::default());
    assert!((p.x - 22.5).abs() < 1e-9);
    assert!((p.y - 10.0).abs() < 1e-9);
}

#[test]
fn test_round_trip_through_paddle_preprocessing() {
    for (w, h) in [(1280, 720), (300, 900), (50, 50), (961, 17)] {
        let image = image::DynamicImage::new_rgb8(w, h);
        let geometry = preprocess_for_paddle(&image, 960).unwrap().geometry;

        for (x, y) in [(0.0, 0.0), (w as f64 / 3.0, h as f64 / 2.0), (w as f64, h as f64)] {
            // Forward: original pixel -> normalized model coordinate
            let nx = (x * geometry.scale_factor + geometry.pad_width as f64) / geometry.new_width as f64;
            let ny =
                (y * geometry.scale_factor + geometry.pad_height as f64) / geometry.new_height as f64;

            let back = remap_one(Point::new(nx, ny), geometry, RemapOptions::default());
            assert!((back.x - x).abs() < 1e-6, "{}x{}: x {} -> {}", w, h, x, back.x);
            assert!((back.y - y).abs() < 1e-6, "{}x{}: y {} -> {}", w, h, y, back.y);
        }
    }
}

#[test]
fn test_nan_entries_dropped_with_their_text() {
    let geometry = Geometry::unscaled(100, 100).unwrap();
    let result = CoordinateRemapper::default()
        .remap(
            vec![
                RawPolygon::NotANumber,
                RawPolygon::Points(vec![Point::new(0.1, 0.2)]),
                RawPolygon::NotANumber,
            ],
            vec!["a".into(), "b".into(), "c".into()],
            vec![0.1, 0.2, 0.3],
            &[geometry],
            0,
            RemapOptions::default(),
        )
        .unwrap();
    assert_eq!(result.texts, vec!["b"]);
    assert_eq!(result.confidences, vec![0.2]);
    assert_eq!(result.polygons.len(), 1);
}

#[test]
fn test_geometry_index_policy() {
    let geometries = [Geometry::unscaled(10, 10).unwrap()];

    let err = CoordinateRemapper::new(GeometryFallback::Strict)
        .remap(vec![], vec![], vec![], &geometries, 1, RemapOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::GeometryOutOfRange);

    let ok = CoordinateRemapper::new(GeometryFallback::FirstWithWarning).remap(
        vec![],
        vec![],
        vec![],
        &geometries,
        1,
        RemapOptions::default(),
    );
    assert!(ok.unwrap().is_empty());

    let err = CoordinateRemapper::default()
        .remap(vec![], vec![], vec![], &[], 0, RemapOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::MissingGeometry);
}
