// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch splitting, ordering and input decoding

use ocr_inference_adapter::vision::ocr::{
    BatchPreprocessor, Geometry, InferenceRequest, OcrErrorKind, OcrModelInterface, OcrModelKind,
    PayloadFragment, Protocol,
};
use serde_json::json;

use super::common::{png_base64, source_images};

#[test]
fn test_batch_count_is_ceiling() {
    let images = source_images(&[(8, 8); 7]);
    let iface = OcrModelInterface::new("paddle");

    for (max_batch_size, expected) in [(1, 7), (2, 4), (3, 3), (7, 1), (10, 1)] {
        let batches = iface.format_input(&images, "http", max_batch_size).unwrap();
        assert_eq!(batches.len(), expected, "max_batch_size={}", max_batch_size);
        assert!(batches.iter().all(|b| b.len() <= max_batch_size));
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 7);
    }
}

#[test]
fn test_order_preserved_across_batches() {
    let sizes = [(10, 4), (11, 5), (12, 6), (13, 7), (14, 8)];
    let images = source_images(&sizes);
    let batches = OcrModelInterface::new("paddle")
        .format_input(&images, "http", 2)
        .unwrap();

    let urls: Vec<String> = batches
        .iter()
        .flat_map(|b| match &b.request {
            InferenceRequest::Http(body) => body.input.iter().map(|i| i.url.clone()).collect::<Vec<_>>(),
            InferenceRequest::Grpc(_) => panic!("expected http request"),
        })
        .collect();
    let expected: Vec<String> = images
        .iter()
        .map(|img| format!("data:image/png;base64,{}", img.base64()))
        .collect();
    assert_eq!(urls, expected);

    let geometries: Vec<Geometry> = batches.iter().flat_map(|b| b.geometries.clone()).collect();
    for (geometry, (w, h)) in geometries.iter().zip(sizes) {
        assert_eq!(*geometry, Geometry::unscaled(w, h).unwrap());
    }
}

#[test]
fn test_single_image_batch() {
    let images = source_images(&[(20, 10)]);
    let batches = OcrModelInterface::new("paddle")
        .format_input(&images, "grpc", 8)
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
}

#[test]
fn test_paddle_grpc_geometry_per_image() {
    let images = source_images(&[(200, 100), (50, 100)]);
    let prepared = BatchPreprocessor::new(OcrModelKind::Paddle, Protocol::Grpc, 8)
        .with_paddle_max_dimension(64)
        .prepare(&images)
        .unwrap();

    let first = prepared[0].geometry;
    assert_eq!((first.new_width, first.new_height), (64, 64));
    assert!((first.scale_factor - 0.32).abs() < 1e-9);
    assert_eq!((first.pad_width, first.pad_height), (0, 16));

    let second = prepared[1].geometry;
    assert!((second.scale_factor - 0.64).abs() < 1e-9);
    assert_eq!((second.pad_width, second.pad_height), (16, 0));

    for item in &prepared {
        match &item.fragment {
            PayloadFragment::Tensor(t) => assert_eq!(t.shape(), &[1, 64, 64, 3]),
            PayloadFragment::ImageUrl(_) => panic!("grpc must carry tensors"),
        }
    }
}

#[test]
fn test_detector_shared_canvas() {
    let images = source_images(&[(40, 10), (20, 30)]);
    let prepared = BatchPreprocessor::new(OcrModelKind::GenericDetector, Protocol::Grpc, 8)
        .prepare(&images)
        .unwrap();

    assert_eq!(prepared[0].geometry.new_width, 40);
    assert_eq!(prepared[0].geometry.scale_factor, 1.0);
    assert_eq!(prepared[1].geometry.new_height, 40);
    assert!((prepared[1].geometry.scale_factor - 40.0 / 30.0).abs() < 1e-9);
    assert!(prepared.iter().all(|p| p.geometry.pad_width == 0 && p.geometry.pad_height == 0));
}

#[test]
fn test_prepare_data_single_and_list() {
    let iface = OcrModelInterface::new("paddle");

    let single = iface
        .prepare_data_for_inference(&json!({"base64_image": png_base64(6, 4)}))
        .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!((single[0].width(), single[0].height()), (6, 4));

    let many = iface
        .prepare_data_for_inference(&json!({
            "base64_image": png_base64(1, 1),
            "base64_images": [png_base64(3, 2), png_base64(5, 7)],
        }))
        .unwrap();
    assert_eq!(many.len(), 2);
    assert_eq!((many[1].width(), many[1].height()), (5, 7));
}

#[test]
fn test_prepare_data_accepts_data_url() {
    let data_url = format!("data:image/png;base64,{}", png_base64(9, 3));
    let images = OcrModelInterface::new("paddle")
        .prepare_data_for_inference(&json!({"base64_image": data_url}))
        .unwrap();
    assert_eq!(images[0].width(), 9);
}

#[test]
fn test_prepare_data_errors() {
    let iface = OcrModelInterface::new("paddle");

    let err = iface.prepare_data_for_inference(&json!({})).unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::MissingInputKey);

    let err = iface
        .prepare_data_for_inference(&json!({"base64_images": {"a": 1}}))
        .unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::InvalidShape);

    let err = iface
        .prepare_data_for_inference(&json!({"base64_image": "%%%not-base64%%%"}))
        .unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::ImageDecode);
}

#[test]
fn test_zero_batch_size_rejected() {
    let images = source_images(&[(8, 8)]);
    let err = OcrModelInterface::new("paddle")
        .format_input(&images, "http", 0)
        .unwrap_err();
    assert_eq!(err.kind(), OcrErrorKind::InvalidShape);
}
