// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh lifecycle scenarios: consolidation, inclusion modes, rebuilds

use approx::assert_relative_eq;
use meshgroup::geometry::{BoundingBox, Facet, Mesh};
use nalgebra::{Point3, Vector3};

fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
    Point3::new(x, y, z)
}

/// Two unit right triangles sharing the edge (1,0,0)-(0,1,0). The second
/// triangle repeats the shared corners with a small offset.
fn split_square(offset: f64) -> Vec<Facet<f64>> {
    vec![
        Facet::new([p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)], 0),
        Facet::new(
            [
                p(1.0 + offset, 0.0, 0.0),
                p(1.0, 1.0, 0.0),
                p(0.0, 1.0 + offset, 0.0),
            ],
            1,
        ),
    ]
}

#[test]
fn test_shared_edge_consolidates_to_four_vertices() {
    let mesh = Mesh::from_facets(&split_square(5e-11), 1e-10);
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.triangle_count(), 2);
    assert_relative_eq!(mesh.total_area(), 1.0, epsilon = 1e-9);

    // both triangles reference the same shared corners
    let a = mesh.triangle(0).unwrap().vertex_indices();
    let b = mesh.triangle(1).unwrap().vertex_indices();
    assert_eq!(a[1], b[0]);
    assert_eq!(a[2], b[2]);
}

#[test]
fn test_offset_beyond_tolerance_keeps_vertices_apart() {
    let mesh = Mesh::from_facets(&split_square(1e-9), 1e-10);
    assert_eq!(mesh.vertex_count(), 6);

    let mesh = Mesh::from_facets(&split_square(1e-9), 1e-8);
    assert_eq!(mesh.vertex_count(), 4);
    assert_relative_eq!(mesh.total_area(), 1.0, epsilon = 1e-7);
}

#[test]
fn test_every_mode_needs_all_corners() {
    let facet = Facet::new([p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(0.0, 2.0, 0.0)], 0);
    let mesh = Mesh::from_facets(&[facet], 1e-10);

    // holds (0,0,0) and (2,0,0) but not (0,2,0)
    let query = BoundingBox::from_corners(p(-1.0, -1.0, -1.0), p(3.0, 1.0, 1.0));
    assert_eq!(mesh.search(&query, true).len(), 0);
    assert_eq!(mesh.search(&query, false).len(), 1);
    assert_eq!(mesh.linear_search(&query, true).len(), 0);
    assert_eq!(mesh.linear_search(&query, false).len(), 1);
}

#[test]
fn test_add_then_rebuild_indexes_every_triangle_once() {
    let mut mesh = Mesh::from_facets(&split_square(0.0), 1e-10);
    let extra: Vec<Facet<f64>> = (0..40)
        .map(|i| {
            let x = 2.0 + i as f64;
            Facet::new([p(x, 0.0, 0.0), p(x + 1.0, 0.0, 0.0), p(x, 1.0, 0.5)], 10 + i)
        })
        .collect();
    let report = mesh.add(&extra);
    assert_eq!(report.added, 40);
    assert!(mesh.is_dirty());
    assert!(mesh.rebuild());

    let mut ids: Vec<u32> = mesh
        .search(&mesh.bounding_box(), false)
        .iter()
        .map(|t| t.id())
        .collect();
    ids.sort_unstable();
    let expected: Vec<u32> = [0, 1].into_iter().chain(10..50).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_add_keeps_resident_triangle_on_id_collision() {
    let mut mesh = Mesh::from_facets(&split_square(0.0), 1e-10);
    let clash = Facet::new([p(5.0, 5.0, 5.0), p(6.0, 5.0, 5.0), p(5.0, 6.0, 5.0)], 1);
    let report = mesh.add(&[clash]);
    assert_eq!(report.added, 0);
    assert_eq!(report.duplicate_ids, vec![1]);
    mesh.rebuild();
    assert_eq!(mesh.triangle_count(), 2);
    // the clashing triangle's vertices were orphaned and removed
    assert_eq!(mesh.vertex_count(), 4);
    assert!(mesh.bounding_box().max.x <= 1.0);
}

#[test]
fn test_initialize_keeps_ids_unique() {
    let facets = vec![
        Facet::new([p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)], 5),
        Facet::new([p(3.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(3.0, 1.0, 0.0)], 5),
        Facet::new([p(0.0, 0.0, 2.0), p(1.0, 0.0, 2.0), p(0.0, 1.0, 2.0)], 2),
    ];
    let mut mesh = Mesh::from_facets(&facets, 1e-10);
    let ids: Vec<u32> = mesh.iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![2, 5]);
    // the dropped triangle left no vertices behind
    assert_eq!(mesh.vertex_count(), 6);
    assert!(mesh.bounding_box().max.x <= 1.0);

    let report = mesh.add(&[]);
    assert_eq!(report.added, 0);
    assert!(report.duplicate_ids.is_empty());

    let report = mesh.add(&[
        Facet::new([p(5.0, 0.0, 0.0), p(6.0, 0.0, 0.0), p(5.0, 1.0, 0.0)], 9),
        Facet::new([p(7.0, 0.0, 0.0), p(8.0, 0.0, 0.0), p(7.0, 1.0, 0.0)], 9),
    ]);
    assert_eq!(report.added, 1);
    assert_eq!(report.duplicate_ids, vec![9]);
    assert_eq!(mesh.triangle_count(), 3);
}

#[test]
fn test_supplied_normal_is_stored_unit_length() {
    let mut facet = Facet::new([p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)], 0);
    facet.normal = Vector3::new(0.0, 0.0, 4.0);
    let mesh = Mesh::from_facets(&[facet], 1e-10);
    assert_relative_eq!(mesh.triangle(0).unwrap().normal(), Vector3::z(), epsilon = 1e-12);
}

#[test]
fn test_queries_on_dirty_mesh_do_not_panic() {
    let mut mesh = Mesh::from_facets(&split_square(0.0), 1e-10);
    mesh.add(&[Facet::new([p(3.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(3.0, 1.0, 0.0)], 7)]);
    let query = BoundingBox::from_corners(p(-10.0, -10.0, -10.0), p(10.0, 10.0, 10.0));
    // the index still reflects the two-triangle build
    assert_eq!(mesh.search(&query, false).len(), 2);
    assert_eq!(mesh.linear_search(&query, false).len(), 3);
    assert!(mesh.nearest(&p(3.2, 0.2, 0.0)).is_some());
}

#[test]
fn test_rescale_and_external_ids() {
    let mut mesh = Mesh::from_facets(&split_square(0.0), 1e-10);
    mesh.rescale(2.0).unwrap();
    assert_relative_eq!(mesh.total_area(), 4.0, epsilon = 1e-12);
    assert_eq!(mesh.bounding_box().max, p(2.0, 2.0, 0.0));
    assert!(mesh.rescale(f64::NAN).is_err());

    mesh.set_all_external_ids(17);
    assert!(mesh.iter().all(|t| t.external_id() == 17 && t.has_external_id()));
}

#[test]
fn test_nearest_by_centroid() {
    let mesh = Mesh::from_facets(&split_square(0.0), 1e-10);
    let near_origin = mesh.nearest(&p(0.0, 0.0, 0.0)).unwrap();
    assert_eq!(near_origin.id(), 0);
    let far_corner = mesh.nearest(&p(1.0, 1.0, 0.0)).unwrap();
    assert_eq!(far_corner.id(), 1);
    assert_eq!(mesh.linear_nearest(&p(1.0, 1.0, 0.0)).unwrap().id(), 1);
}

#[test]
fn test_buffers_reject_short_input() {
    let mut mesh = Mesh::<f64>::new(1e-10);
    let vertices = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    mesh.initialize_from_buffers(&vertices, &[3], 0, 0, 1).unwrap();
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.triangle(0).unwrap().id(), 3);
    assert!(mesh.add_from_buffers(&vertices, &[4], 0, 0, 2).is_err());
}
