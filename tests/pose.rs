//! Pose Estimation Integration Tests
//!
//! Geometric properties of poses computed from marker triangles.

use overlaykit::core::{PoseError, PoseEstimator};
use overlaykit::domain::Vec3;

fn triangles() -> Vec<(Vec3, Vec3, Vec3)> {
    vec![
        (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.12, 0.0),
            Vec3::new(0.0, 0.0, 0.12),
        ),
        (
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(1.3, 2.1, 2.8),
            Vec3::new(0.9, 2.4, 3.2),
        ),
        (
            Vec3::new(-0.5, 0.2, -1.5),
            Vec3::new(-0.4, 0.25, -1.45),
            Vec3::new(-0.55, 0.3, -1.4),
        ),
        (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, -0.2, 0.0),
            Vec3::new(0.2, 0.0, 0.0),
        ),
    ]
}

#[test]
fn test_basis_is_orthonormal_and_right_handed() {
    let estimator = PoseEstimator::default();

    for (p0, p1, p2) in triangles() {
        let pose = estimator.compute_pose(p0, p1, p2).unwrap();
        let m = pose.orientation.to_rotation_matrix();
        let [x, y, z] = m.columns;

        for axis in [x, y, z] {
            assert!((axis.length() - 1.0).abs() < 1e-4, "axis not unit: {}", axis);
        }
        assert!(x.dot(y).abs() < 1e-4);
        assert!(y.dot(z).abs() < 1e-4);
        assert!(z.dot(x).abs() < 1e-4);
        assert!((m.determinant() - 1.0).abs() < 1e-4);
        assert!((pose.orientation.norm() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_position_is_centroid() {
    let estimator = PoseEstimator::default();

    for (p0, p1, p2) in triangles() {
        let pose = estimator.compute_pose(p0, p1, p2).unwrap();
        let centroid = p0.add(p1).add(p2).scale(1.0 / 3.0);
        assert!(pose.position.distance(centroid) < 1e-5);
    }
}

#[test]
fn test_y_axis_points_from_up_marker_to_reference() {
    let estimator = PoseEstimator::default();

    for (p0, p1, p2) in triangles() {
        let pose = estimator.compute_pose(p0, p1, p2).unwrap();
        let y = pose.orientation.rotate(Vec3::new(0.0, 1.0, 0.0));
        assert!(y.distance(p0.sub(p1).normalize()) < 1e-4);
    }
}

#[test]
fn test_marker_order_matters() {
    let estimator = PoseEstimator::default();
    let (p0, p1, p2) = triangles()[1];
    let original = estimator.compute_pose(p0, p1, p2).unwrap();

    let swaps = [
        ("reference/up", (p1, p0, p2)),
        ("up/plane", (p0, p2, p1)),
        ("reference/plane", (p2, p1, p0)),
    ];

    for (name, (a, b, c)) in swaps {
        let swapped = estimator.compute_pose(a, b, c).unwrap();
        assert!(original.position.distance(swapped.position) < 1e-5);

        let before = original.orientation.to_rotation_matrix();
        let after = swapped.orientation.to_rotation_matrix();
        let moved = (0..3)
            .map(|i| before.columns[i].distance(after.columns[i]))
            .fold(0.0f32, f32::max);
        assert!(moved > 0.5, "swapping {} must change the alignment", name);
    }
}

#[test]
fn test_near_collinear_rejected() {
    let estimator = PoseEstimator::default();
    let result = estimator.compute_pose(
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.1, 0.0, 0.0),
        Vec3::new(0.2, 1e-7, 0.0),
    );
    assert_eq!(result, Err(PoseError::DegenerateTriangle));
}
