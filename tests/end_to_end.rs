use float_eq::assert_float_eq;
use nalgebra::Point3;
use ndarray::Array3;
use volume_fusion::{
    config::ViewerConfig,
    enums::{InterpolationOrder, Orientation, RotationDirection, SliceSelector},
    registration::{LandmarkSet, compute_rigid_transform},
    viewer::Viewer,
    volume::Volume,
};

fn ramp(dim: (usize, usize, usize)) -> Array3<u16> {
    Array3::from_shape_fn(dim, |(i, j, k)| (1 + i * 100 + j * 10 + k) as u16)
}

#[test]
fn flip_keeps_crosshair_on_the_same_voxel() {
    let mut viewer = Viewer::new(ViewerConfig::default());
    let id = viewer.add_volume(Volume::new(ramp((4, 4, 4)), [1.0, 1.0, 1.0]).unwrap());
    let panels = viewer.register_panels(id).unwrap();

    for (panel, index) in panels.into_iter().zip([1, 2, 3]) {
        viewer.set_slice(panel, SliceSelector::Index(index)).unwrap();
    }
    let viewed = viewer.volume(id).unwrap();
    assert_eq!(viewed.cursor.index(), [1, 2, 3]);
    let geometry = viewed.handle.geometry();
    assert_float_eq!(geometry.mm_from_index(0, 1), -1.0, abs <= 1e-12);
    assert_float_eq!(geometry.mm_from_index(1, 2), 0.0, abs <= 1e-12);
    assert_float_eq!(geometry.mm_from_index(2, 3), 1.0, abs <= 1e-12);
    let before = viewed.handle.read().data()[[1, 2, 3]];

    viewer.flip(id, Orientation::Transverse).unwrap();

    let viewed = viewer.volume(id).unwrap();
    assert_eq!(viewed.cursor.index(), [2, 2, 3]);
    assert_eq!(viewed.handle.read().data()[[2, 2, 3]], before);
}

#[test]
fn quarter_turn_and_reset() {
    let mut viewer = Viewer::new(ViewerConfig::default());
    let original = ramp((3, 4, 5));
    let id = viewer.add_volume(Volume::new(original.clone(), [1.0, 2.0, 3.0]).unwrap());

    viewer
        .rotate90(id, Orientation::Sagittal, RotationDirection::Counterclockwise)
        .unwrap();
    {
        let volume = viewer.volume(id).unwrap().handle.read();
        assert_eq!(volume.dim(), (4, 3, 5));
        assert_eq!(volume.spacing(), [2.0, 1.0, 3.0]);
    }

    viewer.reset(id).unwrap();
    let viewed = viewer.volume(id).unwrap();
    assert_eq!(viewed.handle.read().data(), &original);
    assert_eq!(viewed.cursor.index(), [2, 2, 3]);
}

#[test]
fn registration_recovers_quarter_turn_about_z() {
    let source = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let target = [
        Point3::new(5.0, 5.0, 0.0),
        Point3::new(5.0, 6.0, 0.0),
        Point3::new(4.0, 5.0, 0.0),
    ];

    let transform = compute_rigid_transform(&source, &target).unwrap();

    assert_float_eq!(transform.rotation().determinant(), 1.0, abs <= 1e-9);
    for (p, q) in source.iter().zip(&target) {
        let mapped = transform.transform_point(p);
        assert_float_eq!(mapped.x, q.x, abs <= 1e-9);
        assert_float_eq!(mapped.y, q.y, abs <= 1e-9);
        assert_float_eq!(mapped.z, q.z, abs <= 1e-9);
    }
}

#[tokio::test]
async fn registered_volume_lands_on_target() {
    let blob = Array3::from_shape_fn((8, 8, 8), |(i, j, k)| {
        if (2..6).contains(&i) && (2..6).contains(&j) && (2..7).contains(&k) {
            (50 + i * 30 + j * 5 + k) as u16
        } else {
            0
        }
    });
    let shift = [1_isize, 2, -1];
    let shifted = Array3::from_shape_fn((8, 8, 8), |(i, j, k)| {
        let from = [
            i as isize - shift[0],
            j as isize - shift[1],
            k as isize - shift[2],
        ];
        if from.iter().all(|&c| (0..8).contains(&c)) {
            blob[[from[0] as usize, from[1] as usize, from[2] as usize]]
        } else {
            0
        }
    });

    let mut viewer = Viewer::new(ViewerConfig {
        interpolation_order: InterpolationOrder::Nearest,
        ..ViewerConfig::default()
    });
    let moving = viewer.add_volume(Volume::new(blob, [1.0; 3]).unwrap());
    let fixed = viewer.add_volume(Volume::new(shifted.clone(), [1.0; 3]).unwrap());

    for index in [[2, 2, 2], [5, 2, 3], [2, 5, 2], [3, 3, 6]] {
        let moved = [index[0] + 1, index[1] + 2, index[2] - 1];
        viewer.add_landmark(LandmarkSet::Source, moving, index).unwrap();
        viewer.add_landmark(LandmarkSet::Target, fixed, moved).unwrap();
    }
    let transform = viewer.compute_registration().unwrap();
    assert_float_eq!(transform.translation().x, 1.0, abs <= 1e-9);
    assert_float_eq!(transform.translation().y, 2.0, abs <= 1e-9);
    assert_float_eq!(transform.translation().z, -1.0, abs <= 1e-9);

    let job = viewer.apply_registration(moving).unwrap();
    assert!(viewer.volume(moving).unwrap().handle.is_busy());
    job.run().await.unwrap();

    let exported = viewer.export(moving).unwrap();
    assert_eq!(exported.voxels, shifted);
    assert_eq!(exported.spacing, [1.0; 3]);
    assert_eq!(viewer.volume(moving).unwrap().handle.read().generation(), 1);
}
