//! The controller tying loaded volumes, their cursors, the sync bus and the
//! registration session together.
//!
//! Panels hold no reference back to the viewer; they register with the bus and
//! receive [`SyncFrame`]s from the viewer's event methods.

use crate::config::ViewerConfig;
use crate::enums::{Orientation, RotationDirection, SliceSelector};
use crate::orienter::VolumeOrienter;
use crate::registration::{
    LandmarkSet, RegistrationError, RegistrationSession, RigidTransform, landmark_from_index,
};
use crate::resample::ResampleError;
use crate::shared::ResampleJob;
use crate::sync::{PanelId, SyncError, SyncFrame, ViewSyncBus, ViewedVolume, VolumeId};
use crate::volume::{ExportedVolume, Volume};
use crate::volume_loader::{LoadOptions, VolumeLoader, VolumeLoaderError};

use image::{ImageBuffer, Luma};
use nalgebra::Point3;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Load(#[from] VolumeLoaderError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub struct Viewer {
    config: ViewerConfig,
    volumes: Vec<ViewedVolume>,
    bus: ViewSyncBus,
    session: RegistrationSession,
    active: Option<VolumeId>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            volumes: Vec::new(),
            bus: ViewSyncBus::new(config.linked),
            session: RegistrationSession::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn add_volume(&mut self, volume: Volume) -> VolumeId {
        self.volumes.push(ViewedVolume::new(volume));
        VolumeId(self.volumes.len() - 1)
    }

    pub fn load_volume(
        &mut self,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<VolumeId, ViewerError> {
        let volume = VolumeLoader::load(path, options)?;
        Ok(self.add_volume(volume))
    }

    pub fn volume(&self, id: VolumeId) -> Result<&ViewedVolume, ViewerError> {
        self.volumes
            .get(id.0)
            .ok_or(ViewerError::Sync(SyncError::UnknownVolume(id)))
    }

    pub fn volumes(&self) -> &[ViewedVolume] {
        &self.volumes
    }

    pub fn bus(&self) -> &ViewSyncBus {
        &self.bus
    }

    pub fn session(&self) -> &RegistrationSession {
        &self.session
    }

    pub fn register_panel(
        &mut self,
        volume: VolumeId,
        plane: Orientation,
    ) -> Result<PanelId, ViewerError> {
        self.volume(volume)?;
        Ok(self.bus.register_panel(volume, plane))
    }

    /// One panel per plane, in [`Orientation::ALL`] order.
    pub fn register_panels(&mut self, volume: VolumeId) -> Result<[PanelId; 3], ViewerError> {
        let [t, c, s] = Orientation::ALL;
        Ok([
            self.register_panel(volume, t)?,
            self.register_panel(volume, c)?,
            self.register_panel(volume, s)?,
        ])
    }

    pub fn pointer(
        &mut self,
        panel: PanelId,
        column: f64,
        row: f64,
    ) -> Result<SyncFrame, ViewerError> {
        let frame = self
            .bus
            .on_pointer_event(&mut self.volumes, panel, column, row)?;
        self.active = Some(self.bus.panel(panel)?.0);
        Ok(frame)
    }

    pub fn set_slice(
        &mut self,
        panel: PanelId,
        selector: SliceSelector,
    ) -> Result<SyncFrame, ViewerError> {
        let frame = self
            .bus
            .on_slice_change(&mut self.volumes, panel, selector)?;
        self.active = Some(self.bus.panel(panel)?.0);
        Ok(frame)
    }

    /// Change linkage. Linking again pulls every volume onto the position of
    /// the volume that was last interacted with.
    pub fn set_linked(&mut self, linked: bool) -> Result<Option<SyncFrame>, ViewerError> {
        self.bus.set_linked(linked);
        self.config.linked = linked;
        match (linked, self.active) {
            (true, Some(origin)) => Ok(Some(self.bus.resync(&mut self.volumes, origin)?)),
            _ => Ok(None),
        }
    }

    pub fn set_crosshair_visible(&mut self, visible: bool) {
        self.bus.set_crosshair_visible(visible);
    }

    pub fn rotate90(
        &mut self,
        id: VolumeId,
        plane: Orientation,
        direction: RotationDirection,
    ) -> Result<(), ViewerError> {
        let viewed = self.viewed_mut(id)?;
        let mut volume = viewed.handle.write()?;
        VolumeOrienter::rotate90(&mut volume, &mut viewed.cursor, plane, direction);
        Ok(())
    }

    pub fn flip(&mut self, id: VolumeId, axis: Orientation) -> Result<(), ViewerError> {
        let viewed = self.viewed_mut(id)?;
        let mut volume = viewed.handle.write()?;
        VolumeOrienter::flip(&mut volume, &mut viewed.cursor, axis);
        Ok(())
    }

    /// Mirror the volume shown in `panel` along one of its screen directions.
    pub fn flip_panel(&mut self, panel: PanelId, horizontal: bool) -> Result<(), ViewerError> {
        let (id, plane) = self.bus.panel(panel)?;
        let viewed = self.viewed_mut(id)?;
        let mut volume = viewed.handle.write()?;
        VolumeOrienter::flip_in_plane(&mut volume, &mut viewed.cursor, plane, horizontal);
        Ok(())
    }

    /// Restore a volume as loaded; undoes orientation changes and any applied
    /// registration.
    pub fn reset(&mut self, id: VolumeId) -> Result<(), ViewerError> {
        let viewed = self.viewed_mut(id)?;
        let mut volume = viewed.handle.write()?;
        volume.reset(&mut viewed.cursor);
        log::info!("reset volume {} to its loaded state", id.0);
        Ok(())
    }

    /// Zero-pad every volume to the largest physical extent found along each
    /// axis. Returns whether any volume grew.
    pub fn match_extents(&mut self) -> Result<bool, ViewerError> {
        if self.volumes.iter().any(|viewed| viewed.handle.is_busy()) {
            return Err(ResampleError::VolumeBusy.into());
        }
        let mut target = [0.0_f64; 3];
        for viewed in &self.volumes {
            let extent = viewed.handle.read().extent_mm();
            for axis in 0..3 {
                target[axis] = target[axis].max(extent[axis]);
            }
        }

        let mut padded = false;
        for viewed in &mut self.volumes {
            let mut volume = viewed.handle.write()?;
            padded |= volume.pad_to_dims(target, &mut viewed.cursor);
        }
        if padded {
            log::info!("matched volume extents to {target:?} mm");
        }
        Ok(padded)
    }

    /// Add the physical position of a volume's cursor as a landmark.
    pub fn add_landmark_from_cursor(
        &mut self,
        set: LandmarkSet,
        id: VolumeId,
    ) -> Result<Point3<f64>, ViewerError> {
        let viewed = self.volume(id)?;
        let point = landmark_from_index(&viewed.handle.geometry(), viewed.cursor.index());
        self.session.add_point(set, point);
        Ok(point)
    }

    pub fn add_landmark(
        &mut self,
        set: LandmarkSet,
        id: VolumeId,
        index: [usize; 3],
    ) -> Result<Point3<f64>, ViewerError> {
        let geometry = self.volume(id)?.handle.geometry();
        let point = landmark_from_index(&geometry, index);
        self.session.add_point(set, point);
        Ok(point)
    }

    pub fn remove_landmark(&mut self, set: LandmarkSet, position: usize) -> Option<Point3<f64>> {
        self.session.remove_point(set, position)
    }

    pub fn clear_landmarks(&mut self) {
        self.session.clear();
    }

    pub fn compute_registration(&mut self) -> Result<RigidTransform, ViewerError> {
        Ok(self.session.compute()?)
    }

    /// Prepare resampling of `id` with the computed transform. The volume is
    /// locked for writes as soon as this returns; run the job to finish.
    pub fn apply_registration(&self, id: VolumeId) -> Result<ResampleJob, ViewerError> {
        let transform = self.session.transform().ok_or(ResampleError::NoTransform)?;
        let job = self
            .volume(id)?
            .handle
            .begin_resample(transform, self.config.interpolation_order)?;
        Ok(job)
    }

    /// Render the active slice of a panel with the configured clip window.
    pub fn render(
        &self,
        panel: PanelId,
    ) -> Result<Option<ImageBuffer<Luma<u8>, Vec<u8>>>, ViewerError> {
        let (id, plane) = self.bus.panel(panel)?;
        let viewed = self.volume(id)?;
        let volume = viewed.handle.read();
        Ok(volume.render_slice(
            viewed.cursor.index_on(plane.axis()),
            plane,
            self.config.clip,
            self.config.display_interpolation,
        ))
    }

    /// Display extent of a panel in mm.
    pub fn plane_extent(&self, panel: PanelId) -> Result<[f64; 4], ViewerError> {
        let (id, plane) = self.bus.panel(panel)?;
        let (column_axis, row_axis) = plane.in_plane_axes();
        Ok(self
            .volume(id)?
            .handle
            .geometry()
            .plane_extent(column_axis, row_axis))
    }

    pub fn export(&self, id: VolumeId) -> Result<ExportedVolume, ViewerError> {
        Ok(self.volume(id)?.handle.read().export())
    }

    fn viewed_mut(&mut self, id: VolumeId) -> Result<&mut ViewedVolume, ViewerError> {
        self.volumes
            .get_mut(id.0)
            .ok_or(ViewerError::Sync(SyncError::UnknownVolume(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::InterpolationOrder;
    use ndarray::Array3;

    fn viewer() -> (Viewer, VolumeId, VolumeId) {
        let mut viewer = Viewer::new(ViewerConfig {
            interpolation_order: InterpolationOrder::Nearest,
            ..ViewerConfig::default()
        });
        let a = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (1 + i * 16 + j * 4 + k) as u16);
        let b = Array3::from_shape_fn((2, 6, 4), |(i, j, k)| (i + j + k) as u16);
        let first = viewer.add_volume(Volume::new(a, [1.0; 3]).unwrap());
        let second = viewer.add_volume(Volume::new(b, [1.0; 3]).unwrap());
        (viewer, first, second)
    }

    #[test]
    fn match_extents_pads_both_volumes() {
        let (mut viewer, first, second) = viewer();
        assert!(viewer.match_extents().unwrap());
        assert_eq!(viewer.volume(first).unwrap().handle.read().dim(), (4, 6, 4));
        assert_eq!(viewer.volume(second).unwrap().handle.read().dim(), (4, 6, 4));
        assert!(!viewer.match_extents().unwrap());
    }

    #[test]
    fn orientation_is_refused_while_resampling() {
        let (mut viewer, first, _) = viewer();
        for index in [[0, 0, 0], [1, 0, 0], [0, 1, 0]] {
            viewer.add_landmark(LandmarkSet::Source, first, index).unwrap();
            viewer.add_landmark(LandmarkSet::Target, first, index).unwrap();
        }
        viewer.compute_registration().unwrap();

        let job = viewer.apply_registration(first).unwrap();
        assert!(matches!(
            viewer.flip(first, Orientation::Sagittal),
            Err(ViewerError::Resample(ResampleError::VolumeBusy))
        ));
        drop(job);
        assert!(viewer.flip(first, Orientation::Sagittal).is_ok());
    }

    #[test]
    fn apply_without_transform_is_refused() {
        let (viewer, first, _) = viewer();
        assert!(matches!(
            viewer.apply_registration(first),
            Err(ViewerError::Resample(ResampleError::NoTransform))
        ));
    }

    #[test]
    fn landmark_from_cursor_uses_physical_position() {
        let (mut viewer, first, _) = viewer();
        let panels = viewer.register_panels(first).unwrap();
        viewer.pointer(panels[0], 3.0, 1.0).unwrap();
        let point = viewer
            .add_landmark_from_cursor(LandmarkSet::Source, first)
            .unwrap();
        assert_eq!(point, Point3::new(0.0, -1.0, 1.0));
        assert_eq!(viewer.session().points(LandmarkSet::Source).len(), 1);
        assert_eq!(viewer.remove_landmark(LandmarkSet::Source, 0), Some(point));
    }

    #[test]
    fn relinking_resyncs_from_last_active_volume() {
        let (mut viewer, first, second) = viewer();
        let panels = viewer.register_panels(first).unwrap();
        viewer.register_panels(second).unwrap();

        assert!(viewer.set_linked(false).unwrap().is_none());
        viewer.set_slice(panels[0], SliceSelector::Index(0)).unwrap();
        assert_eq!(viewer.volume(second).unwrap().cursor.index_on(0), 1);

        let frame = viewer.set_linked(true).unwrap().unwrap();
        assert!(frame.redraw);
        assert_eq!(viewer.volume(second).unwrap().cursor.index_on(0), 0);
    }

    #[test]
    fn render_uses_cursor_slice() {
        let (mut viewer, first, _) = viewer();
        let panels = viewer.register_panels(first).unwrap();
        viewer.set_slice(panels[0], SliceSelector::Index(3)).unwrap();
        let image = viewer.render(panels[0]).unwrap().unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.get_pixel(3, 3)[0], 255);
        assert_eq!(viewer.plane_extent(panels[1]).unwrap(), [-2.0, 2.0, -2.0, 2.0]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let (mut viewer, _, _) = viewer();
        assert!(matches!(
            viewer.register_panel(VolumeId(9), Orientation::Coronal),
            Err(ViewerError::Sync(SyncError::UnknownVolume(VolumeId(9))))
        ));
        assert!(viewer.reset(VolumeId(9)).is_err());
    }
}
