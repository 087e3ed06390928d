//! Crosshair and slice synchronisation between 2D panels.
//!
//! Panels register with the bus as a `(volume, plane)` pair. An interaction in
//! one panel is turned into a physical point, and every panel derives its own
//! crosshair and slice index from that point using its own volume's geometry.
//! Indices are never shared between volumes.

use crate::cursor::SliceCursor;
use crate::enums::{Orientation, SliceSelector};
use crate::shared::SharedVolume;
use crate::volume::Volume;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Unknown panel {0:?}")]
    UnknownPanel(PanelId),

    #[error("Unknown volume {0:?}")]
    UnknownVolume(VolumeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PanelId(usize);

/// Position of a volume in the slice handed to the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VolumeId(pub usize);

/// A loaded volume together with the cursor the panels showing it share.
#[derive(Clone, Debug)]
pub struct ViewedVolume {
    pub handle: SharedVolume,
    pub cursor: SliceCursor,
}

impl ViewedVolume {
    pub fn new(volume: Volume) -> Self {
        let cursor = SliceCursor::centred(&volume.geometry());
        Self {
            handle: SharedVolume::new(volume),
            cursor,
        }
    }
}

/// Crosshair of one panel, as (column, row).
#[derive(Clone, Debug, PartialEq)]
pub struct Crosshair {
    pub mm: [f64; 2],
    pub pixel: [usize; 2],
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PanelUpdate {
    pub panel: PanelId,
    pub crosshair: Crosshair,
    /// New active slice, only when the event moved this panel's axis.
    pub slice_index: Option<usize>,
}

/// Every panel update caused by one user event. The frame is only handed out
/// once complete, so a consumer redraws once per frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncFrame {
    pub point: [f64; 3],
    pub updates: Vec<PanelUpdate>,
    pub redraw: bool,
}

impl SyncFrame {
    pub fn update_for(&self, panel: PanelId) -> Option<&PanelUpdate> {
        self.updates.iter().find(|update| update.panel == panel)
    }
}

#[derive(Clone, Copy, Debug)]
struct PanelEntry {
    volume: VolumeId,
    plane: Orientation,
}

#[derive(Clone, Debug)]
pub struct ViewSyncBus {
    panels: Vec<PanelEntry>,
    linked: bool,
    crosshair_visible: bool,
}

impl Default for ViewSyncBus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ViewSyncBus {
    pub fn new(linked: bool) -> Self {
        Self {
            panels: Vec::new(),
            linked,
            crosshair_visible: true,
        }
    }

    pub fn register_panel(&mut self, volume: VolumeId, plane: Orientation) -> PanelId {
        self.panels.push(PanelEntry { volume, plane });
        PanelId(self.panels.len() - 1)
    }

    pub fn panel(&self, panel: PanelId) -> Result<(VolumeId, Orientation), SyncError> {
        self.panels
            .get(panel.0)
            .map(|entry| (entry.volume, entry.plane))
            .ok_or(SyncError::UnknownPanel(panel))
    }

    pub fn panels(&self) -> impl Iterator<Item = (PanelId, VolumeId, Orientation)> + '_ {
        self.panels
            .iter()
            .enumerate()
            .map(|(id, entry)| (PanelId(id), entry.volume, entry.plane))
    }

    pub fn linked(&self) -> bool {
        self.linked
    }

    /// Switching linkage on does not move anything by itself; follow with
    /// [`ViewSyncBus::resync`] to bring the other volumes along.
    pub fn set_linked(&mut self, linked: bool) {
        self.linked = linked;
    }

    pub fn crosshair_visible(&self) -> bool {
        self.crosshair_visible
    }

    pub fn set_crosshair_visible(&mut self, visible: bool) {
        self.crosshair_visible = visible;
    }

    /// A click or drag at continuous voxel position (`column`, `row`) of a
    /// panel. The two in-plane axes move; the out-of-plane coordinate is the
    /// volume's current slice.
    pub fn on_pointer_event(
        &self,
        volumes: &mut [ViewedVolume],
        panel: PanelId,
        column: f64,
        row: f64,
    ) -> Result<SyncFrame, SyncError> {
        let (volume_id, plane) = self.panel(panel)?;
        let viewed = lookup(volumes, volume_id)?;
        let geometry = viewed.handle.geometry();
        let (column_axis, row_axis) = plane.in_plane_axes();

        let mut point = viewed.cursor.mm();
        point[column_axis] = geometry.mm_at(column_axis, column);
        point[row_axis] = geometry.mm_at(row_axis, row);

        self.broadcast_physical_point(volumes, point, &[column_axis, row_axis], volume_id)
    }

    /// A slider or scroll on a panel, moving its own axis.
    pub fn on_slice_change(
        &self,
        volumes: &mut [ViewedVolume],
        panel: PanelId,
        selector: SliceSelector,
    ) -> Result<SyncFrame, SyncError> {
        let (volume_id, plane) = self.panel(panel)?;
        let viewed = lookup(volumes, volume_id)?;
        let geometry = viewed.handle.geometry();
        let axis = plane.axis();

        let mut scratch = viewed.cursor.clone();
        let index = scratch.select(&geometry, axis, selector);
        let mut point = viewed.cursor.mm();
        point[axis] = geometry.mm_from_index(axis, index);

        self.broadcast_physical_point(volumes, point, &[axis], volume_id)
    }

    /// Fan a physical point out to every panel.
    ///
    /// All panels get a crosshair. Cursors move only along `changed_axes`, and
    /// only for the originating volume unless the bus is linked.
    pub fn broadcast_physical_point(
        &self,
        volumes: &mut [ViewedVolume],
        point: [f64; 3],
        changed_axes: &[usize],
        origin: VolumeId,
    ) -> Result<SyncFrame, SyncError> {
        lookup(volumes, origin)?;
        for entry in &self.panels {
            lookup(volumes, entry.volume)?;
        }

        for (id, viewed) in volumes.iter_mut().enumerate() {
            if id != origin.0 && !self.linked {
                continue;
            }
            let geometry = viewed.handle.geometry();
            for &axis in changed_axes {
                viewed
                    .cursor
                    .select(&geometry, axis, SliceSelector::Mm(point[axis]));
            }
        }

        let mut frame = SyncFrame {
            point,
            updates: Vec::with_capacity(self.panels.len()),
            redraw: false,
        };
        for (id, entry) in self.panels.iter().enumerate() {
            let viewed = &volumes[entry.volume.0];
            let geometry = viewed.handle.geometry();
            let (column_axis, row_axis) = entry.plane.in_plane_axes();
            let axis = entry.plane.axis();

            let moves_slice = changed_axes.contains(&axis) && (entry.volume == origin || self.linked);
            frame.updates.push(PanelUpdate {
                panel: PanelId(id),
                crosshair: Crosshair {
                    mm: [point[column_axis], point[row_axis]],
                    pixel: [
                        geometry.index_from_mm(column_axis, point[column_axis]),
                        geometry.index_from_mm(row_axis, point[row_axis]),
                    ],
                    visible: self.crosshair_visible,
                },
                slice_index: moves_slice.then(|| viewed.cursor.index_on(axis)),
            });
        }
        frame.redraw = true;

        log::debug!(
            "sync frame at {:?} mm: {} panel updates, linked {}",
            point,
            frame.updates.len(),
            self.linked
        );
        Ok(frame)
    }

    /// Move every volume onto the physical position of `origin`'s cursor.
    pub fn resync(
        &self,
        volumes: &mut [ViewedVolume],
        origin: VolumeId,
    ) -> Result<SyncFrame, SyncError> {
        let point = lookup(volumes, origin)?.cursor.mm();
        self.broadcast_physical_point(volumes, point, &[0, 1, 2], origin)
    }
}

fn lookup(volumes: &[ViewedVolume], id: VolumeId) -> Result<&ViewedVolume, SyncError> {
    volumes.get(id.0).ok_or(SyncError::UnknownVolume(id))
}
