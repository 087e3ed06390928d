//! A volume shared between the interaction thread and a background resample.
//!
//! While a resample is in flight the volume stays readable for display but
//! every write is refused. The resampled voxels are swapped in under the
//! write lock in a single step, so readers see either the old or the new
//! array, never a mix.

use crate::enums::InterpolationOrder;
use crate::geometry::Geometry;
use crate::registration::RigidTransform;
use crate::resample::{ResampleEngine, ResampleError, VoxelTransform};
use crate::volume::Volume;

use ndarray::Array3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Debug)]
pub struct SharedVolume {
    inner: Arc<RwLock<Volume>>,
    busy: Arc<AtomicBool>,
}

impl SharedVolume {
    pub fn new(volume: Volume) -> Self {
        Self {
            inner: Arc::new(RwLock::new(volume)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Volume> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn geometry(&self) -> Geometry {
        self.read().geometry()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Exclusive access for a user-triggered mutation; refused while a
    /// resample runs.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Volume>, ResampleError> {
        if self.is_busy() {
            log::warn!("refusing to modify a volume while it is being resampled");
            return Err(ResampleError::VolumeBusy);
        }
        Ok(self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Mark the volume busy and prepare a resample with `transform`. The
    /// volume is untouched if the transform cannot be inverted.
    pub fn begin_resample(
        &self,
        transform: &RigidTransform,
        order: InterpolationOrder,
    ) -> Result<ResampleJob, ResampleError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ResampleError::VolumeBusy);
        }
        let guard = BusyGuard {
            flag: Arc::clone(&self.busy),
        };

        let (voxels, geometry) = {
            let volume = self.read();
            (volume.shared_data(), volume.geometry())
        };
        let transform = VoxelTransform::from_physical(transform, &geometry)?;

        Ok(ResampleJob {
            volume: self.clone(),
            voxels,
            spacing: geometry.spacing,
            transform,
            order,
            busy: guard,
        })
    }

    fn publish(&self, voxels: Array3<u16>, spacing: [f64; 3]) {
        let mut volume = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        volume.replace(voxels, spacing);
        log::info!(
            "published resampled volume, generation {}",
            volume.generation()
        );
    }
}

/// A prepared resample. Dropping it without running releases the volume.
#[derive(Debug)]
pub struct ResampleJob {
    volume: SharedVolume,
    voxels: Arc<Array3<u16>>,
    spacing: [f64; 3],
    transform: VoxelTransform,
    order: InterpolationOrder,
    busy: BusyGuard,
}

impl ResampleJob {
    /// Resample on the blocking pool and publish the result. Runs to
    /// completion; there is no cancellation.
    pub async fn run(self) -> Result<(), ResampleError> {
        let ResampleJob {
            volume,
            voxels,
            spacing,
            transform,
            order,
            busy,
        } = self;

        let resampled = tokio::task::spawn_blocking(move || {
            ResampleEngine::resample(&voxels, &transform, order)
        })
        .await?;

        volume.publish(resampled, spacing);
        drop(busy);
        Ok(())
    }
}

#[derive(Debug)]
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
