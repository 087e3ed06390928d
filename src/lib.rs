//! # volume-fusion
//!
//! Core of a multi-planar viewer for two volumes (for example a CT and an MR
//! scan of the same patient), with landmark-based rigid registration of one
//! onto the other.
//!
//! Volumes are loaded from a multi-frame DICOM file, a directory of
//! single-frame DICOM files or a directory of same-sized 2D images. Every
//! volume can be sliced in the three medical planes:
//!  - Transverse (axis 0)
//!  - Coronal (axis 1)
//!  - Sagittal (axis 2)
//!
//! Physical coordinates are centred on each volume, and all conversions
//! between slice indices and millimetres go through [`geometry::Geometry`].
//! Panels showing different volumes are kept in step by the
//! [`sync::ViewSyncBus`], which only ever shares physical points between
//! volumes, so volumes of different resolution line up.
//!
//! Registration collects corresponding landmarks in both volumes, estimates
//! the rigid transform between them and resamples the source volume into the
//! target's frame. Resampling runs on the tokio blocking pool and is
//! parallelised with rayon; the volume stays readable while it runs.
//!
//! # Examples
//!
//! ## Linking two volumes and registering one onto the other
//!
//! ```no_run
//! # use volume_fusion::config::ViewerConfig;
//! # use volume_fusion::enums::SliceSelector;
//! # use volume_fusion::registration::LandmarkSet;
//! # use volume_fusion::viewer::Viewer;
//! # use volume_fusion::volume_loader::LoadOptions;
//! # async fn run() -> Result<(), volume_fusion::viewer::ViewerError> {
//! let mut viewer = Viewer::new(ViewerConfig::default());
//! let ct = viewer.load_volume("ct", LoadOptions::default())?;
//! let mr = viewer.load_volume("mr.dcm", LoadOptions::default())?;
//! let [transverse, _, _] = viewer.register_panels(ct)?;
//! viewer.register_panels(mr)?;
//!
//! // Scroll the CT; the MR follows by physical position.
//! viewer.set_slice(transverse, SliceSelector::Percent(0.5))?;
//!
//! for (source, target) in [([10, 20, 30], [12, 40, 61]), ([5, 5, 5], [6, 9, 11]), ([20, 8, 2], [22, 15, 3])] {
//!     viewer.add_landmark(LandmarkSet::Source, mr, source)?;
//!     viewer.add_landmark(LandmarkSet::Target, ct, target)?;
//! }
//! viewer.compute_registration()?;
//! viewer.apply_registration(mr)?.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod enums;
pub mod geometry;
mod interpolator;
pub mod orienter;
pub mod registration;
pub mod resample;
pub mod shared;
pub mod sync;
pub mod viewer;
pub mod volume;
pub mod volume_loader;
