use crate::{enums::SortBy, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("No slices found in source")]
    EmptySource,

    #[error("Voxel spacing must be positive and finite, got {0:?}")]
    InvalidSpacing([f64; 3]),

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Raw voxel data as produced by an ingestion collaborator.
#[derive(Clone, Debug)]
pub enum VolumeSource {
    /// A single multi-frame stack; frames run along axis 0.
    Stack(Array3<u16>),
    /// Same-sized 2D slices, stacked along axis 0 in order.
    Slices(Vec<Array2<u16>>),
}

impl VolumeSource {
    pub fn into_array(self) -> Result<Array3<u16>, VolumeLoaderError> {
        match self {
            VolumeSource::Stack(stack) => {
                if stack.is_empty() {
                    return Err(VolumeLoaderError::EmptySource);
                }
                Ok(stack)
            }
            VolumeSource::Slices(slices) => {
                let first = slices.first().ok_or(VolumeLoaderError::EmptySource)?;
                let first_dim = first.dim();
                if first.is_empty() {
                    return Err(VolumeLoaderError::EmptySource);
                }
                if let Some(other) = slices.iter().find(|slice| slice.dim() != first_dim) {
                    return Err(VolumeLoaderError::UnsupportedFormat(format!(
                        "slices differ in size: {:?} and {:?}",
                        first_dim,
                        other.dim()
                    )));
                }
                Ok(build_volume_array(&slices))
            }
        }
    }
}

/// How files are turned into a volume.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub sort_by: SortBy,
    /// Overrides spacing read from the files; required for plain images.
    pub voxel_size: Option<[f64; 3]>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a multi-frame DICOM file, or a directory of single-frame DICOM
    /// files or 2D images (`png`, `tif`, `tiff`).
    pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        log::info!("loading volume from {}", path.display());
        if path.is_dir() {
            Self::load_from_directory(path, options)
        } else {
            match Self::file_kind(path) {
                Some(FileKind::Dicom) => Self::load_multiframe(path, options),
                Some(FileKind::Image) => Err(VolumeLoaderError::UnsupportedFormat(format!(
                    "{} is a single 2D image, expected a stack or a directory of slices",
                    path.display()
                ))),
                None => Err(VolumeLoaderError::UnsupportedFormat(format!(
                    "{} is neither DICOM nor a supported image",
                    path.display()
                ))),
            }
        }
    }

    /// Load a volume from single-frame DICOM objects, one slice each.
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        options: LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut images_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, &options.sort_by))
            .collect();

        if images_with_order.is_empty() {
            return Err(VolumeLoaderError::EmptySource);
        }

        Self::sort_images(&mut images_with_order, options.sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        let spacing = match options.voxel_size {
            Some(voxel_size) => voxel_size,
            None => Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?,
        };

        Volume::load_from(VolumeSource::Slices(images), spacing)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        options: LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, options)
    }

    /// Load a volume from a directory of DICOM files or 2D images. The kind
    /// of the first file (by name) decides how the directory is read.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let first = paths.first().ok_or(VolumeLoaderError::EmptySource)?;
        match Self::file_kind(first) {
            Some(kind) => {
                paths.retain(|path| Self::file_kind(path) == Some(kind));
                match kind {
                    FileKind::Dicom => Self::load_from_file_paths(&paths, options),
                    FileKind::Image => Self::load_images(&paths, options),
                }
            }
            None => Err(VolumeLoaderError::UnsupportedFormat(format!(
                "{} is neither DICOM nor a supported image",
                first.display()
            ))),
        }
    }

    fn load_multiframe(path: &Path, options: LoadOptions) -> Result<Volume, VolumeLoaderError> {
        let dicom_object = open_file(path)?;
        let stack = Self::decode_frames(&dicom_object).ok_or(VolumeLoaderError::EmptySource)?;
        let spacing = match options.voxel_size {
            Some(voxel_size) => voxel_size,
            None => Self::get_spacing(std::slice::from_ref(&dicom_object))
                .ok_or(VolumeLoaderError::MissingSpacing)?,
        };
        Volume::load_from(VolumeSource::Stack(stack), spacing)
    }

    fn load_images(paths: &[PathBuf], options: LoadOptions) -> Result<Volume, VolumeLoaderError> {
        let spacing = options.voxel_size.ok_or(VolumeLoaderError::MissingSpacing)?;
        let slices = paths
            .iter()
            .map(|path| {
                let image = image::open(path)?.into_luma16();
                let (width, height) = image.dimensions();
                Array2::from_shape_vec((height as usize, width as usize), image.into_raw()).map_err(
                    |e| VolumeLoaderError::UnsupportedFormat(format!("{}: {e}", path.display())),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Volume::load_from(VolumeSource::Slices(slices), spacing)
    }

    fn file_kind(path: &Path) -> Option<FileKind> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "dcm" | "ima" => Some(FileKind::Dicom),
            "png" | "tif" | "tiff" => Some(FileKind::Image),
            _ => None,
        }
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, Array2<u16>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn decode_frames(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array3<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![.., .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<u16>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    /// Spacing in volume axis order: slice thickness, row spacing, column
    /// spacing.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<[f64; 3]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()
                .and_then(|element| element.to_float64().ok())
                .unwrap_or(*pixel_spacing.first()?);

            Some([slice_thickness, *pixel_spacing.first()?, *pixel_spacing.get(1)?])
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileKind {
    Dicom,
    Image,
}

fn build_volume_array(images: &[Array2<u16>]) -> Array3<u16> {
    let (height, width) = images[0].dim();
    let depth = images.len();
    let mut volume = Array3::<u16>::zeros((depth, height, width));

    for (i, image) in images.iter().enumerate() {
        volume.slice_mut(s![i, .., ..]).assign(image);
    }

    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn stacks_same_sized_slices() {
        let slices = vec![Array2::from_elem((2, 3), 1_u16), Array2::from_elem((2, 3), 2_u16)];
        let volume = Volume::load_from(VolumeSource::Slices(slices), [1.0, 0.5, 0.5]).unwrap();
        assert_eq!(volume.dim(), (2, 2, 3));
        assert_eq!(volume.data()[[1, 1, 2]], 2);
    }

    #[test]
    fn mismatched_slices_are_unsupported() {
        let slices = vec![Array2::zeros((2, 3)), Array2::zeros((3, 2))];
        let result = Volume::load_from(VolumeSource::Slices(slices), [1.0; 3]);
        assert!(matches!(result, Err(VolumeLoaderError::UnsupportedFormat(_))));
    }

    #[test]
    fn no_slices_is_empty_source() {
        let result = Volume::load_from(VolumeSource::Slices(Vec::new()), [1.0; 3]);
        assert!(matches!(result, Err(VolumeLoaderError::EmptySource)));

        let result = Volume::load_from(VolumeSource::Stack(Array3::zeros((0, 2, 2))), [1.0; 3]);
        assert!(matches!(result, Err(VolumeLoaderError::EmptySource)));
    }

    #[test]
    fn empty_directory_is_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = VolumeLoader::load(dir.path(), LoadOptions::default());
        assert!(matches!(result, Err(VolumeLoaderError::EmptySource)));
    }

    #[test]
    fn unknown_file_type_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "not a volume").unwrap();
        let result = VolumeLoader::load(&path, LoadOptions::default());
        assert!(matches!(result, Err(VolumeLoaderError::UnsupportedFormat(_))));

        let result = VolumeLoader::load(dir.path(), LoadOptions::default());
        assert!(matches!(result, Err(VolumeLoaderError::UnsupportedFormat(_))));
    }

    #[test]
    fn loads_directory_of_png_slices_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["slice_02.png", "slice_00.png", "slice_01.png"].iter().enumerate() {
            let value = [2000_u16, 0, 1000][i];
            let image: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(4, 3, Luma([value]));
            image.save(dir.path().join(name)).unwrap();
        }

        let options = LoadOptions {
            voxel_size: Some([2.0, 1.0, 1.0]),
            ..LoadOptions::default()
        };
        let volume = VolumeLoader::load(dir.path(), options).unwrap();
        assert_eq!(volume.dim(), (3, 3, 4));
        assert_eq!(volume.data()[[0, 0, 0]], 0);
        assert_eq!(volume.data()[[1, 2, 3]], 1000);
        assert_eq!(volume.data()[[2, 1, 1]], 2000);
        assert_eq!(volume.extent_mm(), [6.0, 3.0, 4.0]);
    }

    #[test]
    fn images_without_voxel_size_miss_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let image: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(2, 2, Luma([7]));
        image.save(dir.path().join("a.png")).unwrap();
        let result = VolumeLoader::load(dir.path(), LoadOptions::default());
        assert!(matches!(result, Err(VolumeLoaderError::MissingSpacing)));
    }
}
