//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait and `Batcher` for the training loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::warn;

use super::loader::ImageSample;
use super::preprocess::load_image_tensor;
use crate::utils::error::Result;

/// A single preprocessed image ready for batching
#[derive(Clone, Debug)]
pub struct BeanPartsItem {
    /// Image data as flattened CHW float array [3 * H * W], values in 0..=1
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Source path (for logging)
    pub path: PathBuf,
}

impl BeanPartsItem {
    /// Load and preprocess an image
    pub fn from_sample(sample: &ImageSample, image_size: usize) -> Result<Self> {
        Ok(Self {
            image: load_image_tensor(&sample.path, image_size)?,
            label: sample.label,
            path: sample.path.clone(),
        })
    }
}

/// Labeled image set backed by files on disk
///
/// Images are decoded on demand unless the dataset was built with
/// [`BeanPartsDataset::new_cached`].
#[derive(Debug, Clone)]
pub struct BeanPartsDataset {
    samples: Vec<ImageSample>,
    image_size: usize,
    cached_items: Option<Vec<BeanPartsItem>>,
}

impl BeanPartsDataset {
    /// Create a lazily-loading dataset
    pub fn new(samples: Vec<ImageSample>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
            cached_items: None,
        }
    }

    /// Create a dataset with every image decoded up front (in parallel)
    ///
    /// Fails on the first image that cannot be decoded.
    pub fn new_cached(samples: Vec<ImageSample>, image_size: usize) -> Result<Self> {
        let total = samples.len();

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let loaded = AtomicUsize::new(0);

        let items: Result<Vec<_>> = samples
            .par_iter()
            .map(|sample| {
                let item = BeanPartsItem::from_sample(sample, image_size);
                let count = loaded.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 25 == 0 || count == total {
                    pb.set_position(count as u64);
                }
                item
            })
            .collect();

        let items = items?;
        pb.finish_and_clear();

        Ok(Self {
            samples,
            image_size,
            cached_items: Some(items),
        })
    }

    /// Get an item, propagating decode failures
    pub fn try_get(&self, index: usize) -> Result<Option<BeanPartsItem>> {
        if let Some(cached) = &self.cached_items {
            return Ok(cached.get(index).cloned());
        }

        match self.samples.get(index) {
            Some(sample) => BeanPartsItem::from_sample(sample, self.image_size).map(Some),
            None => Ok(None),
        }
    }

    /// Load several items in parallel, preserving the order of `indices`
    pub fn get_many(&self, indices: &[usize]) -> Result<Vec<BeanPartsItem>> {
        let items: Result<Vec<Option<BeanPartsItem>>> =
            indices.par_iter().map(|&i| self.try_get(i)).collect();
        Ok(items?.into_iter().flatten().collect())
    }
}

impl Dataset<BeanPartsItem> for BeanPartsDataset {
    fn get(&self, index: usize) -> Option<BeanPartsItem> {
        match self.try_get(index) {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping unreadable sample {}: {}", index, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of images and their labels
#[derive(Clone, Debug)]
pub struct BeanPartsBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher turning preprocessed items into tensors
#[derive(Clone, Debug)]
pub struct BeanPartsBatcher {
    image_size: usize,
}

impl BeanPartsBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, BeanPartsItem, BeanPartsBatch<B>> for BeanPartsBatcher {
    fn batch(&self, items: Vec<BeanPartsItem>, device: &B::Device) -> BeanPartsBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.iter().copied()).collect();
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        BeanPartsBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn write_samples(dir: &std::path::Path, n: usize) -> Vec<ImageSample> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("img_{}.png", i));
                RgbImage::from_pixel(12, 12, Rgb([(i * 40) as u8, 100, 200])).save(&path).unwrap();
                ImageSample { path, label: i % 2 }
            })
            .collect()
    }

    #[test]
    fn test_lazy_and_cached_agree() {
        let tmp = TempDir::new().unwrap();
        let samples = write_samples(tmp.path(), 4);

        let lazy = BeanPartsDataset::new(samples.clone(), 8);
        let cached = BeanPartsDataset::new_cached(samples, 8).unwrap();

        assert_eq!(lazy.len(), 4);
        assert_eq!(cached.len(), 4);
        for i in 0..4 {
            let a = lazy.get(i).unwrap();
            let b = cached.get(i).unwrap();
            assert_eq!(a.image, b.image);
            assert_eq!(a.label, b.label);
        }
        assert!(lazy.get(4).is_none());
    }

    #[test]
    fn test_get_many_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let samples = write_samples(tmp.path(), 5);
        let dataset = BeanPartsDataset::new(samples.clone(), 8);

        let items = dataset.get_many(&[3, 0, 4]).unwrap();

        let paths: Vec<_> = items.iter().map(|i| i.path.clone()).collect();
        assert_eq!(paths, vec![samples[3].path.clone(), samples[0].path.clone(), samples[4].path.clone()]);
    }

    #[test]
    fn test_unreadable_image_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut samples = write_samples(tmp.path(), 2);
        let broken = tmp.path().join("broken.png");
        std::fs::write(&broken, b"garbage").unwrap();
        samples.push(ImageSample { path: broken, label: 0 });

        let dataset = BeanPartsDataset::new(samples.clone(), 8);
        assert!(dataset.get_many(&[0, 2]).is_err());
        assert!(dataset.get(2).is_none());
        assert!(BeanPartsDataset::new_cached(samples, 8).is_err());
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let items = vec![
            BeanPartsItem { image: vec![0.5; 3 * 8 * 8], label: 1, path: PathBuf::from("a.png") },
            BeanPartsItem { image: vec![0.25; 3 * 8 * 8], label: 3, path: PathBuf::from("b.png") },
        ];

        let batch: BeanPartsBatch<TestBackend> = BeanPartsBatcher::new(8).batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);
        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![1, 3]);
    }
}
