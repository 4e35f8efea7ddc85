use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

// MNIST mean and std values
const MEAN: f32 = 0.1307;
const STD: f32 = 0.3081;

/// Collates MNIST items into batched, normalized image tensors.
#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, 1, 28, 28]))
            // Scale to [0, 1], then standardize with the dataset statistics.
            .map(|tensor| ((tensor / 255) - MEAN) / STD)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data([(item.label as i64).elem::<B::IntElem>()], device)
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn item(pixel: f32, label: u8) -> MnistItem {
        MnistItem {
            image: [[pixel; 28]; 28],
            label,
        }
    }

    #[test]
    fn batch_has_channel_dim_and_int_targets() {
        let device = Default::default();
        let batcher = MnistBatcher::default();

        let batch: MnistBatch<TestBackend> =
            batcher.batch(vec![item(0.0, 3), item(255.0, 7)], &device);

        assert_eq!(batch.images.dims(), [2, 1, 28, 28]);
        assert_eq!(batch.targets.dims(), [2]);

        let labels = batch.targets.into_data();
        assert_eq!(labels.to_vec::<i64>().unwrap(), vec![3, 7]);
    }

    #[test]
    fn pixels_are_standardized() {
        let device = Default::default();
        let batcher = MnistBatcher::default();

        let batch: MnistBatch<TestBackend> = batcher.batch(vec![item(255.0, 0)], &device);
        let pixel = batch
            .images
            .slice([0..1, 0..1, 0..1, 0..1])
            .into_scalar();

        let expected = (1.0 - MEAN) / STD;
        assert!((pixel - expected).abs() < 1e-5);
    }
}
