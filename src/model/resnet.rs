use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use super::{Stage, StageConfig};

/// ResNet-50: a 7x7 stem, four stages of bottleneck blocks and a
/// global-average-pool + linear classification head.
///
/// [Deep Residual Learning for Image Recognition](https://arxiv.org/abs/1512.03385)
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
    stage2: Stage<B>,
    stage3: Stage<B>,
    stage4: Stage<B>,
    stage5: Stage<B>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

/// Configuration to create a [ResNet-50](ResNet).
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Size of the output class-probability vector.
    pub num_classes: usize,
    /// Channels of the input images (1 for grayscale digits, 3 for RGB).
    #[config(default = 1)]
    pub in_channels: usize,
}

impl ResNetConfig {
    /// Initializes a new [ResNet-50](ResNet) model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let conv1 = Conv2dConfig::new([self.in_channels, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // Stages 2 to 5 of the topology table: {3, 4, 6, 3} blocks. Every
        // stage opens with a stride-2 projection block, stage 2 included,
        // matching the source topology this model reproduces.
        let stage2 = StageConfig::new(3, 64, [64, 64, 256]).with_stride(2);
        let stage3 = StageConfig::new(4, 256, [128, 128, 512]).with_stride(2);
        let stage4 = StageConfig::new(6, 512, [256, 256, 1024]).with_stride(2);
        let stage5 = StageConfig::new(3, 1024, [512, 512, 2048]).with_stride(2);

        ResNet {
            conv1,
            bn1: BatchNormConfig::new(64).init(device),
            relu: Relu::new(),
            maxpool,
            stage2: stage2.init(device),
            stage3: stage3.init(device),
            stage4: stage4.init(device),
            stage5: stage5.init(device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(2048, self.num_classes).init(device),
        }
    }
}

impl<B: Backend> ResNet<B> {
    /// Applies the forward pass on a batch of images.
    ///
    /// # Shapes
    ///
    /// - images: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, num_classes]` (logits)
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.bn1.forward(x);
        let x = self.relu.forward(x);
        let x = self.maxpool.forward(x);

        let x = self.stage2.forward(x);
        let x = self.stage3.forward(x);
        let x = self.stage4.forward(x);
        let x = self.stage5.forward(x);

        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);

        self.fc.forward(x)
    }

    /// The four stages of the network, in order.
    pub fn stages(&self) -> [&Stage<B>; 4] {
        [&self.stage2, &self.stage3, &self.stage4, &self.stage5]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn forward_produces_logits_per_class() {
        let device = Default::default();
        let model: ResNet<TestBackend> = ResNetConfig::new(10).init(&device);

        let images = Tensor::zeros([2, 1, 28, 28], &device);
        let output = model.forward(images);

        assert_eq!(output.dims(), [2, 10]);
    }

    #[test]
    fn stage_structure_matches_topology_table() {
        let device = Default::default();
        let model: ResNet<TestBackend> = ResNetConfig::new(10).init(&device);

        let stages = model.stages();
        let num_blocks: Vec<_> = stages.iter().map(|stage| stage.num_blocks()).collect();
        assert_eq!(num_blocks, vec![3, 4, 6, 3]);

        for stage in stages {
            assert!(stage.blocks()[0].is_projection());
            for block in &stage.blocks()[1..] {
                assert!(!block.is_projection());
            }
        }
    }

    #[test]
    fn stage_outputs_expand_channels_and_halve_spatial_dims() {
        let device = Default::default();
        let model: ResNet<TestBackend> = ResNetConfig::new(10).init(&device);

        let mut x = Tensor::zeros([1, 64, 8, 8], &device);
        let expected = [(256, 4), (512, 2), (1024, 1), (2048, 1)];

        for (stage, (channels, size)) in model.stages().into_iter().zip(expected) {
            x = stage.forward(x);
            assert_eq!(x.dims(), [1, channels, size, size]);
        }
    }

    #[test]
    fn rgb_input_is_supported() {
        let device = Default::default();
        let model: ResNet<TestBackend> =
            ResNetConfig::new(100).with_in_channels(3).init(&device);

        let images = Tensor::zeros([1, 3, 32, 32], &device);
        let output = model.forward(images);

        assert_eq!(output.dims(), [1, 100]);
    }
}
