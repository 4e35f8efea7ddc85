use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Bottleneck residual block: a 1x1 reduce, 3x3, 1x1 expand stack whose input
/// is added back on a shortcut path before the final activation.
///
/// When the block changes the channel count or the spatial size, the shortcut
/// goes through a 1x1 projection convolution (the "convolutional block" of the
/// ResNet paper); otherwise the shortcut is the identity.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    relu: Relu,
    downsample: Option<Downsample<B>>,
}

/// Projection shortcut: 1x1 convolution + batch norm matching the main path's
/// output channels and stride.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

/// Configuration to create a [bottleneck block](Bottleneck).
#[derive(Config, Debug)]
pub struct BottleneckConfig {
    /// Channels of the incoming feature map.
    pub in_channels: usize,
    /// Filter counts of the three convolutions, e.g. `[64, 64, 256]`.
    pub filters: [usize; 3],
    /// Stride applied by the first convolution (and the projection shortcut).
    #[config(default = 1)]
    pub stride: usize,
}

impl BottleneckConfig {
    /// Initializes a new [bottleneck block](Bottleneck).
    pub fn init<B: Backend>(&self, device: &B::Device) -> Bottleneck<B> {
        let [f1, f2, f3] = self.filters;

        let conv1 = Conv2dConfig::new([self.in_channels, f1], [1, 1])
            .with_stride([self.stride, self.stride])
            .with_bias(false)
            .init(device);
        let conv2 = Conv2dConfig::new([f1, f2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let conv3 = Conv2dConfig::new([f2, f3], [1, 1])
            .with_bias(false)
            .init(device);

        // The shortcut needs a projection whenever it cannot carry the input
        // through unchanged.
        let downsample = (self.stride != 1 || self.in_channels != f3).then(|| Downsample {
            conv: Conv2dConfig::new([self.in_channels, f3], [1, 1])
                .with_stride([self.stride, self.stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(f3).init(device),
        });

        Bottleneck {
            conv1,
            bn1: BatchNormConfig::new(f1).init(device),
            conv2,
            bn2: BatchNormConfig::new(f2).init(device),
            conv3,
            bn3: BatchNormConfig::new(f3).init(device),
            relu: Relu::new(),
            downsample,
        }
    }
}

impl<B: Backend> Bottleneck<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, filters[2], height / stride, width / stride]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.bn1.forward(x);
        let x = self.relu.forward(x);

        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);
        let x = self.relu.forward(x);

        let x = self.conv3.forward(x);
        let x = self.bn3.forward(x);

        self.relu.forward(x + shortcut)
    }

    /// Whether the shortcut is a projection rather than the identity.
    pub fn is_projection(&self) -> bool {
        self.downsample.is_some()
    }
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

/// A stage of the network: one projection block followed by identity blocks,
/// all sharing the same filter triple.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

/// Configuration to create a [stage](Stage).
#[derive(Config, Debug)]
pub struct StageConfig {
    /// Number of bottleneck blocks.
    pub num_blocks: usize,
    /// Channels of the incoming feature map.
    pub in_channels: usize,
    /// Filter counts shared by every block of the stage.
    pub filters: [usize; 3],
    /// Stride of the first (projection) block.
    #[config(default = 1)]
    pub stride: usize,
}

impl StageConfig {
    /// Initializes a new [stage](Stage).
    pub fn init<B: Backend>(&self, device: &B::Device) -> Stage<B> {
        let mut blocks = Vec::with_capacity(self.num_blocks);

        blocks.push(
            BottleneckConfig::new(self.in_channels, self.filters)
                .with_stride(self.stride)
                .init(device),
        );
        for _ in 1..self.num_blocks {
            blocks.push(BottleneckConfig::new(self.filters[2], self.filters).init(device));
        }

        Stage { blocks }
    }
}

impl<B: Backend> Stage<B> {
    /// Applies every block of the stage in sequence.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(input, |x, block| block.forward(x))
    }

    /// Number of blocks in the stage.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks of the stage, first the projection block then the identity ones.
    pub fn blocks(&self) -> &[Bottleneck<B>] {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn identity_block_preserves_shape() {
        let device = Default::default();
        let block: Bottleneck<TestBackend> =
            BottleneckConfig::new(256, [64, 64, 256]).init(&device);

        assert!(!block.is_projection());

        let input = Tensor::zeros([2, 256, 7, 7], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 256, 7, 7]);
    }

    #[test]
    fn projection_block_changes_channels_and_spatial_size() {
        let device = Default::default();
        let block: Bottleneck<TestBackend> = BottleneckConfig::new(256, [128, 128, 512])
            .with_stride(2)
            .init(&device);

        assert!(block.is_projection());

        let input = Tensor::zeros([2, 256, 8, 8], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 512, 4, 4]);
    }

    #[test]
    fn channel_change_alone_requires_projection() {
        let device = Default::default();
        let block: Bottleneck<TestBackend> = BottleneckConfig::new(64, [64, 64, 256]).init(&device);

        assert!(block.is_projection());
    }

    #[test]
    fn stage_starts_with_projection_then_identity() {
        let device = Default::default();
        let stage: Stage<TestBackend> = StageConfig::new(4, 256, [128, 128, 512])
            .with_stride(2)
            .init(&device);

        assert_eq!(stage.num_blocks(), 4);
        assert!(stage.blocks()[0].is_projection());
        for block in &stage.blocks()[1..] {
            assert!(!block.is_projection());
        }
    }
}
