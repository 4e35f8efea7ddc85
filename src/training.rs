use crate::{
    data::{MnistBatch, MnistBatcher},
    model::{ResNet, ResNetConfig},
};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::vision::MnistDataset},
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        logger::{FileMetricLogger, MetricLogger},
        metric::{AccuracyMetric, LossMetric, NumericEntry},
        ClassificationOutput, LearnerBuilder, TrainOutput, TrainStep, ValidStep,
    },
};

impl<B: Backend> ResNet<B> {
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<MnistBatch<B>, ClassificationOutput<B>> for ResNet<B> {
    fn step(&self, batch: MnistBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<MnistBatch<B>, ClassificationOutput<B>> for ResNet<B> {
    fn step(&self, batch: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ResNetConfig,
    pub optimizer: AdamConfig,
    #[config(default = 2)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

fn create_artifact_dir(artifact_dir: &str) {
    // Remove existing artifacts before each training run
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir).ok();
}

pub fn train<B: AutodiffBackend>(artifact_dir: &str, config: TrainingConfig, device: B::Device) {
    create_artifact_dir(artifact_dir);
    config
        .save(format!("{artifact_dir}/config.json"))
        .expect("Config should be saved successfully");

    B::seed(config.seed);

    let batcher_train = MnistBatcher::default();
    let batcher_valid = MnistBatcher::default();

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(MnistDataset::train());

    // NOTE: the MNIST test split doubles as validation, as in the source
    // training run.
    let dataloader_test = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(MnistDataset::test());

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    let model_trained = learner.fit(dataloader_train, dataloader_test);

    model_trained
        .save_file(format!("{artifact_dir}/model"), &CompactRecorder::new())
        .expect("Trained model should be saved successfully");
    log::info!("Trained model saved to {artifact_dir}/model");

    print_history(artifact_dir, config.num_epochs);
}

/// Prints the per-epoch accuracy/loss curves recorded during training, read
/// back from the learner's metric logs.
pub fn print_history(artifact_dir: &str, num_epochs: usize) {
    let mut train_logger = FileMetricLogger::new(&format!("{artifact_dir}/train"));
    let mut valid_logger = FileMetricLogger::new(&format!("{artifact_dir}/valid"));

    println!("Epoch | Train loss | Train acc | Valid loss | Valid acc");
    for epoch in 1..=num_epochs {
        let train_loss = epoch_average(&mut train_logger, "Loss", epoch);
        let train_acc = epoch_average(&mut train_logger, "Accuracy", epoch);
        let valid_loss = epoch_average(&mut valid_logger, "Loss", epoch);
        let valid_acc = epoch_average(&mut valid_logger, "Accuracy", epoch);

        println!(
            "{epoch:5} | {train_loss:10.4} | {train_acc:8.2}% | {valid_loss:10.4} | {valid_acc:8.2}%"
        );
    }
}

/// Average of a numeric metric over one epoch.
fn epoch_average(logger: &mut FileMetricLogger, name: &str, epoch: usize) -> f64 {
    let entries = match logger.read_numeric(name, epoch) {
        Ok(entries) => entries,
        Err(_) => return f64::NAN,
    };

    let (sum, count) = entries
        .iter()
        .fold((0.0, 0usize), |(sum, count), entry| match entry {
            NumericEntry::Value(value) => (sum + value, count + 1),
            NumericEntry::Aggregated(value, num) => (sum + value * *num as f64, count + num),
        });

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn classification_output_has_expected_shapes() {
        let device = Default::default();
        let model: ResNet<TestBackend> = ResNetConfig::new(10).init(&device);

        let images = Tensor::zeros([4, 1, 28, 28], &device);
        let targets = Tensor::from_ints([0, 1, 2, 3], &device);

        let output = model.forward_classification(images, targets);

        assert_eq!(output.output.dims(), [4, 10]);
        assert_eq!(output.targets.dims(), [4]);
        assert_eq!(output.loss.dims(), [1]);
    }

    #[test]
    fn default_config_trains_for_two_epochs() {
        let config = TrainingConfig::new(ResNetConfig::new(10), AdamConfig::new());

        assert_eq!(config.num_epochs, 2);
    }
}
