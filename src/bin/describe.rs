//! Assembles the ResNet-50 graph without training it and prints the module
//! tree with its parameter count, stage by stage.

#![recursion_limit = "256"]

use burn::{module::Module, tensor::backend::Backend};

use resnet_mnist::model::{ResNet, ResNetConfig};

pub fn describe<B: Backend>(device: B::Device) {
    let model: ResNet<B> = ResNetConfig::new(10).init(&device);

    println!("{model}");
    println!("Total parameters: {}", model.num_params());

    for (index, stage) in model.stages().into_iter().enumerate() {
        println!("Stage {}: {} bottleneck blocks", index + 2, stage.num_blocks());
    }
}

#[cfg(any(
    feature = "ndarray",
    feature = "ndarray-blas-netlib",
    feature = "ndarray-blas-openblas",
    feature = "ndarray-blas-accelerate",
))]
mod ndarray {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    use crate::describe;

    pub fn run() {
        describe::<NdArray>(NdArrayDevice::Cpu);
    }
}

#[cfg(feature = "tch-cpu")]
mod tch_cpu {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    use crate::describe;

    pub fn run() {
        describe::<LibTorch>(LibTorchDevice::Cpu);
    }
}

#[cfg(feature = "tch-gpu")]
mod tch_gpu {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    use crate::describe;

    pub fn run() {
        #[cfg(not(target_os = "macos"))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(target_os = "macos")]
        let device = LibTorchDevice::Mps;

        describe::<LibTorch>(device);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    use crate::describe;

    pub fn run() {
        describe::<Wgpu>(WgpuDevice::default());
    }
}

#[cfg(feature = "cuda")]
mod cuda {
    use burn::backend::{cuda::CudaDevice, Cuda};

    use crate::describe;

    pub fn run() {
        describe::<Cuda>(CudaDevice::default());
    }
}

fn main() {
    #[cfg(any(
        feature = "ndarray",
        feature = "ndarray-blas-netlib",
        feature = "ndarray-blas-openblas",
        feature = "ndarray-blas-accelerate",
    ))]
    ndarray::run();
    #[cfg(feature = "tch-cpu")]
    tch_cpu::run();
    #[cfg(feature = "tch-gpu")]
    tch_gpu::run();
    #[cfg(feature = "wgpu")]
    wgpu::run();
    #[cfg(feature = "cuda")]
    cuda::run();
}
