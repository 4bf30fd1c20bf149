//! CNN Model Architecture for Bean-Plant Part Classification
//!
//! Three unpadded 3x3 convolution stages (32, 64, 128 filters), each
//! followed by ReLU and 2x2 max pooling, then a 128-unit dense layer and the
//! class layer. Padding is "valid", so the spatial size shrinks by 2 before
//! every pooling step:
//!
//! ```text
//! 256 -> 254 -> 127 -> 125 -> 62 -> 60 -> 30    (flatten: 128 * 30 * 30)
//! ```

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::utils::error::{self, BeanDoctorError};

/// Filters of the three convolution stages
pub const CONV_FILTERS: [usize; 3] = [32, 64, 128];

/// Units of the hidden dense layer
pub const HIDDEN_UNITS: usize = 128;

/// Smallest square input that leaves a non-empty feature map after stage 3
pub const MIN_IMAGE_SIZE: usize = 22;

/// Configuration for the BeanPartsClassifier
#[derive(Config, Debug)]
pub struct BeanPartsClassifierConfig {
    /// Number of output classes (one per class subdirectory)
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "256")]
    pub image_size: usize,
}

impl BeanPartsClassifierConfig {
    /// Spatial size of the feature map after the last pooling stage
    pub fn feature_map_size(&self) -> usize {
        CONV_FILTERS
            .iter()
            .fold(self.image_size, |size, _| size.saturating_sub(2) / 2)
    }

    /// Number of inputs of the hidden dense layer
    pub fn flatten_size(&self) -> usize {
        let side = self.feature_map_size();
        CONV_FILTERS[CONV_FILTERS.len() - 1] * side * side
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.num_classes == 0 {
            return Err(BeanDoctorError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.feature_map_size() == 0 {
            return Err(BeanDoctorError::Config(format!(
                "image_size must be at least {}, got {}",
                MIN_IMAGE_SIZE, self.image_size
            )));
        }

        Ok(())
    }

    /// Initialize a model with fresh weights
    ///
    /// Kernels are Glorot-uniform and biases start at zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BeanPartsClassifier<B> {
        let [f1, f2, f3] = CONV_FILTERS;

        BeanPartsClassifier {
            conv1: conv3x3(3, f1, device),
            conv2: conv3x3(f1, f2, device),
            conv3: conv3x3(f2, f3, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: dense(self.flatten_size(), HIDDEN_UNITS, device),
            fc2: dense(HIDDEN_UNITS, self.num_classes, device),
            activation: Relu::new(),
        }
    }
}

fn glorot_uniform() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

fn zero_bias<B: Backend>(size: usize, device: &B::Device) -> Option<Param<Tensor<B, 1>>> {
    Some(Param::from_tensor(Tensor::zeros([size], device)))
}

fn conv3x3<B: Backend>(channels_in: usize, channels_out: usize, device: &B::Device) -> Conv2d<B> {
    let mut conv = Conv2dConfig::new([channels_in, channels_out], [3, 3])
        .with_initializer(glorot_uniform())
        .init(device);
    conv.bias = zero_bias(channels_out, device);
    conv
}

fn dense<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_initializer(glorot_uniform())
        .init(device);
    linear.bias = zero_bias(d_output, device);
    linear
}

/// Bean-plant part classifier
#[derive(Module, Debug)]
pub struct BeanPartsClassifier<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub pool: MaxPool2d,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub activation: Relu,
}

impl<B: Backend> BeanPartsClassifier<B> {
    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.activation.forward(self.conv1.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));

        // [B, C, H, W] -> [B, C * H * W]
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Number of output classes, read from the class layer's weights
    pub fn num_classes(&self) -> usize {
        self.fc2.weight.val().dims()[1]
    }

    /// Number of inputs the hidden dense layer expects
    pub fn flatten_size(&self) -> usize {
        self.fc1.weight.val().dims()[0]
    }
}
