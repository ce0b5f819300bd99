use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tch::Tensor;

pub fn _gelu(x: &Tensor) -> Tensor {
    x * 0.5 * (1.0 + (x / ((2.0_f64).sqrt())).erf())
}

pub fn _relu(x: &Tensor) -> Tensor {
    x.relu()
}

pub fn _swish(x: &Tensor) -> Tensor {
    x * x.sigmoid()
}

pub fn _mish(x: &Tensor) -> Tensor {
    x * (x.softplus().tanh())
}

pub fn _gelu_new(x: &Tensor) -> Tensor {
    x * 0.5 * (((x.pow_tensor_scalar(3.0f64) * 0.044715 + x) * ((2f64 / PI).sqrt())).tanh() + 1)
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// # Activation function used in the feed-forward and prediction head layers
pub enum Activation {
    /// Gaussian Error Linear Unit ([Hendrycks et al., 2016,](https://arxiv.org/abs/1606.08415))
    gelu,
    /// Rectified Linear Unit
    relu,
    /// Swish ([Ramachandran, 2017](https://arxiv.org/abs/1710.05941))
    swish,
    /// Mish ([Misra, 2019](https://arxiv.org/abs/1908.08681))
    mish,
    /// Gaussian Error Linear Unit (tanh approximation, used by GPT-2 style checkpoints)
    gelu_new,
}

impl Activation {
    pub fn get_function(&self) -> fn(&Tensor) -> Tensor {
        match self {
            Activation::gelu => _gelu,
            Activation::relu => _relu,
            Activation::swish => _swish,
            Activation::mish => _mish,
            Activation::gelu_new => _gelu_new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn activation_names_follow_transformers_configs() {
        let activation: Activation = serde_json::from_str("\"gelu\"").unwrap();
        assert_eq!(activation, Activation::gelu);
        let activation: Activation = serde_json::from_str("\"gelu_new\"").unwrap();
        assert_eq!(activation, Activation::gelu_new);
        assert!(serde_json::from_str::<Activation>("\"softmax\"").is_err());
    }

    #[test]
    fn relu_clamps_negative_values() {
        let input = Tensor::from_slice(&[-1.0f32, 0.0, 2.0]);
        let output = Activation::relu.get_function()(&input);
        assert_eq!(Vec::<f32>::try_from(&output).unwrap(), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn gelu_is_close_to_identity_for_large_inputs() {
        let input = Tensor::full([4], 10.0, (Kind::Float, Device::Cpu));
        let output = Activation::gelu.get_function()(&input);
        let difference = (output - &input).abs().max().double_value(&[]);
        assert!(difference < 1e-4);
    }
}
