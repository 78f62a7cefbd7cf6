use super::traits::Activation;
use ndarray::Array2;

/// 对数组中的每个元素应用 sigmoid 函数。
///
/// Sigmoid 定义为 `1 / (1 + exp(-x))`。
pub fn sigmoid(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// 对数组中的每个元素应用双曲正切 (tanh) 函数。
pub fn tanh(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.tanh())
}

/// 对数组中的每个元素应用 ReLU 函数，即 `max(0, x)`。
pub fn relu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.max(0.0))
}

/// Tanh 激活函数的结构体实现。
#[derive(Clone, Copy, Debug)]
pub struct Tanh;

impl Activation for Tanh {
    fn apply_scalar(&self, x: f64) -> f64 {
        x.tanh()
    }

    fn name(&self) -> &'static str {
        "tanh"
    }
}

/// Sigmoid 激活函数的结构体实现。
#[derive(Clone, Copy, Debug)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply_scalar(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn name(&self) -> &'static str {
        "sigmoid"
    }
}

/// ReLU 激活函数的结构体实现。
#[derive(Clone, Copy, Debug)]
pub struct Relu;

impl Activation for Relu {
    fn apply_scalar(&self, x: f64) -> f64 {
        x.max(0.0)
    }

    fn name(&self) -> &'static str {
        "relu"
    }
}
