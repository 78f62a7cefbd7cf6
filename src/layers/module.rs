use ndarray::Array2;

use crate::activations::functions::{Relu, Sigmoid, Tanh};
use crate::activations::traits::Activation;
use crate::error::Result;
use crate::params::variable::Variable;

/// 前馈模块的通用接口。
///
/// 模块可以持有懒构建的参数（如 [`Linear`](crate::layers::linear::Linear)），
/// 也可以完全无参数（如激活函数）。输入输出约定为 `[batch_size, dim]`。
pub trait FeedForward {
    /// 前向传播。第一次调用时懒构建参数。
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>>;

    /// 每个样本的输出维度；尚不可知时返回 `None`。
    fn output_size(&self) -> Option<usize>;

    /// 模块名。
    fn name(&self) -> &str;

    /// 模块的全部变量。懒构建的模块在连接前返回
    /// [`ModuleError::NotInstantiated`](crate::error::ModuleError::NotInstantiated)。
    fn variables(&self) -> Result<Vec<Variable>>;

    /// 附着了正则化器的参数的正则化损失，每个参数一项。
    fn regularization_losses(&self) -> Vec<f64> {
        Vec::new()
    }
}

/// 把任意前馈计算包装成模块。
///
/// 输出维度默认未知，可用 [`with_output_size`](FnModule::with_output_size)
/// 显式声明，声明后才能被 [`ModelRnn`](crate::cores::model_rnn::ModelRnn) 包装。
pub struct FnModule<F> {
    name: String,
    f: F,
    output_size: Option<usize>,
}

impl<F> FnModule<F>
where
    F: FnMut(&Array2<f64>) -> Array2<f64>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            output_size: None,
        }
    }

    /// 声明该计算的输出维度。
    pub fn with_output_size(mut self, output_size: usize) -> Self {
        self.output_size = Some(output_size);
        self
    }
}

impl<F> FeedForward for FnModule<F>
where
    F: FnMut(&Array2<f64>) -> Array2<f64>,
{
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        Ok((self.f)(input))
    }

    fn output_size(&self) -> Option<usize> {
        self.output_size
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        Ok(Vec::new())
    }
}

// 激活函数本身也是合法的无参数前馈模块，可以直接放进 DeepRnn 堆叠。
macro_rules! impl_feed_forward_for_activation {
    ($($ty:ty),*) => {
        $(
            impl FeedForward for $ty {
                fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
                    Ok(self.apply(input))
                }

                fn output_size(&self) -> Option<usize> {
                    None
                }

                fn name(&self) -> &str {
                    Activation::name(self)
                }

                fn variables(&self) -> Result<Vec<Variable>> {
                    Ok(Vec::new())
                }
            }
        )*
    };
}

impl_feed_forward_for_activation!(Tanh, Sigmoid, Relu);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_fn_module_identity() {
        let mut identity = FnModule::new("identity", |x: &Array2<f64>| x.clone());
        assert_eq!(identity.output_size(), None);

        let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let y = identity.forward(&x).unwrap();
        assert_eq!(y, x);

        let identity = identity.with_output_size(2);
        assert_eq!(identity.output_size(), Some(2));
        assert!(identity.variables().unwrap().is_empty());
    }

    #[test]
    fn test_activation_as_module() {
        let mut tanh = Tanh;
        let x = arr2(&[[0.0, 100.0]]);
        let y = tanh.forward(&x).unwrap();
        assert!((y[[0, 0]] - 0.0).abs() < 1e-12);
        assert!((y[[0, 1]] - 1.0).abs() < 1e-6);
        assert_eq!(FeedForward::name(&tanh), "tanh");
        assert_eq!(tanh.output_size(), None);
    }
}
