use ndarray::Array2;

use crate::activations::functions::relu;
use crate::error::{ModuleError, Result};
use crate::layers::linear::Linear;
use crate::layers::module::FeedForward;
use crate::params::initializers::InitializerMap;
use crate::params::variable::Variable;

/// 多层感知机。
///
/// 由若干 [`Linear`] 串联而成，隐藏层之间用 ReLU，最后一层不加激活。
/// 第 i 层命名为 `<name>/layer_<i>`，输入维度与 [`Linear`] 一样懒推断。
#[derive(Debug)]
pub struct Mlp {
    name: String,
    output_sizes: Vec<usize>,
    layers: Vec<Linear>,
}

impl Mlp {
    /// 创建各层输出维度为 `output_sizes` 的 MLP。列表不能为空。
    pub fn new(name: impl Into<String>, output_sizes: &[usize]) -> Result<Self> {
        if output_sizes.is_empty() {
            return Err(ModuleError::InvalidParameter {
                what: "MLP requires at least one output size".to_string(),
            });
        }
        let name = name.into();
        let layers = output_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Linear::new(format!("{name}/layer_{i}"), size))
            .collect();
        Ok(Self {
            name,
            output_sizes: output_sizes.to_vec(),
            layers,
        })
    }

    /// 给每一层配置同一份初始化器。合法键为 "w" 和 "b"。
    pub fn with_initializers(mut self, initializers: InitializerMap) -> Result<Self> {
        self.layers = self
            .layers
            .into_iter()
            .map(|layer| layer.with_initializers(initializers.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// 每层的输出维度。
    pub fn output_sizes(&self) -> &[usize] {
        &self.output_sizes
    }
}

impl FeedForward for Mlp {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        let last = self.layers.len() - 1;
        let mut hidden = input.clone();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            hidden = layer.forward(&hidden)?;
            if i < last {
                hidden = relu(&hidden);
            }
        }
        Ok(hidden)
    }

    fn output_size(&self) -> Option<usize> {
        self.output_sizes.last().copied()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        let mut vars = Vec::new();
        for layer in &self.layers {
            vars.extend(layer.variables()?);
        }
        Ok(vars)
    }

    fn regularization_losses(&self) -> Vec<f64> {
        self.layers
            .iter()
            .flat_map(|layer| layer.regularization_losses())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::initializers::Initializer;

    #[test]
    fn test_shapes_and_variable_names() {
        let mut mlp = Mlp::new("mlp", &[7, 5, 3]).unwrap();
        assert_eq!(mlp.output_size(), Some(3));

        let x = Array2::zeros((2, 4));
        let y = mlp.forward(&x).unwrap();
        assert_eq!(y.dim(), (2, 3));

        let vars = mlp.variables().unwrap();
        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mlp/layer_0/w",
                "mlp/layer_0/b",
                "mlp/layer_1/w",
                "mlp/layer_1/b",
                "mlp/layer_2/w",
                "mlp/layer_2/b",
            ]
        );
        assert_eq!(vars[0].shape(), &[4, 7]);
        assert_eq!(vars[2].shape(), &[7, 5]);
        assert_eq!(vars[4].shape(), &[5, 3]);
    }

    #[test]
    fn test_empty_output_sizes() {
        let err = Mlp::new("mlp", &[]).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter { .. }));
    }

    #[test]
    fn test_relu_between_layers() {
        // 两层, w 全 1, b 全 0: 第一层输出 = sum(x), 经 ReLU 截断后进第二层
        let mut initializers = InitializerMap::new();
        initializers.insert("w".to_string(), Initializer::Ones);
        let mut mlp = Mlp::new("mlp", &[1, 1])
            .unwrap()
            .with_initializers(initializers)
            .unwrap();

        let x = ndarray::arr2(&[[-3.0, 1.0]]);
        let y = mlp.forward(&x).unwrap();
        // 第一层: -3 + 1 = -2, ReLU 后 0, 第二层: 0
        assert!((y[[0, 0]] - 0.0).abs() < 1e-6);

        let x = ndarray::arr2(&[[3.0, 1.0]]);
        let y = mlp.forward(&x).unwrap();
        // 第一层: 4, ReLU 后 4, 第二层: 4
        assert!((y[[0, 0]] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_variables_before_connection() {
        let mlp = Mlp::new("mlp", &[3]).unwrap();
        assert!(mlp.variables().is_err());
    }
}
