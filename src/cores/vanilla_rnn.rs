use ndarray::Array2;

use crate::activations::functions::tanh;
use crate::cores::rnn_core::{RnnCore, State, StateSize, check_state};
use crate::error::Result;
use crate::layers::linear::Linear;
use crate::layers::module::FeedForward;
use crate::params::initializers::{NestedInitializerMap, check_initializer_keys};
use crate::params::regularizers::{NestedRegularizerMap, check_regularizer_keys};
use crate::params::variable::Variable;

/// VanillaRnn 配置表接受的子模块键。
pub const VANILLA_RNN_CONFIG_KEYS: [&str; 2] = ["in_to_hidden", "hidden_to_hidden"];

/// 最朴素的循环核心。
///
/// 单步计算:
/// output = next_state = tanh(in_to_hidden(x_t) + hidden_to_hidden(h_{t-1}))
///
/// 两个子 [`Linear`] 的参数在第一次 [`step`](RnnCore::step) 时按输入宽度
/// 构建, 变量名为 `<name>/in_to_hidden/{w,b}` 和 `<name>/hidden_to_hidden/{w,b}`。
#[derive(Debug)]
pub struct VanillaRnn {
    name: String,
    hidden_size: usize,
    in_to_hidden: Linear,
    hidden_to_hidden: Linear,
}

impl VanillaRnn {
    /// 创建隐藏维度为 `hidden_size` 的核心。
    pub fn new(name: impl Into<String>, hidden_size: usize) -> Self {
        let name = name.into();
        let in_to_hidden = Linear::new(format!("{name}/in_to_hidden"), hidden_size);
        let hidden_to_hidden = Linear::new(format!("{name}/hidden_to_hidden"), hidden_size);
        Self {
            name,
            hidden_size,
            in_to_hidden,
            hidden_to_hidden,
        }
    }

    /// 配置初始化器。外层键为子模块名, 内层键为 "w" 和 "b"。
    pub fn with_initializers(mut self, mut initializers: NestedInitializerMap) -> Result<Self> {
        check_initializer_keys(&initializers, &VANILLA_RNN_CONFIG_KEYS)?;
        if let Some(map) = initializers.remove("in_to_hidden") {
            self.in_to_hidden = self.in_to_hidden.with_initializers(map)?;
        }
        if let Some(map) = initializers.remove("hidden_to_hidden") {
            self.hidden_to_hidden = self.hidden_to_hidden.with_initializers(map)?;
        }
        Ok(self)
    }

    /// 配置正则化器。外层键为子模块名, 内层键为 "w" 和 "b"。
    pub fn with_regularizers(mut self, mut regularizers: NestedRegularizerMap) -> Result<Self> {
        check_regularizer_keys(&regularizers, &VANILLA_RNN_CONFIG_KEYS)?;
        if let Some(map) = regularizers.remove("in_to_hidden") {
            self.in_to_hidden = self.in_to_hidden.with_regularizers(map)?;
        }
        if let Some(map) = regularizers.remove("hidden_to_hidden") {
            self.hidden_to_hidden = self.hidden_to_hidden.with_regularizers(map)?;
        }
        Ok(self)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// 输入到隐藏层的子模块。
    pub fn in_to_hidden(&self) -> &Linear {
        &self.in_to_hidden
    }

    /// 隐藏层到隐藏层的子模块。
    pub fn hidden_to_hidden(&self) -> &Linear {
        &self.hidden_to_hidden
    }
}

impl RnnCore for VanillaRnn {
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        check_state(&self.name, &self.state_size(), prev_state, input.nrows())?;
        let prev_hidden = prev_state.as_tensor().unwrap();

        let in_to_hidden = self.in_to_hidden.forward(input)?;
        let hidden_to_hidden = self.hidden_to_hidden.forward(prev_hidden)?;
        let output = tanh(&(in_to_hidden + hidden_to_hidden));
        Ok((output.clone(), State::Tensor(output)))
    }

    fn state_size(&self) -> StateSize {
        StateSize::Vector(self.hidden_size)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.hidden_size)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        let mut vars = self.in_to_hidden.variables()?;
        vars.extend(self.hidden_to_hidden.variables()?);
        Ok(vars)
    }

    fn regularization_losses(&self) -> Vec<f64> {
        let mut losses = self.in_to_hidden.regularization_losses();
        losses.extend(self.hidden_to_hidden.regularization_losses());
        losses
    }
}
