use std::fmt;

use ndarray::Array2;

use crate::cores::rnn_core::{RnnCore, State, StateSize};
use crate::error::{ModuleError, Result};
use crate::layers::module::FeedForward;
use crate::params::variable::Variable;

/// 忽略输入、只用一个前馈模型演化状态的核心。
///
///   output = next_state = model(prev_state)
///
/// 模型必须声明输出维度, 它同时充当状态维度。
pub struct ModelRnn<M: FeedForward> {
    name: String,
    output_size: usize,
    model: M,
}

impl<M: FeedForward> ModelRnn<M> {
    pub fn new(name: impl Into<String>, model: M) -> Result<Self> {
        let output_size = model.output_size().ok_or_else(|| ModuleError::UnknownOutputSize {
            module: model.name().to_string(),
        })?;
        Ok(Self {
            name: name.into(),
            output_size,
            model,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

// M 不要求 Debug, 只打印模型名
impl<M: FeedForward> fmt::Debug for ModelRnn<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRnn")
            .field("name", &self.name)
            .field("output_size", &self.output_size)
            .field("model", &self.model.name())
            .finish()
    }
}

impl<M: FeedForward> RnnCore for ModelRnn<M> {
    fn step(&mut self, _input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        let prev = match prev_state {
            State::Tensor(t) if t.ncols() == self.output_size => t,
            _ => {
                return Err(ModuleError::StateMismatch {
                    module: self.name.clone(),
                    expected: format!("[batch x {}]", self.output_size),
                    got: prev_state.describe(),
                });
            }
        };
        let output = self.model.forward(prev)?;
        if output.ncols() != self.output_size {
            return Err(ModuleError::ShapeMismatch {
                module: self.name.clone(),
                expected: format!("[batch, {}]", self.output_size),
                got: format!("[{}, {}]", output.nrows(), output.ncols()),
            });
        }
        Ok((output.clone(), State::Tensor(output)))
    }

    fn state_size(&self) -> StateSize {
        StateSize::Vector(self.output_size)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        self.model.variables()
    }

    fn regularization_losses(&self) -> Vec<f64> {
        self.model.regularization_losses()
    }
}
