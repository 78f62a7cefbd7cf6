use std::fmt;

use ndarray::{Array3, Axis};

use crate::cores::rnn_core::{RnnCore, State, StateSize};
use crate::cores::unroll::{StateSeq, dynamic_unroll_with_states};
use crate::error::{ModuleError, Result};
use crate::params::variable::Variable;

/// 前向 / 后向成对出现的值。
#[derive(Debug, Clone, PartialEq)]
pub struct Directional<T> {
    pub forward: T,
    pub backward: T,
}

/// 双向展开的初始状态, 两个方向各一份。
pub type BidirectionalState = Directional<State>;

/// 双向展开的结果。
///
/// 所有序列都对齐到输入的时间顺序, 后向分支已经翻转回来。
#[derive(Debug, Clone, PartialEq)]
pub struct BidirectionalOutput {
    /// 每一步的输出, 叶子形状 [time, batch, hidden]。
    pub outputs: Directional<Array3<f64>>,
    /// 每一步的状态序列, 结构与各核心的状态一致。
    pub state: Directional<StateSeq>,
}

/// 用两个递归核心分别沿正序和逆序处理整条序列。
///
/// 与单个核心不同, 它以整条 [time, batch, features] 序列为输入,
/// 一次产出两个方向的逐步输出和逐步状态。
pub struct BidirectionalRnn {
    name: String,
    forward_core: Box<dyn RnnCore>,
    backward_core: Box<dyn RnnCore>,
}

impl BidirectionalRnn {
    /// 两个核心都必须是递归核心。
    pub fn new(
        name: impl Into<String>,
        forward_core: Box<dyn RnnCore>,
        backward_core: Box<dyn RnnCore>,
    ) -> Result<Self> {
        for core in [&forward_core, &backward_core] {
            if !core.is_recurrent() {
                return Err(ModuleError::InvalidParameter {
                    what: format!(
                        "bidirectional core '{}' must carry recurrent state",
                        core.name()
                    ),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            forward_core,
            backward_core,
        })
    }

    /// 两个方向的全零初始状态。
    pub fn initial_state(&self, batch_size: usize) -> BidirectionalState {
        Directional {
            forward: self.forward_core.initial_state(batch_size),
            backward: self.backward_core.initial_state(batch_size),
        }
    }

    /// 沿两个方向展开整条序列。
    pub fn unroll(
        &mut self,
        inputs: &Array3<f64>,
        state: &BidirectionalState,
    ) -> Result<BidirectionalOutput> {
        let (forward_outputs, _, forward_seq) =
            dynamic_unroll_with_states(self.forward_core.as_mut(), inputs, &state.forward)?;

        let mut reversed_inputs = inputs.clone();
        reversed_inputs.invert_axis(Axis(0));
        let (mut backward_outputs, _, mut backward_seq) = dynamic_unroll_with_states(
            self.backward_core.as_mut(),
            &reversed_inputs,
            &state.backward,
        )?;
        // 翻转回输入的时间顺序
        backward_outputs.invert_axis(Axis(0));
        backward_seq.reverse_time();

        Ok(BidirectionalOutput {
            outputs: Directional {
                forward: forward_outputs,
                backward: backward_outputs,
            },
            state: Directional {
                forward: forward_seq,
                backward: backward_seq,
            },
        })
    }

    /// 两个方向输出维度之和。
    pub fn output_size(&self) -> Option<usize> {
        Some(self.forward_core.output_size()? + self.backward_core.output_size()?)
    }

    /// 两个方向状态结构组成的元组。
    pub fn state_size(&self) -> StateSize {
        StateSize::Tuple(vec![
            self.forward_core.state_size(),
            self.backward_core.state_size(),
        ])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 两个核心的变量, 前向在先。
    pub fn variables(&self) -> Result<Vec<Variable>> {
        let mut vars = self.forward_core.variables()?;
        vars.extend(self.backward_core.variables()?);
        Ok(vars)
    }

    pub fn forward_core(&self) -> &dyn RnnCore {
        self.forward_core.as_ref()
    }

    pub fn backward_core(&self) -> &dyn RnnCore {
        self.backward_core.as_ref()
    }

    pub fn backward_core_mut(&mut self) -> &mut dyn RnnCore {
        self.backward_core.as_mut()
    }
}

// Box<dyn RnnCore> 没有 Debug, 只打印核心名
impl fmt::Debug for BidirectionalRnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidirectionalRnn")
            .field("name", &self.name)
            .field("forward_core", &self.forward_core.name())
            .field("backward_core", &self.backward_core.name())
            .finish()
    }
}
