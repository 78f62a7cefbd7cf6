use ndarray::{Array2, Array3, Axis};

use crate::cores::rnn_core::{RnnCore, State};
use crate::error::{ModuleError, Result};

/// 与 [`State`] 同构的逐步状态序列, 每个叶子是 [time, batch, dim]。
#[derive(Debug, Clone, PartialEq)]
pub enum StateSeq {
    Empty,
    Tensor(Array3<f64>),
    Tuple(Vec<StateSeq>),
}

impl StateSeq {
    /// 按深度优先顺序展平的全部叶子张量。
    pub fn leaves(&self) -> Vec<&Array3<f64>> {
        match self {
            StateSeq::Empty => Vec::new(),
            StateSeq::Tensor(t) => vec![t],
            StateSeq::Tuple(parts) => parts.iter().flat_map(|p| p.leaves()).collect(),
        }
    }

    /// 就地翻转所有叶子的时间轴。
    pub fn reverse_time(&mut self) {
        match self {
            StateSeq::Empty => {}
            StateSeq::Tensor(t) => t.invert_axis(Axis(0)),
            StateSeq::Tuple(parts) => {
                for part in parts {
                    part.reverse_time();
                }
            }
        }
    }
}

/// 把同构的逐步状态堆叠成状态序列。
fn stack_states(states: &[&State]) -> StateSeq {
    match states[0] {
        State::Empty => StateSeq::Empty,
        State::Tensor(_) => {
            let views: Vec<_> = states
                .iter()
                .map(|s| s.as_tensor().unwrap().view())
                .collect();
            StateSeq::Tensor(ndarray::stack(Axis(0), &views).unwrap())
        }
        State::Tuple(parts) => StateSeq::Tuple(
            (0..parts.len())
                .map(|i| {
                    let children: Vec<&State> = states
                        .iter()
                        .map(|s| match s {
                            State::Tuple(p) => &p[i],
                            _ => unreachable!(),
                        })
                        .collect();
                    stack_states(&children)
                })
                .collect(),
        ),
    }
}

fn check_nonempty(inputs: &Array3<f64>) -> Result<()> {
    if inputs.dim().0 == 0 {
        return Err(ModuleError::InvalidParameter {
            what: "cannot unroll over an empty sequence".to_string(),
        });
    }
    Ok(())
}

/// 沿时间主序的输入 [time, batch, features] 逐步展开核心。
///
/// 返回每一步的输出 [time, batch, output] 和最后一步的状态。
pub fn dynamic_unroll(
    core: &mut dyn RnnCore,
    inputs: &Array3<f64>,
    initial_state: &State,
) -> Result<(Array3<f64>, State)> {
    check_nonempty(inputs)?;
    let seq_len = inputs.dim().0;

    let mut state = initial_state.clone();
    let mut step_outputs: Vec<Array2<f64>> = Vec::with_capacity(seq_len);
    for t in 0..seq_len {
        let input_t = inputs.index_axis(Axis(0), t).to_owned();
        let (output, next_state) = core.step(&input_t, &state)?;
        step_outputs.push(output);
        state = next_state;
    }

    let views: Vec<_> = step_outputs.iter().map(|o| o.view()).collect();
    let outputs = ndarray::stack(Axis(0), &views).unwrap();
    Ok((outputs, state))
}

/// 与 [`dynamic_unroll`] 相同, 但额外返回每一步的状态序列。
pub fn dynamic_unroll_with_states(
    core: &mut dyn RnnCore,
    inputs: &Array3<f64>,
    initial_state: &State,
) -> Result<(Array3<f64>, State, StateSeq)> {
    check_nonempty(inputs)?;
    let seq_len = inputs.dim().0;

    let mut state = initial_state.clone();
    let mut step_outputs: Vec<Array2<f64>> = Vec::with_capacity(seq_len);
    let mut step_states: Vec<State> = Vec::with_capacity(seq_len);
    for t in 0..seq_len {
        let input_t = inputs.index_axis(Axis(0), t).to_owned();
        let (output, next_state) = core.step(&input_t, &state)?;
        step_outputs.push(output);
        step_states.push(next_state.clone());
        state = next_state;
    }

    let views: Vec<_> = step_outputs.iter().map(|o| o.view()).collect();
    let outputs = ndarray::stack(Axis(0), &views).unwrap();
    let state_refs: Vec<&State> = step_states.iter().collect();
    let state_seq = stack_states(&state_refs);
    Ok((outputs, state, state_seq))
}
