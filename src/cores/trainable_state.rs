use ndarray::Ix2;

use crate::cores::rnn_core::{RnnCore, State, StateSize};
use crate::error::{ModuleError, Result};
use crate::params::initializers::Initializer;
use crate::params::variable::Variable;

/// 核心的可训练初始状态。
///
/// 给状态的每个叶子创建一个 [1, dim] 的变量, 命名为
/// `<核心名>_initial_state/<叶子名>`; 取状态时沿 batch 维广播。
/// 不给初始化器时叶子默认全零。
#[derive(Debug)]
pub struct TrainableInitialState {
    name: String,
    state_size: StateSize,
    variables: Vec<Variable>,
}

impl TrainableInitialState {
    /// 按核心当前的状态结构创建变量。
    ///
    /// `initializers` 要么给一个(所有叶子共享), 要么每个叶子一个。
    pub fn for_core(core: &dyn RnnCore, initializers: Option<&[Initializer]>) -> Result<Self> {
        let name = format!("{}_initial_state", core.name());
        let state_size = core.state_size();
        let leaf_sizes = state_size.leaf_sizes();
        let part_names = core.state_part_names();

        if let Some(list) = initializers {
            if list.len() != 1 && list.len() != leaf_sizes.len() {
                return Err(ModuleError::InvalidParameter {
                    what: format!(
                        "expected 1 or {} initializers for '{name}', got {}",
                        leaf_sizes.len(),
                        list.len()
                    ),
                });
            }
        }

        let mut variables = Vec::with_capacity(leaf_sizes.len());
        for (i, (dim, part)) in leaf_sizes.iter().zip(part_names.iter()).enumerate() {
            let init = match initializers {
                None => Initializer::Zeros,
                Some(list) if list.len() == 1 => list[0].clone(),
                Some(list) => list[i].clone(),
            };
            let value = init.materialize(&[1, *dim])?;
            variables.push(Variable::new(format!("{name}/{part}"), value));
        }

        Ok(Self {
            name,
            state_size,
            variables,
        })
    }

    /// 按核心的状态结构取一份 batch 大小的初始状态。
    pub fn state(&self, batch_size: usize) -> State {
        let mut leaves = self.variables.iter();
        build_state(&self.state_size, &mut leaves, batch_size)
    }

    /// 创建出的变量, 按叶子顺序。
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_size(&self) -> &StateSize {
        &self.state_size
    }
}

fn build_state<'a>(
    state_size: &StateSize,
    leaves: &mut impl Iterator<Item = &'a Variable>,
    batch_size: usize,
) -> State {
    match state_size {
        StateSize::Empty => State::Empty,
        StateSize::Vector(dim) => {
            // 变量是按同一个结构创建的, 叶子一定够用
            let var = leaves.next().unwrap();
            let value = var.value.clone().into_dimensionality::<Ix2>().unwrap();
            State::Tensor(value.broadcast((batch_size, *dim)).unwrap().to_owned())
        }
        StateSize::Tuple(sizes) => State::Tuple(
            sizes
                .iter()
                .map(|s| build_state(s, leaves, batch_size))
                .collect(),
        ),
    }
}
