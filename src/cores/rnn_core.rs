use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, Result};
use crate::layers::module::FeedForward;
use crate::params::variable::Variable;

/// 核心状态的结构描述。
///
/// 与 [`State`] 一一对应：`Vector(d)` 对应一个 `[batch, d]` 张量，
/// `Tuple` 对应同构的嵌套结构，`Empty` 对应无状态核心。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateSize {
    Empty,
    Vector(usize),
    Tuple(Vec<StateSize>),
}

impl StateSize {
    /// 展平后的各叶子维度。
    pub fn leaf_sizes(&self) -> Vec<usize> {
        match self {
            StateSize::Empty => Vec::new(),
            StateSize::Vector(dim) => vec![*dim],
            StateSize::Tuple(sizes) => sizes.iter().flat_map(|s| s.leaf_sizes()).collect(),
        }
    }

    /// 可读的结构描述, 用于错误信息。
    pub fn describe(&self) -> String {
        match self {
            StateSize::Empty => "()".to_string(),
            StateSize::Vector(dim) => format!("[batch x {dim}]"),
            StateSize::Tuple(sizes) => {
                let inner: Vec<String> = sizes.iter().map(|s| s.describe()).collect();
                format!("({})", inner.join(", "))
            }
        }
    }
}

/// 循环核心在相邻两步之间传递的状态。
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Empty,
    Tensor(Array2<f64>),
    Tuple(Vec<State>),
}

impl State {
    /// 该状态的结构描述。
    pub fn size(&self) -> StateSize {
        match self {
            State::Empty => StateSize::Empty,
            State::Tensor(t) => StateSize::Vector(t.ncols()),
            State::Tuple(parts) => StateSize::Tuple(parts.iter().map(|p| p.size()).collect()),
        }
    }

    /// 单张量状态的内容。
    pub fn as_tensor(&self) -> Option<&Array2<f64>> {
        match self {
            State::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// 按深度优先顺序展平的全部叶子张量。
    pub fn leaves(&self) -> Vec<&Array2<f64>> {
        match self {
            State::Empty => Vec::new(),
            State::Tensor(t) => vec![t],
            State::Tuple(parts) => parts.iter().flat_map(|p| p.leaves()).collect(),
        }
    }

    /// 可读的形状描述, 用于错误信息。
    pub fn describe(&self) -> String {
        match self {
            State::Empty => "()".to_string(),
            State::Tensor(t) => format!("[{}x{}]", t.nrows(), t.ncols()),
            State::Tuple(parts) => {
                let inner: Vec<String> = parts.iter().map(|p| p.describe()).collect();
                format!("({})", inner.join(", "))
            }
        }
    }
}

/// 按结构描述构造全零状态。
pub fn zero_state(state_size: &StateSize, batch_size: usize) -> State {
    match state_size {
        StateSize::Empty => State::Empty,
        StateSize::Vector(dim) => State::Tensor(Array2::zeros((batch_size, *dim))),
        StateSize::Tuple(sizes) => State::Tuple(
            sizes
                .iter()
                .map(|s| zero_state(s, batch_size))
                .collect(),
        ),
    }
}

/// 校验状态的结构、各叶子维度以及 batch 大小。
pub fn check_state(
    module: &str,
    expected: &StateSize,
    state: &State,
    batch_size: usize,
) -> Result<()> {
    let ok = match (expected, state) {
        (StateSize::Empty, State::Empty) => true,
        (StateSize::Vector(dim), State::Tensor(t)) => {
            t.ncols() == *dim && t.nrows() == batch_size
        }
        (StateSize::Tuple(sizes), State::Tuple(parts)) if sizes.len() == parts.len() => {
            return sizes
                .iter()
                .zip(parts)
                .try_for_each(|(s, p)| check_state(module, s, p, batch_size));
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ModuleError::StateMismatch {
            module: module.to_string(),
            expected: format!("{} with batch size {batch_size}", expected.describe()),
            got: state.describe(),
        })
    }
}

/// 展平结构给每个状态叶子起的默认名字。
///
/// 单张量状态叫 "state"; 元组的第 i 个张量叶子叫 "state_i",
/// 嵌套元组再用 "/" 逐层展开。
pub fn default_state_part_names(state_size: &StateSize) -> Vec<String> {
    match state_size {
        StateSize::Empty => Vec::new(),
        StateSize::Vector(_) => vec!["state".to_string()],
        StateSize::Tuple(sizes) => {
            let mut names = Vec::new();
            for (i, size) in sizes.iter().enumerate() {
                match size {
                    StateSize::Empty => {}
                    StateSize::Vector(_) => names.push(format!("state_{i}")),
                    StateSize::Tuple(_) => {
                        for inner in default_state_part_names(size) {
                            names.push(format!("state_{i}/{inner}"));
                        }
                    }
                }
            }
            names
        }
    }
}

/// 循环核心的通用接口。
///
/// 核心对单个时间步做 `(input, prev_state) -> (output, next_state)`
/// 的映射；序列处理交给 [`dynamic_unroll`](crate::cores::unroll::dynamic_unroll)。
/// 参数与 [`Linear`](crate::layers::linear::Linear) 一样在第一次
/// [`step`](RnnCore::step) 时才创建。
pub trait RnnCore {
    /// 单步递归计算。
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)>;

    /// 状态结构。
    fn state_size(&self) -> StateSize;

    /// 每步输出的维度；尚不可知时返回 `None`。
    fn output_size(&self) -> Option<usize>;

    /// 核心名, 同时是变量名的前缀。
    fn name(&self) -> &str;

    /// 核心的全部变量。懒构建的核心在连接前返回
    /// [`ModuleError::NotInstantiated`]。
    fn variables(&self) -> Result<Vec<Variable>>;

    /// 附着了正则化器的参数的正则化损失。
    fn regularization_losses(&self) -> Vec<f64> {
        Vec::new()
    }

    /// 全零初始状态。
    fn initial_state(&self, batch_size: usize) -> State {
        zero_state(&self.state_size(), batch_size)
    }

    /// 是否携带递归状态。
    fn is_recurrent(&self) -> bool {
        true
    }

    /// 状态各叶子的名字, 用于给可训练初始状态的变量命名。
    fn state_part_names(&self) -> Vec<String> {
        default_state_part_names(&self.state_size())
    }
}

/// 把前馈模块适配成无状态核心, 以便混入
/// [`DeepRnn`](crate::cores::deep_rnn::DeepRnn) 堆叠。
pub struct NonRecurrent<M: FeedForward> {
    module: M,
}

impl<M: FeedForward> NonRecurrent<M> {
    pub fn new(module: M) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &M {
        &self.module
    }
}

impl<M: FeedForward> RnnCore for NonRecurrent<M> {
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        check_state(
            self.module.name(),
            &StateSize::Empty,
            prev_state,
            input.nrows(),
        )?;
        let output = self.module.forward(input)?;
        Ok((output, State::Empty))
    }

    fn state_size(&self) -> StateSize {
        StateSize::Empty
    }

    fn output_size(&self) -> Option<usize> {
        self.module.output_size()
    }

    fn name(&self) -> &str {
        self.module.name()
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        self.module.variables()
    }

    fn regularization_losses(&self) -> Vec<f64> {
        self.module.regularization_losses()
    }

    fn is_recurrent(&self) -> bool {
        false
    }
}
