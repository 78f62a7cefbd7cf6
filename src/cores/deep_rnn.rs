use std::fmt;

use ndarray::{Array2, Axis, concatenate};
use tracing::warn;

use crate::cores::rnn_core::{RnnCore, State, StateSize, check_state};
use crate::error::{ModuleError, Result};
use crate::params::variable::Variable;

/// 把若干核心纵向堆叠成一个核心。
///
/// 开启 skip connections 时, 第 0 层看到原始输入, 第 i>0 层看到
/// concat([原始输入, 上一层输出]); 整体输出默认是所有层输出的拼接,
/// 可用 [`with_concat_final_output`](DeepRnn::with_concat_final_output)
/// 改成只取最后一层。关闭时就是朴素的逐层串联。
///
/// 堆叠的状态是各递归子核心状态按顺序组成的元组, 无状态子核心不占位。
/// 堆叠自身不持有任何变量, 子核心的变量经 [`cores`](DeepRnn::cores) 访问。
pub struct DeepRnn {
    name: String,
    cores: Vec<Box<dyn RnnCore>>,
    skip_connections: bool,
    concat_final_output_if_skip: bool,
    inferred_output_size: Option<usize>,
}

impl DeepRnn {
    /// 创建堆叠。开启 skip connections 时所有核心都必须是递归核心。
    pub fn new(
        name: impl Into<String>,
        cores: Vec<Box<dyn RnnCore>>,
        skip_connections: bool,
    ) -> Result<Self> {
        if cores.is_empty() {
            return Err(ModuleError::InvalidParameter {
                what: "DeepRnn requires at least one core".to_string(),
            });
        }
        if skip_connections {
            for core in &cores {
                if !core.is_recurrent() {
                    return Err(ModuleError::NonRecurrentWithSkip {
                        core: core.name().to_string(),
                    });
                }
            }
        }
        Ok(Self {
            name: name.into(),
            cores,
            skip_connections,
            concat_final_output_if_skip: true,
            inferred_output_size: None,
        })
    }

    /// skip connections 开启时, 选择输出是全部层的拼接还是最后一层。
    pub fn with_concat_final_output(mut self, concat: bool) -> Self {
        self.concat_final_output_if_skip = concat;
        self
    }

    /// 堆叠的子核心, 顺序与构造时一致。
    pub fn cores(&self) -> &[Box<dyn RnnCore>] {
        &self.cores
    }

    pub fn cores_mut(&mut self) -> &mut [Box<dyn RnnCore>] {
        &mut self.cores
    }

    pub fn skip_connections(&self) -> bool {
        self.skip_connections
    }
}

// Box<dyn RnnCore> 没有 Debug, 只打印核心名
impl fmt::Debug for DeepRnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core_names: Vec<&str> = self.cores.iter().map(|c| c.name()).collect();
        f.debug_struct("DeepRnn")
            .field("name", &self.name)
            .field("cores", &core_names)
            .field("skip_connections", &self.skip_connections)
            .field("concat_final_output_if_skip", &self.concat_final_output_if_skip)
            .field("inferred_output_size", &self.inferred_output_size)
            .finish()
    }
}

impl RnnCore for DeepRnn {
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        check_state(&self.name, &self.state_size(), prev_state, input.nrows())?;
        let State::Tuple(states) = prev_state else {
            unreachable!()
        };

        let mut next_states = Vec::new();
        let mut outputs: Vec<Array2<f64>> = Vec::new();
        let mut current = input.clone();
        let mut recurrent_idx = 0;

        for (i, core) in self.cores.iter_mut().enumerate() {
            if self.skip_connections && i > 0 {
                current = concatenate(Axis(1), &[input.view(), current.view()]).unwrap();
            }
            if core.is_recurrent() {
                let (out, next) = core.step(&current, &states[recurrent_idx])?;
                recurrent_idx += 1;
                next_states.push(next);
                current = out;
            } else {
                let (out, _) = core.step(&current, &State::Empty)?;
                current = out;
            }
            if self.skip_connections {
                outputs.push(current.clone());
            }
        }

        let output = if self.skip_connections && self.concat_final_output_if_skip {
            let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
            concatenate(Axis(1), &views).unwrap()
        } else {
            current
        };
        self.inferred_output_size = Some(output.ncols());
        Ok((output, State::Tuple(next_states)))
    }

    fn state_size(&self) -> StateSize {
        StateSize::Tuple(
            self.cores
                .iter()
                .filter(|c| c.is_recurrent())
                .map(|c| c.state_size())
                .collect(),
        )
    }

    fn output_size(&self) -> Option<usize> {
        if self.skip_connections && self.concat_final_output_if_skip {
            let mut total = 0;
            for core in &self.cores {
                total += core.output_size()?;
            }
            return Some(total);
        }
        if let Some(size) = self.cores.last().unwrap().output_size() {
            return Some(size);
        }
        if let Some(size) = self.inferred_output_size {
            warn!(
                module = %self.name,
                size,
                "stack has been connected, reporting the output size observed then"
            );
            return Some(size);
        }
        // 最后一个核心没有声明输出维度, 往前找最近声明了的兜底
        let fallback = self.cores.iter().rev().find_map(|core| core.output_size());
        if let Some(size) = fallback {
            warn!(
                module = %self.name,
                size,
                "final core does not declare an output size, reporting the closest declared one"
            );
        }
        fallback
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// 堆叠自身没有变量, 连接之后返回空表。
    /// 子核心的变量从 [`cores`](DeepRnn::cores) 取。
    fn variables(&self) -> Result<Vec<Variable>> {
        if self.inferred_output_size.is_none() {
            return Err(ModuleError::NotInstantiated {
                module: self.name.clone(),
            });
        }
        Ok(Vec::new())
    }

    fn regularization_losses(&self) -> Vec<f64> {
        self.cores
            .iter()
            .flat_map(|core| core.regularization_losses())
            .collect()
    }

    fn state_part_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for core in &self.cores {
            if core.is_recurrent() {
                for part in core.state_part_names() {
                    names.push(format!("{}_initial_state/{part}", core.name()));
                }
            }
        }
        names
    }
}
