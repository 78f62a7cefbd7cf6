use ndarray::{Array2, Axis, concatenate, s};

use crate::activations::functions::{sigmoid, tanh};
use crate::cores::rnn_core::{RnnCore, State, StateSize, check_state};
use crate::error::Result;
use crate::layers::linear::Linear;
use crate::layers::module::FeedForward;
use crate::params::initializers::{NestedInitializerMap, check_initializer_keys};
use crate::params::regularizers::{NestedRegularizerMap, check_regularizer_keys};
use crate::params::variable::Variable;

/// Lstm 配置表接受的子模块键。
pub const LSTM_CONFIG_KEYS: [&str; 1] = ["gates"];

/// 长短期记忆核心。
///
/// 四个门共享一个作用在 concat([x_t, h_{t-1}]) 上的 [`Linear`]
/// (`<name>/gates`, 输出 4*hidden), 按 i, g, f, o 的顺序切分:
///
///   c_t = sigmoid(f + forget_bias) * c_{t-1} + sigmoid(i) * tanh(g)
///   h_t = sigmoid(o) * tanh(c_t)
///
/// 状态是 (hidden, cell) 二元组, 输出是 hidden。
#[derive(Debug)]
pub struct Lstm {
    name: String,
    hidden_size: usize,
    forget_bias: f64,
    gates: Linear,
}

impl Lstm {
    pub fn new(name: impl Into<String>, hidden_size: usize) -> Self {
        let name = name.into();
        let gates = Linear::new(format!("{name}/gates"), 4 * hidden_size);
        Self {
            name,
            hidden_size,
            forget_bias: 1.0,
            gates,
        }
    }

    /// 调整遗忘门的固定偏移, 默认 1.0。
    pub fn with_forget_bias(mut self, forget_bias: f64) -> Self {
        self.forget_bias = forget_bias;
        self
    }

    /// 配置初始化器。外层键为 "gates", 内层键为 "w" 和 "b"。
    pub fn with_initializers(mut self, mut initializers: NestedInitializerMap) -> Result<Self> {
        check_initializer_keys(&initializers, &LSTM_CONFIG_KEYS)?;
        if let Some(map) = initializers.remove("gates") {
            self.gates = self.gates.with_initializers(map)?;
        }
        Ok(self)
    }

    /// 配置正则化器。外层键为 "gates", 内层键为 "w" 和 "b"。
    pub fn with_regularizers(mut self, mut regularizers: NestedRegularizerMap) -> Result<Self> {
        check_regularizer_keys(&regularizers, &LSTM_CONFIG_KEYS)?;
        if let Some(map) = regularizers.remove("gates") {
            self.gates = self.gates.with_regularizers(map)?;
        }
        Ok(self)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl RnnCore for Lstm {
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        check_state(&self.name, &self.state_size(), prev_state, input.nrows())?;
        let leaves = prev_state.leaves();
        let prev_hidden = leaves[0];
        let prev_cell = leaves[1];

        // batch 一致性已校验, 拼接不会失败
        let xh = concatenate(Axis(1), &[input.view(), prev_hidden.view()]).unwrap();
        let gates = self.gates.forward(&xh)?;

        let h = self.hidden_size;
        let i = gates.slice(s![.., ..h]).to_owned();
        let g = gates.slice(s![.., h..2 * h]).to_owned();
        let f = gates.slice(s![.., 2 * h..3 * h]).to_owned();
        let o = gates.slice(s![.., 3 * h..]).to_owned();

        let next_cell = sigmoid(&(f + self.forget_bias)) * prev_cell + sigmoid(&i) * tanh(&g);
        let next_hidden = sigmoid(&o) * tanh(&next_cell);

        let next_state = State::Tuple(vec![
            State::Tensor(next_hidden.clone()),
            State::Tensor(next_cell),
        ]);
        Ok((next_hidden, next_state))
    }

    fn state_size(&self) -> StateSize {
        StateSize::Tuple(vec![
            StateSize::Vector(self.hidden_size),
            StateSize::Vector(self.hidden_size),
        ])
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.hidden_size)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        self.gates.variables()
    }

    fn regularization_losses(&self) -> Vec<f64> {
        self.gates.regularization_losses()
    }

    fn state_part_names(&self) -> Vec<String> {
        vec!["state_hidden".to_string(), "state_cell".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use crate::params::initializers::{Initializer, InitializerMap};

    fn ones_gate_lstm(hidden_size: usize) -> Lstm {
        let mut inner = InitializerMap::new();
        inner.insert("w".to_string(), Initializer::Ones);
        let mut initializers = NestedInitializerMap::new();
        initializers.insert("gates".to_string(), inner);
        Lstm::new("lstm", hidden_size)
            .with_initializers(initializers)
            .unwrap()
    }

    #[test]
    fn test_shape() {
        let mut core = Lstm::new("lstm", 5);
        let input = Array2::zeros((3, 4));
        let prev_state = core.initial_state(3);

        let (output, next_state) = core.step(&input, &prev_state).unwrap();
        assert_eq!(output.dim(), (3, 5));
        let leaves = next_state.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].dim(), (3, 5));
        assert_eq!(leaves[1].dim(), (3, 5));
        // 输出就是 hidden 部分
        assert_eq!(&output, leaves[0]);
    }

    #[test]
    fn test_variables() {
        let mut core = Lstm::new("lstm", 5);
        assert!(core.variables().is_err());

        core.step(&Array2::zeros((3, 4)), &core.initial_state(3))
            .unwrap();
        let vars = core.variables().unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "lstm/gates/w");
        assert_eq!(vars[0].shape(), &[9, 20]);
        assert_eq!(vars[1].name, "lstm/gates/b");
        assert_eq!(vars[1].shape(), &[20]);
    }

    #[test]
    fn test_computation() {
        let mut core = ones_gate_lstm(1);
        let input = Array2::ones((1, 2));
        let (output, next_state) = core.step(&input, &core.initial_state(1)).unwrap();

        // xh = [1, 1, 0], 每个门的预激活都是 2
        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
        let expected_cell = sig(2.0 + 1.0) * 0.0 + sig(2.0) * 2.0_f64.tanh();
        let expected_hidden = sig(2.0) * expected_cell.tanh();

        assert!((output[[0, 0]] - expected_hidden).abs() < 1e-6);
        let leaves = next_state.leaves();
        assert!((leaves[0][[0, 0]] - expected_hidden).abs() < 1e-6);
        assert!((leaves[1][[0, 0]] - expected_cell).abs() < 1e-6);
    }

    #[test]
    fn test_forget_bias() {
        let prev = State::Tuple(vec![
            State::Tensor(Array2::zeros((1, 1))),
            State::Tensor(Array2::ones((1, 1))),
        ]);
        let input = Array2::ones((1, 2));
        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());

        let mut default_bias = ones_gate_lstm(1);
        let (_, state) = default_bias.step(&input, &prev).unwrap();
        let expected = sig(2.0 + 1.0) * 1.0 + sig(2.0) * 2.0_f64.tanh();
        assert!((state.leaves()[1][[0, 0]] - expected).abs() < 1e-6);

        let mut zero_bias = ones_gate_lstm(1).with_forget_bias(0.0);
        let (_, state) = zero_bias.step(&input, &prev).unwrap();
        let expected = sig(2.0) * 1.0 + sig(2.0) * 2.0_f64.tanh();
        assert!((state.leaves()[1][[0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_state_part_names() {
        let core = Lstm::new("lstm", 5);
        assert_eq!(core.state_part_names(), vec!["state_hidden", "state_cell"]);
    }

    #[test]
    fn test_invalid_config_keys() {
        let mut initializers = NestedInitializerMap::new();
        initializers.insert("in_to_hidden".to_string(), InitializerMap::new());
        let err = Lstm::new("lstm", 5)
            .with_initializers(initializers)
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidInitializerKeys { .. }));
    }

    #[test]
    fn test_state_mismatch() {
        let mut core = Lstm::new("lstm", 5);
        let err = core
            .step(&Array2::zeros((3, 4)), &State::Tensor(Array2::zeros((3, 5))))
            .unwrap_err();
        assert!(matches!(err, ModuleError::StateMismatch { .. }));
    }
}
