use ndarray::{Array2, Axis, concatenate};

use crate::activations::functions::{sigmoid, tanh};
use crate::cores::rnn_core::{RnnCore, State, StateSize, check_state};
use crate::error::Result;
use crate::layers::linear::Linear;
use crate::layers::module::FeedForward;
use crate::params::initializers::{NestedInitializerMap, check_initializer_keys};
use crate::params::regularizers::{NestedRegularizerMap, check_regularizer_keys};
use crate::params::variable::Variable;

/// Gru 配置表接受的子模块键。
pub const GRU_CONFIG_KEYS: [&str; 3] = ["reset", "update", "candidate"];

/// 门控循环单元。
///
///   r_t = sigmoid(reset(concat([x_t, h_{t-1}])))
///   z_t = sigmoid(update(concat([x_t, h_{t-1}])))
///   h~  = tanh(candidate(concat([x_t, r_t * h_{t-1}])))
///   h_t = (1 - z_t) * h_{t-1} + z_t * h~
///
/// 输出和下一个状态都是 h_t。
#[derive(Debug)]
pub struct Gru {
    name: String,
    hidden_size: usize,
    reset: Linear,
    update: Linear,
    candidate: Linear,
}

impl Gru {
    pub fn new(name: impl Into<String>, hidden_size: usize) -> Self {
        let name = name.into();
        let reset = Linear::new(format!("{name}/reset"), hidden_size);
        let update = Linear::new(format!("{name}/update"), hidden_size);
        let candidate = Linear::new(format!("{name}/candidate"), hidden_size);
        Self {
            name,
            hidden_size,
            reset,
            update,
            candidate,
        }
    }

    /// 配置初始化器。外层键为门名, 内层键为 "w" 和 "b"。
    pub fn with_initializers(mut self, mut initializers: NestedInitializerMap) -> Result<Self> {
        check_initializer_keys(&initializers, &GRU_CONFIG_KEYS)?;
        if let Some(map) = initializers.remove("reset") {
            self.reset = self.reset.with_initializers(map)?;
        }
        if let Some(map) = initializers.remove("update") {
            self.update = self.update.with_initializers(map)?;
        }
        if let Some(map) = initializers.remove("candidate") {
            self.candidate = self.candidate.with_initializers(map)?;
        }
        Ok(self)
    }

    /// 配置正则化器。外层键为门名, 内层键为 "w" 和 "b"。
    pub fn with_regularizers(mut self, mut regularizers: NestedRegularizerMap) -> Result<Self> {
        check_regularizer_keys(&regularizers, &GRU_CONFIG_KEYS)?;
        if let Some(map) = regularizers.remove("reset") {
            self.reset = self.reset.with_regularizers(map)?;
        }
        if let Some(map) = regularizers.remove("update") {
            self.update = self.update.with_regularizers(map)?;
        }
        if let Some(map) = regularizers.remove("candidate") {
            self.candidate = self.candidate.with_regularizers(map)?;
        }
        Ok(self)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl RnnCore for Gru {
    fn step(&mut self, input: &Array2<f64>, prev_state: &State) -> Result<(Array2<f64>, State)> {
        check_state(&self.name, &self.state_size(), prev_state, input.nrows())?;
        let prev_hidden = prev_state.as_tensor().unwrap();

        let xh = concatenate(Axis(1), &[input.view(), prev_hidden.view()]).unwrap();
        let r = sigmoid(&self.reset.forward(&xh)?);
        let z = sigmoid(&self.update.forward(&xh)?);

        let gated = r * prev_hidden;
        let xg = concatenate(Axis(1), &[input.view(), gated.view()]).unwrap();
        let candidate = tanh(&self.candidate.forward(&xg)?);

        let next_hidden = (1.0 - &z) * prev_hidden + z * candidate;
        Ok((next_hidden.clone(), State::Tensor(next_hidden)))
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
        let mut vars = self.reset.variables()?;
        vars.extend(self.update.variables()?);
        vars.extend(self.candidate.variables()?);
        Ok(vars)
    }

    fn regularization_losses(&self) -> Vec<f64> {
        let mut losses = self.reset.regularization_losses();
        losses.extend(self.update.regularization_losses());
        losses.extend(self.candidate.regularization_losses());
        losses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use crate::params::initializers::{Initializer, InitializerMap};

    fn ones_weight_gru(hidden_size: usize) -> Gru {
        let mut initializers = NestedInitializerMap::new();
        for gate in GRU_CONFIG_KEYS {
            let mut inner = InitializerMap::new();
            inner.insert("w".to_string(), Initializer::Ones);
            initializers.insert(gate.to_string(), inner);
        }
        Gru::new("gru", hidden_size)
            .with_initializers(initializers)
            .unwrap()
    }

    #[test]
    fn test_shape() {
        let mut core = Gru::new("gru", 5);
        let input = Array2::zeros((3, 4));
        let prev_state = core.initial_state(3);

        let (output, next_state) = core.step(&input, &prev_state).unwrap();
        assert_eq!(output.dim(), (3, 5));
        let next_hidden = next_state.as_tensor().unwrap();
        assert_eq!(next_hidden.dim(), (3, 5));
        assert_eq!(&output, next_hidden);
    }

    #[test]
    fn test_variables() {
        let mut core = Gru::new("gru", 5);
        assert!(core.variables().is_err());

        core.step(&Array2::zeros((3, 4)), &core.initial_state(3))
            .unwrap();
        let vars = core.variables().unwrap();
        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "gru/reset/w",
                "gru/reset/b",
                "gru/update/w",
                "gru/update/b",
                "gru/candidate/w",
                "gru/candidate/b",
            ]
        );
        assert_eq!(vars[0].shape(), &[9, 5]);
        assert_eq!(vars[4].shape(), &[9, 5]);
    }

    #[test]
    fn test_computation() {
        let mut core = ones_weight_gru(1);
        let input = Array2::ones((1, 2));
        let prev = State::Tensor(Array2::ones((1, 1)));

        let (output, _) = core.step(&input, &prev).unwrap();

        // xh = [1, 1, 1], r = z = sigmoid(3)
        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
        let r = sig(3.0);
        let z = sig(3.0);
        let candidate = (2.0 + r).tanh();
        let expected = (1.0 - z) * 1.0 + z * candidate;
        assert!((output[[0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config_keys() {
        let mut initializers = NestedInitializerMap::new();
        initializers.insert("gates".to_string(), InitializerMap::new());
        let err = Gru::new("gru", 5)
            .with_initializers(initializers)
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidInitializerKeys { .. }));
    }

    #[test]
    fn test_state_part_names() {
        let core = Gru::new("gru", 5);
        assert_eq!(core.state_part_names(), vec!["state"]);
    }
}
