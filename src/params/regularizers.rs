use std::collections::HashMap;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, Result};

/// 参数正则化器。
///
/// 附着在某个参数上，`penalty` 按当前参数值计算正则化损失。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Regularizer {
    /// L1 正则：`scale * Σ|x|`。
    L1(f64),
    /// L2 正则：`scale * Σx² / 2`。
    L2(f64),
}

/// 正则化器配置表：参数名 (例如 "w" / "b") -> 正则化器。
pub type RegularizerMap = HashMap<String, Regularizer>;

/// 两级正则化器配置：子模块名 -> 参数名 -> 正则化器。
pub type NestedRegularizerMap = HashMap<String, RegularizerMap>;

impl Regularizer {
    /// 计算该参数当前值的正则化损失。
    pub fn penalty(&self, value: &ArrayD<f64>) -> f64 {
        match *self {
            Regularizer::L1(scale) => scale * value.iter().map(|v| v.abs()).sum::<f64>(),
            Regularizer::L2(scale) => scale * value.iter().map(|v| v * v).sum::<f64>() / 2.0,
        }
    }
}

/// 校验正则化器配置表的键都落在允许的集合内。
pub fn check_regularizer_keys<V>(map: &HashMap<String, V>, allowed: &[&str]) -> Result<()> {
    let mut bad: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if bad.is_empty() {
        return Ok(());
    }
    bad.sort_unstable();
    Err(ModuleError::InvalidRegularizerKeys {
        keys: bad.join(", "),
        allowed: allowed.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_l1_penalty() {
        let value = arr2(&[[1.0, -2.0], [3.0, -4.0]]).into_dyn();
        let loss = Regularizer::L1(0.5).penalty(&value);
        assert!((loss - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_l2_penalty() {
        // l2_loss 约定：Σx² / 2
        let value = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let loss = Regularizer::L2(1.0).penalty(&value);
        assert!((loss - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_serde_round_trip() {
        let reg = Regularizer::L2(0.01);
        let json = serde_json::to_string(&reg).unwrap();
        assert_eq!(json, r#"{"L2":0.01}"#);
        let back: Regularizer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reg);
    }

    #[test]
    fn test_check_regularizer_keys() {
        let mut map = RegularizerMap::new();
        map.insert("w".to_string(), Regularizer::L2(1.0));
        assert!(check_regularizer_keys(&map, &["w", "b"]).is_ok());

        map.insert("invalid".to_string(), Regularizer::L1(1.0));
        let err = check_regularizer_keys(&map, &["w", "b"]).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidRegularizerKeys { .. }));
    }
}
