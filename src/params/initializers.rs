use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, Result};

/// 参数初始化器。
///
/// 懒构建的模块在第一次前向传播时用它实例化参数张量。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Zeros,
    Ones,
    Constant(f64),
    RandomUniform { low: f64, high: f64 },
    RandomNormal { mean: f64, std_dev: f64 },
}

/// 初始化器配置表：参数名 (例如 "w" / "b") -> 初始化器。
pub type InitializerMap = HashMap<String, Initializer>;

/// 两级初始化器配置：子模块名 -> 参数名 -> 初始化器。
pub type NestedInitializerMap = HashMap<String, InitializerMap>;

impl Initializer {
    /// 权重的默认初始化：均匀分布 (-0.1, 0.1)。
    pub fn default_weight() -> Self {
        Initializer::RandomUniform {
            low: -0.1,
            high: 0.1,
        }
    }

    /// 偏置的默认初始化：全零。
    pub fn default_bias() -> Self {
        Initializer::Zeros
    }

    /// 按给定形状实例化参数张量。
    pub fn materialize(&self, shape: &[usize]) -> Result<ArrayD<f64>> {
        match *self {
            Initializer::Zeros => Ok(ArrayD::zeros(IxDyn(shape))),
            Initializer::Ones => Ok(ArrayD::ones(IxDyn(shape))),
            Initializer::Constant(c) => Ok(ArrayD::from_elem(IxDyn(shape), c)),
            Initializer::RandomUniform { low, high } => {
                if !(low < high) || !low.is_finite() || !high.is_finite() {
                    return Err(ModuleError::InvalidParameter {
                        what: format!("uniform initializer range ({low}, {high})"),
                    });
                }
                Ok(ArrayD::random(IxDyn(shape), Uniform::new(low, high)))
            }
            Initializer::RandomNormal { mean, std_dev } => {
                // rand_distr 把负的标准差当成镜像分布接受, 这里先行拒绝
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(ModuleError::InvalidParameter {
                        what: format!("normal initializer parameters ({mean}, {std_dev})"),
                    });
                }
                let dist = Normal::new(mean, std_dev).map_err(|_| ModuleError::InvalidParameter {
                    what: format!("normal initializer with std_dev {std_dev}"),
                })?;
                Ok(ArrayD::random(IxDyn(shape), dist))
            }
        }
    }
}

/// 校验初始化器配置表的键都落在允许的集合内。
///
/// 校验发生在模块构造阶段，配置错误不会拖到第一次前向传播才暴露。
pub fn check_initializer_keys<V>(map: &HashMap<String, V>, allowed: &[&str]) -> Result<()> {
    let mut bad: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if bad.is_empty() {
        return Ok(());
    }
    bad.sort_unstable();
    Err(ModuleError::InvalidInitializerKeys {
        keys: bad.join(", "),
        allowed: allowed.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_constant_family() {
        let zeros = Initializer::Zeros.materialize(&[2, 3]).unwrap();
        assert_eq!(zeros.shape(), &[2, 3]);
        assert!(zeros.iter().all(|&v| v == 0.0));

        let ones = Initializer::Ones.materialize(&[4]).unwrap();
        assert!(ones.iter().all(|&v| v == 1.0));

        let sevens = Initializer::Constant(7.0).materialize(&[2, 2]).unwrap();
        assert!(sevens.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_materialize_random_uniform_range() {
        let w = Initializer::default_weight().materialize(&[5, 8]).unwrap();
        assert_eq!(w.shape(), &[5, 8]);
        assert!(w.iter().all(|&v| v > -0.1 && v < 0.1));
    }

    #[test]
    fn test_materialize_rejects_bad_parameters() {
        let err = Initializer::RandomUniform { low: 1.0, high: 0.0 }
            .materialize(&[2])
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter { .. }));

        let err = Initializer::RandomNormal {
            mean: 0.0,
            std_dev: -1.0,
        }
        .materialize(&[2])
        .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter { .. }));
    }

    #[test]
    fn test_serde_round_trip() {
        // 配置以外部标签的 JSON 形式存档
        let init = Initializer::RandomNormal {
            mean: 0.5,
            std_dev: 2.0,
        };
        let json = serde_json::to_string(&init).unwrap();
        assert_eq!(json, r#"{"RandomNormal":{"mean":0.5,"std_dev":2.0}}"#);
        let back: Initializer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, init);

        assert_eq!(serde_json::to_string(&Initializer::Zeros).unwrap(), r#""Zeros""#);
    }

    #[test]
    fn test_check_initializer_keys() {
        let mut map = InitializerMap::new();
        map.insert("w".to_string(), Initializer::Ones);
        assert!(check_initializer_keys(&map, &["w", "b"]).is_ok());

        map.insert("invalid".to_string(), Initializer::Zeros);
        let err = check_initializer_keys(&map, &["w", "b"]).unwrap_err();
        match err {
            ModuleError::InvalidInitializerKeys { keys, allowed } => {
                assert_eq!(keys, "invalid");
                assert_eq!(allowed, "w, b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
