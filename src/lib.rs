//! recore-nn：基于 ndarray 的递归神经网络构建块。
//!
//! 提供单步递归核心（VanillaRnn、Lstm、Gru）、堆叠组合（DeepRnn）、
//! 前馈模型适配（ModelRnn）、双向序列组合（BidirectionalRnn），以及
//! 配套的模块基础设施：懒构建参数、层级变量名、初始化器/正则化器
//! 配置与校验、可训练初始状态。只做前向计算，不包含自动微分。

pub mod activations;
pub mod cores;
pub mod error;
pub mod layers;
pub mod params;

pub use error::{ModuleError, Result};
