use thiserror::Error;

/// 模块库的统一错误类型。
#[derive(Debug, Error)]
pub enum ModuleError {
    /// 模块尚未连接（从未执行过前向传播），变量还不存在。
    #[error("variables in module '{module}' are not instantiated yet, run a forward pass first")]
    NotInstantiated { module: String },

    /// 初始化器配置表中出现了不认识的键。
    #[error("invalid initializer keys [{keys}], allowed keys are [{allowed}]")]
    InvalidInitializerKeys { keys: String, allowed: String },

    /// 正则化器配置表中出现了不认识的键。
    #[error("invalid regularizer keys [{keys}], allowed keys are [{allowed}]")]
    InvalidRegularizerKeys { keys: String, allowed: String },

    /// skip connections 要求堆叠中所有核心都是递归核心。
    #[error("skip_connections are enabled but core '{core}' is not recurrent, which is not supported")]
    NonRecurrentWithSkip { core: String },

    /// 需要已知输出维度的场合拿不到输出维度。
    #[error("module '{module}' does not expose an output size")]
    UnknownOutputSize { module: String },

    /// 传入的状态结构与核心声明的 state_size 不一致。
    #[error("state mismatch in module '{module}': expected {expected}, got {got}")]
    StateMismatch {
        module: String,
        expected: String,
        got: String,
    },

    /// 输入形状与已构建的参数不一致。
    #[error("shape mismatch in module '{module}': expected {expected}, got {got}")]
    ShapeMismatch {
        module: String,
        expected: String,
        got: String,
    },

    /// 非法的数值参数（例如负的标准差、长度不匹配的初始化器列表）。
    #[error("invalid parameter: {what}")]
    InvalidParameter { what: String },
}

pub type Result<T> = std::result::Result<T, ModuleError>;
