use ndarray::ArrayD;

/// 模块中的一个可训练参数快照。
///
/// `name` 是以 `/` 分隔的层级路径，例如 `"rnn/in_to_hidden/w"`；
/// `value` 用动态维度数组统一承载权重矩阵和偏置向量。
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub value: ArrayD<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// 变量的形状。
    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }
}
