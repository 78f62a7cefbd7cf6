use ndarray::Array2;

/// 定义激活函数的通用接口。
///
/// 本库只做前向计算，批量输入约定为 `[batch_size, dim]`。
pub trait Activation {
    /// 对单个标量求值。
    fn apply_scalar(&self, x: f64) -> f64;

    /// 对批量输入逐元素求值。
    fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        x.mapv(|v| self.apply_scalar(v))
    }

    /// 激活函数的名字，用作无参数模块的模块名。
    fn name(&self) -> &'static str;
}
