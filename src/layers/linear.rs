use ndarray::{Array1, Array2, Ix1, Ix2};
use tracing::debug;

use crate::error::{ModuleError, Result};
use crate::layers::module::FeedForward;
use crate::params::initializers::{Initializer, InitializerMap, check_initializer_keys};
use crate::params::regularizers::{RegularizerMap, check_regularizer_keys};
use crate::params::variable::Variable;

/// Linear 模块接受的参数键。
pub const LINEAR_PARAM_KEYS: [&str; 2] = ["w", "b"];

/// 已构建的参数。只有第一次前向传播之后才存在。
#[derive(Debug)]
struct LinearParams {
    /// 权重矩阵, 形状 [input_size, output_size]
    w: Array2<f64>,
    /// 偏置向量, 形状 [output_size]
    b: Array1<f64>,
}

/// 全连接层 y = x·W + b。
///
/// 输入维度在第一次前向传播时从输入推断，参数也在那一刻才被创建。
/// 连接之前查询 [`variables`](FeedForward::variables) 会得到
/// [`ModuleError::NotInstantiated`]。
#[derive(Debug)]
pub struct Linear {
    name: String,
    output_size: usize,
    initializers: InitializerMap,
    regularizers: RegularizerMap,
    params: Option<LinearParams>,
}

impl Linear {
    /// 创建一个输出维度为 `output_size` 的全连接层。
    pub fn new(name: impl Into<String>, output_size: usize) -> Self {
        Self {
            name: name.into(),
            output_size,
            initializers: InitializerMap::new(),
            regularizers: RegularizerMap::new(),
            params: None,
        }
    }

    /// 配置初始化器。合法键为 "w" 和 "b"，出现其它键立即报错。
    pub fn with_initializers(mut self, initializers: InitializerMap) -> Result<Self> {
        check_initializer_keys(&initializers, &LINEAR_PARAM_KEYS)?;
        self.initializers = initializers;
        Ok(self)
    }

    /// 配置正则化器。合法键为 "w" 和 "b"，出现其它键立即报错。
    pub fn with_regularizers(mut self, regularizers: RegularizerMap) -> Result<Self> {
        check_regularizer_keys(&regularizers, &LINEAR_PARAM_KEYS)?;
        self.regularizers = regularizers;
        Ok(self)
    }

    /// 是否已经连接过（参数已构建）。
    pub fn is_connected(&self) -> bool {
        self.params.is_some()
    }

    /// 连接时推断出的输入维度。
    pub fn input_size(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.w.nrows())
    }

    /// 权重矩阵, 形状 [input_size, output_size]。
    pub fn w(&self) -> Result<&Array2<f64>> {
        self.params
            .as_ref()
            .map(|p| &p.w)
            .ok_or_else(|| ModuleError::NotInstantiated {
                module: self.name.clone(),
            })
    }

    /// 偏置向量, 形状 [output_size]。
    pub fn b(&self) -> Result<&Array1<f64>> {
        self.params
            .as_ref()
            .map(|p| &p.b)
            .ok_or_else(|| ModuleError::NotInstantiated {
                module: self.name.clone(),
            })
    }

    /// 替换权重矩阵。形状必须与已构建的参数一致。
    pub fn set_w(&mut self, w: Array2<f64>) -> Result<()> {
        let params = self.params.as_mut().ok_or_else(|| ModuleError::NotInstantiated {
            module: self.name.clone(),
        })?;
        if w.dim() != params.w.dim() {
            return Err(ModuleError::ShapeMismatch {
                module: self.name.clone(),
                expected: format!("{:?}", params.w.shape()),
                got: format!("{:?}", w.shape()),
            });
        }
        params.w = w;
        Ok(())
    }

    /// 从输入宽度构建参数。
    fn build(&mut self, input_size: usize) -> Result<()> {
        let w_init = self
            .initializers
            .get("w")
            .cloned()
            .unwrap_or_else(Initializer::default_weight);
        let b_init = self
            .initializers
            .get("b")
            .cloned()
            .unwrap_or_else(Initializer::default_bias);

        let w = w_init
            .materialize(&[input_size, self.output_size])?
            .into_dimensionality::<Ix2>()
            .unwrap();
        let b = b_init
            .materialize(&[self.output_size])?
            .into_dimensionality::<Ix1>()
            .unwrap();

        debug!(
            module = %self.name,
            input_size,
            output_size = self.output_size,
            "building linear parameters"
        );
        self.params = Some(LinearParams { w, b });
        Ok(())
    }
}

impl FeedForward for Linear {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        match &self.params {
            None => self.build(input.ncols())?,
            Some(params) => {
                if input.ncols() != params.w.nrows() {
                    return Err(ModuleError::ShapeMismatch {
                        module: self.name.clone(),
                        expected: format!("[batch, {}]", params.w.nrows()),
                        got: format!("[{}, {}]", input.nrows(), input.ncols()),
                    });
                }
            }
        }
        let params = self.params.as_ref().unwrap();
        Ok(input.dot(&params.w) + &params.b)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        let params = self.params.as_ref().ok_or_else(|| ModuleError::NotInstantiated {
            module: self.name.clone(),
        })?;
        Ok(vec![
            Variable::new(format!("{}/w", self.name), params.w.clone().into_dyn()),
            Variable::new(format!("{}/b", self.name), params.b.clone().into_dyn()),
        ])
    }

    fn regularization_losses(&self) -> Vec<f64> {
        let Some(params) = self.params.as_ref() else {
            return Vec::new();
        };
        let mut losses = Vec::new();
        if let Some(reg) = self.regularizers.get("w") {
            losses.push(reg.penalty(&params.w.clone().into_dyn()));
        }
        if let Some(reg) = self.regularizers.get("b") {
            losses.push(reg.penalty(&params.b.clone().into_dyn()));
        }
        losses
    }
}
