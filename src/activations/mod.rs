// 激活函数 (Tanh, Sigmoid, Relu)
pub mod functions;
pub mod traits;
