// 参数基础设施 (变量、初始化器、正则化器)
pub mod initializers;
pub mod regularizers;
pub mod variable;
