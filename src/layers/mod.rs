// 前馈层 (例如, Linear, MLP)
pub mod linear;
pub mod mlp;
pub mod module;
