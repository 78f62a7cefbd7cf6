// 循环核心 (例如, VanillaRnn, Lstm, DeepRnn) 与序列展开
pub mod bidirectional;
pub mod deep_rnn;
pub mod gru;
pub mod lstm;
pub mod model_rnn;
pub mod rnn_core;
pub mod trainable_state;
pub mod unroll;
pub mod vanilla_rnn;
