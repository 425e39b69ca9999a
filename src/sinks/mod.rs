//! Log2Mongo Sink 模块
//!
//! 包含文档输出目标的统一接口与 MongoDB 实现。

pub mod mongo;
pub mod traits;

pub use mongo::MongoSink;
pub use traits::{DocumentSink, SinkError, SinkResult};
