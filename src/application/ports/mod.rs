//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod background_observer;
mod tts_engine;
mod warm_store;

pub use background_observer::{BackgroundErrorObserver, BackgroundTask, TracingObserver};
pub use tts_engine::{SynthesisRequest, TtsEnginePort, TtsError};
pub use warm_store::WarmStorePort;
