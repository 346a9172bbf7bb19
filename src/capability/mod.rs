//! 能力层：Capability trait、注册表、运行时上下文、Action Runner 与内置能力

pub mod calculate;
pub mod call_api;
pub mod context;
pub mod echo;
pub mod registry;
pub mod runner;
pub mod wait;

pub use calculate::CalculateCapability;
pub use call_api::CallApiCapability;
pub use context::{
    DisabledFetch, FetchRequest, FetchResponse, HttpFetch, ReqwestFetcher, RuntimeContext,
    Sleeper, TokioSleeper,
};
pub use echo::EchoCapability;
pub use registry::{Capability, CapabilityInfo, CapabilityRegistry};
pub use runner::{ActionRunner, RunError};
pub use wait::WaitCapability;

/// 注册全部内置能力（echo / callApi / wait / calculate）
pub fn register_builtins(registry: &mut CapabilityRegistry) {
    registry.register(EchoCapability);
    registry.register(CallApiCapability);
    registry.register(WaitCapability);
    registry.register(CalculateCapability);
}
