/// Service property carrying the name of the component that registered the service
pub const COMPONENT_NAME: &str = "component.name";

/// Service property carrying the numeric id of the component configuration
pub const COMPONENT_ID: &str = "component.id";

/// Service property carrying the factory identifier of a component factory
pub const COMPONENT_FACTORY: &str = "component.factory";

/// Interface under which component factories are published
pub const COMPONENT_FACTORY_INTERFACE: &str = "scr.ComponentFactory";

/// Properties whose key starts with this marker are never exposed on a registered service
pub const PRIVATE_PROPERTY_PREFIX: &str = ".";

/// Default bound (milliseconds) on every wait for the build lock or a concurrent build
pub const DEFAULT_WAIT_TIME_ON_BLOCK_MS: u64 = 10_000;

/// Environment override for the wait time, in milliseconds
pub const ENV_WAIT_TIME_ON_BLOCK: &str = "SCR_WAIT_TIME_ON_BLOCK";

/// Environment override for the timeout policy (`best_effort` or `strict`)
pub const ENV_TIMEOUT_POLICY: &str = "SCR_TIMEOUT_POLICY";

/// Environment override forcing instantiation of every non-factory component
pub const ENV_INSTANTIATE_ALL: &str = "SCR_INSTANTIATE_ALL";

/// Environment override enabling build/dispose timing logs
pub const ENV_PERF: &str = "SCR_PERF";
