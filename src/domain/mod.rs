// Domain layer: naming model and ports (tool runner, storage, config, progress).

pub mod model;
pub mod ports;
