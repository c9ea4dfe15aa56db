// Domain layer: data model and ports. Concrete rendering, transport and storage live elsewhere.

pub mod model;
pub mod ports;
