// Adapters layer: concrete implementations for external systems (font rasterizer, SMTP transport).

pub mod fonts;
pub mod smtp;
