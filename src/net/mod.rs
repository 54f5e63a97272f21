// Network primitives

mod ports;

pub use ports::PortAllocator;
