pub mod chain;
pub mod logging;
pub mod p2p;
pub mod swap;
