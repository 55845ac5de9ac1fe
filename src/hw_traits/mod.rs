pub mod bc2;
pub mod sysrst;
pub mod timera;
