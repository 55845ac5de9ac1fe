//! Prelude

pub use crate::clock::ClockRates as _bsp430_ClockRates;
pub use crate::cpu::Cpu as _bsp430_Cpu;
pub use crate::cpu::WatchdogFeed as _bsp430_WatchdogFeed;
pub use crate::platform::PeripheralPins as _bsp430_PeripheralPins;
pub use crate::timer::TimerEventHandler as _bsp430_TimerEventHandler;
pub use crate::Bc2 as _bsp430_Bc2;
pub use crate::ResetVectorReg as _bsp430_ResetVectorReg;
pub use crate::TimerA as _bsp430_TimerA;
pub use embedded_hal::delay::DelayNs as _bsp430_DelayNs;
