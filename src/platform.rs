//! Board bring-up
//!
//! Boards describe how their peripherals reach the outside world through [`PeripheralPins`].
//! The clock code uses it to hand the crystal pins to LFXT1, and [`initialize`] runs the usual
//! boot sequence: crystal, ACLK, MCLK, then the SMCLK divider.

use crate::clock::{Bc2Clock, ClockError, ClockRates, ClockSource};
use crate::cpu::Cpu;
use crate::Bc2;
use critical_section::CriticalSection;

/// Peripherals whose pins a board can route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// LFXT1 crystal pins
    Lfxt1,
    /// Clock outputs brought out for measurement
    ExposedClocks,
    /// USCI_A0
    UsciA0,
    /// USCI_B0
    UsciB0,
}

/// How a peripheral's pins are to be used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeriphConfig {
    /// The peripheral's only or primary function
    Default,
    /// Asynchronous serial
    Uart,
    /// 3-wire SPI
    Spi3,
    /// 4-wire SPI, with STE
    Spi4,
    /// I2C
    I2c,
}

/// Pin routing errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// The board can't route this peripheral in this configuration
    Unsupported,
}

/// Board-specific pin multiplexing
pub trait PeripheralPins {
    /// Hand the pins of `periph` to the peripheral, or when `enable` is false take them back as
    /// driven-low outputs
    fn configure_peripheral_pins(
        &mut self,
        cs: CriticalSection<'_>,
        periph: Peripheral,
        config: PeriphConfig,
        enable: bool,
    ) -> Result<(), PinError>;

    /// Human readable pin assignment of `periph`, if the board documents one
    fn peripheral_help(&self, _periph: Peripheral, _config: PeriphConfig) -> Option<&'static str> {
        None
    }
}

impl<P: PeripheralPins + ?Sized> PeripheralPins for &mut P {
    #[inline]
    fn configure_peripheral_pins(
        &mut self,
        cs: CriticalSection<'_>,
        periph: Peripheral,
        config: PeriphConfig,
        enable: bool,
    ) -> Result<(), PinError> {
        (**self).configure_peripheral_pins(cs, periph, config, enable)
    }

    #[inline]
    fn peripheral_help(&self, periph: Peripheral, config: PeriphConfig) -> Option<&'static str> {
        (**self).peripheral_help(periph, config)
    }
}

/// Pin settings for one peripheral on an MSP430G2 LaunchPad
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinMux {
    /// Port 1 pins
    pub p1: u8,
    /// Port 2 pins
    pub p2: u8,
    /// Whether the function is on the secondary selector (PxSEL2 set as well as PxSEL)
    pub sel2: bool,
}

/// Pins used by `periph` on an MSP430G2 LaunchPad (MSP-EXP430G2) fitted with an MSP430G2553
pub fn launchpad_mux(periph: Peripheral, config: PeriphConfig) -> Result<PinMux, PinError> {
    const BIT0: u8 = 1 << 0;
    const BIT1: u8 = 1 << 1;
    const BIT2: u8 = 1 << 2;
    const BIT4: u8 = 1 << 4;
    const BIT5: u8 = 1 << 5;
    const BIT6: u8 = 1 << 6;
    const BIT7: u8 = 1 << 7;

    let mux = |p1, p2, sel2| PinMux { p1, p2, sel2 };
    match (periph, config) {
        (Peripheral::Lfxt1, PeriphConfig::Default) => Ok(mux(0, BIT6 | BIT7, false)),
        (Peripheral::ExposedClocks, PeriphConfig::Default) => Ok(mux(BIT0 | BIT4, 0, false)),
        (Peripheral::UsciA0, PeriphConfig::Default | PeriphConfig::Uart) => {
            Ok(mux(BIT1 | BIT2, 0, true))
        }
        (Peripheral::UsciA0, PeriphConfig::Spi3) => Ok(mux(BIT1 | BIT2 | BIT4, 0, true)),
        (Peripheral::UsciA0, PeriphConfig::Spi4) => Ok(mux(BIT1 | BIT2 | BIT4 | BIT5, 0, true)),
        (Peripheral::UsciB0, PeriphConfig::Default | PeriphConfig::I2c) => {
            Ok(mux(BIT6 | BIT7, 0, true))
        }
        (Peripheral::UsciB0, PeriphConfig::Spi3) => Ok(mux(BIT5 | BIT6 | BIT7, 0, true)),
        (Peripheral::UsciB0, PeriphConfig::Spi4) => Ok(mux(BIT4 | BIT5 | BIT6 | BIT7, 0, true)),
        _ => Err(PinError::Unsupported),
    }
}

/// Pin assignment text for the MSP430G2 LaunchPad
pub fn launchpad_help(periph: Peripheral, _config: PeriphConfig) -> Option<&'static str> {
    match periph {
        Peripheral::Lfxt1 => Some("XIN=P2.6, XOUT=P2.7"),
        Peripheral::ExposedClocks => Some("ACLK on P1.0; SMCLK on P1.4"),
        Peripheral::UsciA0 => Some("MOSI/TXD=P1.2; MISO/RXD=P1.1; CLK=P1.4; STE=P1.5"),
        Peripheral::UsciB0 => Some("MOSI/SDA=P1.7; MISO/SCL=P1.6; CLK=P1.5; STE=P1.4"),
    }
}

#[cfg(feature = "msp430g2553")]
mod launchpad {
    use super::*;
    use crate::pac;

    /// Pin routing for the MSP430G2 LaunchPad
    pub struct LaunchpadPins {
        port: pac::PORT_1_2,
    }

    impl LaunchpadPins {
        /// Take over ports 1 and 2
        pub fn new(port: pac::PORT_1_2) -> Self {
            LaunchpadPins { port }
        }

        /// Release ports 1 and 2
        pub fn free(self) -> pac::PORT_1_2 {
            self.port
        }
    }

    macro_rules! apply_mux {
        ($port:expr, $bits:expr, $sel2:expr, $enable:expr, $out:ident, $dir:ident, $sel:ident, $selb:ident) => {{
            let bits: u8 = $bits;
            if bits != 0 {
                let port = $port;
                if $enable {
                    port.$sel.modify(|r, w| unsafe { w.bits(r.bits() | bits) });
                    if $sel2 {
                        port.$selb.modify(|r, w| unsafe { w.bits(r.bits() | bits) });
                    } else {
                        port.$selb.modify(|r, w| unsafe { w.bits(r.bits() & !bits) });
                    }
                } else {
                    port.$out.modify(|r, w| unsafe { w.bits(r.bits() & !bits) });
                    port.$dir.modify(|r, w| unsafe { w.bits(r.bits() | bits) });
                    port.$sel.modify(|r, w| unsafe { w.bits(r.bits() & !bits) });
                    port.$selb.modify(|r, w| unsafe { w.bits(r.bits() & !bits) });
                }
            }
        }};
    }

    impl PeripheralPins for LaunchpadPins {
        #[allow(unused_unsafe)]
        fn configure_peripheral_pins(
            &mut self,
            _cs: CriticalSection<'_>,
            periph: Peripheral,
            config: PeriphConfig,
            enable: bool,
        ) -> Result<(), PinError> {
            let mux = launchpad_mux(periph, config)?;
            if periph == Peripheral::ExposedClocks && mux.p1 != 0 {
                // Clock outputs need the pins driven
                self.port
                    .p1dir
                    .modify(|r, w| unsafe { w.bits(r.bits() | mux.p1) });
            }
            apply_mux!(&self.port, mux.p1, mux.sel2, enable, p1out, p1dir, p1sel, p1sel2);
            apply_mux!(&self.port, mux.p2, mux.sel2, enable, p2out, p2dir, p2sel, p2sel2);
            Ok(())
        }

        fn peripheral_help(&self, periph: Peripheral, config: PeriphConfig) -> Option<&'static str> {
            launchpad_help(periph, config)
        }
    }
}

#[cfg(feature = "msp430g2553")]
pub use launchpad::LaunchpadPins;

/// What [`initialize`] should do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootConfig {
    /// Try to start the LFXT1 crystal
    pub configure_lfxt1: bool,
    /// How long to keep trying, in seconds at the power-up MCLK rate. Negative waits forever.
    pub lfxt1_delay_sec: i16,
    /// ACLK source
    pub aclk_source: ClockSource,
    /// ACLK divider as a right shift
    pub aclk_dividing_shift: u8,
    /// Target MCLK frequency. 0 keeps the power-up setting.
    pub mclk_hz: u32,
    /// SMCLK divider as a right shift
    pub smclk_dividing_shift: u8,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            configure_lfxt1: true,
            lfxt1_delay_sec: 1,
            aclk_source: ClockSource::Xt1ClkOrVloClk,
            aclk_dividing_shift: 0,
            mclk_hz: 8_000_000,
            smclk_dividing_shift: 1,
        }
    }
}

/// Outcome of [`initialize`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    /// Whether LFXT1 came up
    pub crystal_ok: bool,
    /// Resulting ACLK frequency
    pub aclk_hz: u32,
    /// Resulting SMCLK frequency
    pub smclk_hz: u32,
    /// Resulting MCLK frequency
    pub mclk_hz: u32,
}

impl BootConfig {
    /// Settle-and-check rounds that fit in `lfxt1_delay_sec`
    pub fn lfxt1_retry_budget(&self, puc_mclk_hz: u32, stabilization_cycles: u32) -> i16 {
        if self.lfxt1_delay_sec < 0 {
            return -1;
        }
        let cycles = self.lfxt1_delay_sec as u64 * puc_mclk_hz as u64;
        let rounds = cycles / stabilization_cycles.max(1) as u64;
        i16::try_from(rounds).unwrap_or(i16::MAX)
    }
}

/// Bring the clocks up as `config` says
pub fn initialize<B: Bc2, C: Cpu, P: PeripheralPins>(
    cs: CriticalSection<'_>,
    clk: &mut Bc2Clock<B>,
    cpu: &C,
    pins: &mut P,
    config: &BootConfig,
) -> Result<BootReport, ClockError> {
    let mut crystal_ok = false;
    if config.configure_lfxt1 {
        let caps = clk.caps();
        let budget = config.lfxt1_retry_budget(caps.puc_mclk_hz, caps.lfxt1_stabilization_cycles);
        crystal_ok = clk.configure_lfxt1(cs, cpu, pins, true, budget);
    }
    clk.configure_aclk(cs, config.aclk_source, config.aclk_dividing_shift)?;
    clk.configure_mclk(cs, cpu, config.mclk_hz);
    clk.configure_smclk(cs, ClockSource::DcoClk, config.smclk_dividing_shift);

    let report = BootReport {
        crystal_ok,
        aclk_hz: clk.aclk_hz(),
        smclk_hz: clk.smclk_hz(),
        mclk_hz: clk.mclk_hz(),
    };
    info!(
        "boot: crystal {=bool}, ACLK {=u32} Hz, SMCLK {=u32} Hz, MCLK {=u32} Hz",
        report.crystal_ok,
        report.aclk_hz,
        report.smclk_hz,
        report.mclk_hz
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{CalFreq, ClockCaps, DcoCalibration, VLOCLK_HZ, XT1CLK_HZ};
    use crate::hw_traits::bc2::LFXT1S_2;
    use crate::mock::{MockBc2, MockCpu, MockPins};

    fn caps() -> ClockCaps {
        ClockCaps::new().with_calibration(
            CalFreq::_8MHz,
            DcoCalibration {
                dcoctl: 0x92,
                bcsctl1: 0x8D,
            },
        )
    }

    #[test]
    fn default_boot_runs_crystal_then_clocks() {
        let bc2 = MockBc2::leaked();
        let cpu = MockCpu::new();
        let mut pins = MockPins::default();
        let mut clk = Bc2Clock::new(bc2, caps());
        let report = critical_section::with(|cs| {
            initialize(cs, &mut clk, &cpu, &mut pins, &BootConfig::default())
        });
        assert_eq!(
            report,
            Ok(BootReport {
                crystal_ok: true,
                aclk_hz: XT1CLK_HZ,
                smclk_hz: 4_000_000,
                mclk_hz: 8_000_000,
            })
        );
        assert_eq!(
            pins.calls,
            [(Peripheral::Lfxt1, PeriphConfig::Default, true)]
        );
    }

    #[test]
    fn boot_without_crystal_gives_up_after_delay() {
        let bc2 = MockBc2::leaked();
        bc2.crystal_ok.set(false);
        let cpu = MockCpu::new();
        let mut pins = MockPins::default();
        let mut clk = Bc2Clock::new(bc2, caps());
        let report = critical_section::with(|cs| {
            initialize(cs, &mut clk, &cpu, &mut pins, &BootConfig::default())
        })
        .unwrap();
        assert!(!report.crystal_ok);
        assert_eq!(report.aclk_hz, VLOCLK_HZ);
        // 1 s at 1.1 MHz in 20000 cycle rounds, plus one oscillator fault check
        assert_eq!(cpu.delays.get(), 55 + 1);
        assert_eq!(bc2.bcsctl3.get(), LFXT1S_2);
    }

    #[test]
    fn boot_reports_unsupported_aclk() {
        let mut clk = Bc2Clock::new(MockBc2::leaked(), caps());
        let config = BootConfig {
            configure_lfxt1: false,
            aclk_source: ClockSource::RefoClk,
            ..Default::default()
        };
        let rv = critical_section::with(|cs| {
            initialize(cs, &mut clk, &MockCpu::new(), &mut MockPins::default(), &config)
        });
        assert_eq!(rv, Err(ClockError::UnsupportedSource));
    }

    #[test]
    fn retry_budget_scales_with_delay() {
        let mut config = BootConfig::default();
        assert_eq!(config.lfxt1_retry_budget(1_100_000, 20_000), 55);
        config.lfxt1_delay_sec = 0;
        assert_eq!(config.lfxt1_retry_budget(1_100_000, 20_000), 0);
        config.lfxt1_delay_sec = -1;
        assert_eq!(config.lfxt1_retry_budget(1_100_000, 20_000), -1);
        config.lfxt1_delay_sec = 30_000;
        assert_eq!(config.lfxt1_retry_budget(16_000_000, 1), i16::MAX);
    }

    #[test]
    fn launchpad_routes_crystal_and_serial() {
        assert_eq!(
            launchpad_mux(Peripheral::Lfxt1, PeriphConfig::Default),
            Ok(PinMux {
                p1: 0,
                p2: 0xC0,
                sel2: false
            })
        );
        assert_eq!(
            launchpad_mux(Peripheral::UsciA0, PeriphConfig::Uart),
            Ok(PinMux {
                p1: 0x06,
                p2: 0,
                sel2: true
            })
        );
        assert_eq!(
            launchpad_mux(Peripheral::UsciB0, PeriphConfig::Spi4).map(|m| m.p1),
            Ok(0xF0)
        );
        assert_eq!(
            launchpad_mux(Peripheral::UsciA0, PeriphConfig::I2c),
            Err(PinError::Unsupported)
        );
        assert_eq!(
            launchpad_help(Peripheral::Lfxt1, PeriphConfig::Default),
            Some("XIN=P2.6, XOUT=P2.7")
        );
    }
}
