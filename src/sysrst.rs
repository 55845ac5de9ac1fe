//! Reset cause decoding
//!
//! Devices with a SYSRSTIV register queue up every reason the device was reset. Each read
//! returns the highest priority pending cause and clears it, and 0 means none are left.
//! [`ResetCauses`] drains the register and looks each value up in the device family's table.
//!
//! ```ignore
//! let sys = periph.SYS;
//! for cause in ResetCauses::new(&sys, FR2XX_TABLE) {
//!     defmt::info!("reset: {} ({=bool})", cause.describe(), cause.brownout);
//! }
//! ```

use crate::ResetVectorReg;

/// One SYSRSTIV value and its meaning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetVector {
    /// Register value
    pub iv: u16,
    /// What happened, or `"?"` without the `reset-descriptions` feature
    pub description: &'static str,
    /// Whether this cause wipes the device like a power cycle
    pub severe: bool,
}

/// Reset vectors of one device family
pub type ResetTable = &'static [ResetVector];

macro_rules! reset_table {
    ($name:ident, $doc:literal, [$(($iv:literal, $desc:literal, $severe:literal)),* $(,)?]) => {
        #[doc = $doc]
        pub static $name: ResetTable = &[
            $(ResetVector {
                iv: $iv,
                description: if cfg!(feature = "reset-descriptions") { $desc } else { "?" },
                severe: $severe,
            },)*
        ];
    };
}

reset_table!(F5XX_TABLE, "MSP430F5xx/F6xx SYSRSTIV values", [
    (0x02, "BOR", true),
    (0x04, "RST/NMI", true),
    (0x06, "Do BOR", true),
    (0x08, "Port LPM5 Wake Up", true),
    (0x0A, "Security violation", true),
    (0x0C, "SVSL", false),
    (0x0E, "SVSH", false),
    (0x10, "SVML_OVP", false),
    (0x12, "SVMH_OVP", false),
    (0x14, "Do POR", false),
    (0x16, "WDT Time out", false),
    (0x18, "WDTKEY violation", false),
    (0x1A, "Flash Key violation", false),
    (0x1C, "PLL unlock", false),
    (0x1E, "peripheral/config area fetch", false),
    (0x20, "PMMKEY violation", false),
]);

reset_table!(FR2XX_TABLE, "MSP430FR2xx/FR4xx SYSRSTIV values", [
    (0x02, "BOR", true),
    (0x04, "RST/NMI", true),
    (0x06, "Do BOR", true),
    (0x08, "Port LPM5 Wake Up", true),
    (0x0A, "Security violation", true),
    (0x0E, "SVSHIFG", false),
    (0x14, "Do POR", false),
    (0x16, "WDT Time out", false),
    (0x18, "WDT Password violation", false),
    (0x1A, "FRAM Key violation", false),
    (0x1C, "FRAM Uncorrectable bit Error", false),
    (0x1E, "peripheral/config area fetch", false),
    (0x20, "PMM Password violation", false),
    (0x24, "FLL unlock", false),
]);

/// One decoded reset cause
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetCause {
    /// Raw SYSRSTIV value
    pub vector: u16,
    /// Whether the cause is brownout class
    pub brownout: bool,
    table: ResetTable,
}

impl ResetCause {
    /// Text for this cause, see [`describe`]
    #[inline]
    pub fn describe(&self) -> &'static str {
        describe(self.table, self.vector)
    }
}

/// Text for `vector`, or `"?"` if the table doesn't know it. Without the `reset-descriptions`
/// feature every vector is `"?"`.
pub fn describe(table: ResetTable, vector: u16) -> &'static str {
    lookup(table, vector).map_or("?", |v| v.description)
}

#[inline]
fn lookup(table: ResetTable, vector: u16) -> Option<&'static ResetVector> {
    table.iter().find(|v| v.iv == vector)
}

/// Pending reset causes, highest priority first. Reading a cause clears it.
pub struct ResetCauses<R: ResetVectorReg> {
    reg: R,
    table: ResetTable,
    done: bool,
}

impl<R: ResetVectorReg> ResetCauses<R> {
    /// Decode `reg` with `table`
    pub fn new(reg: R, table: ResetTable) -> Self {
        ResetCauses {
            reg,
            table,
            done: false,
        }
    }

    /// Release the register
    pub fn free(self) -> R {
        self.reg
    }
}

impl<R: ResetVectorReg> Iterator for ResetCauses<R> {
    type Item = ResetCause;

    /// Read and clear the next cause. `None` once the register reads 0, and from then on.
    fn next(&mut self) -> Option<ResetCause> {
        if self.done {
            return None;
        }
        let vector = self.reg.sysrstiv_rd();
        if vector == 0 {
            self.done = true;
            return None;
        }
        let brownout = lookup(self.table, vector).is_some_and(|v| v.severe);
        Some(ResetCause {
            vector,
            brownout,
            table: self.table,
        })
    }
}

impl<R: ResetVectorReg> core::iter::FusedIterator for ResetCauses<R> {}
