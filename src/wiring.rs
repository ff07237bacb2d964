// Board pin mapping for the ILI9341 panel.
// Profiles are selected via Cargo features; `esp32` is the reference board.
//! The following wiring is assumed (esp32 profile):
//! - MISO => GPIO25
//! - MOSI => GPIO23
//! - CLK  => GPIO19
//! - CS   => GPIO22
//! - D/C  => GPIO21
//! - RST  => GPIO18
//! - BCKL => GPIO5 (active low)

use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{Peripherals, CPU_CTRL, GPIO19, GPIO23, GPIO25, SPI2};

/// Everything the display needs: the SPI peripheral, its bus pins and the
/// GPIO outputs for CS, D/C, reset and backlight.
pub struct DisplayPins<'a> {
    pub spi2: SPI2<'a>,
    pub sck: GPIO19<'a>,
    pub mosi: GPIO23<'a>,
    pub miso: GPIO25<'a>,
    pub cs: Output<'a>,
    pub dc: Output<'a>,
    pub rst: Output<'a>,
    pub bl: Output<'a>,
}

pub struct BoardPins<'a> {
    pub display_pins: DisplayPins<'a>,
    // app core runs the transport and the reaper
    pub cpu_ctrl: CPU_CTRL<'a>,
}

// Default profile
#[cfg(feature = "esp32")]
pub fn init_board_pins(p: Peripherals) -> BoardPins<'static> {
    // CS idles high, D/C starts at command level, backlight stays off until init is done
    let cs = Output::new(p.GPIO22, Level::High, OutputConfig::default());
    let dc = Output::new(p.GPIO21, Level::Low, OutputConfig::default());
    let rst = Output::new(p.GPIO18, Level::High, OutputConfig::default());
    let bl = Output::new(p.GPIO5, Level::High, OutputConfig::default());

    BoardPins {
        display_pins: DisplayPins {
            spi2: p.SPI2,
            sck: p.GPIO19,
            mosi: p.GPIO23,
            miso: p.GPIO25,
            cs,
            dc,
            rst,
            bl,
        },
        cpu_ctrl: p.CPU_CTRL,
    }
}
