//! Display bring-up on esp-hal.
//
// - Configures SPI2 as a blocking master with a hardware-managed CS device.
// - Runs the synchronous ILI9341 init over that device.
// - Hands the device and the D/C arbiter over to the queued transport.

use core::convert::Infallible;
use core::fmt;

use embedded_hal_bus::spi::{DeviceError, ExclusiveDevice, NoDelay};
use esp_hal::delay::Delay;
use esp_hal::gpio::Output;
use esp_hal::spi::master::{Config, ConfigError, Spi};
use esp_hal::spi::Mode;
use esp_hal::time::Rate;
use esp_hal::Blocking;

use crate::arbiter::ControlLine;
use crate::error::InitError;
use crate::init;
use crate::wiring::DisplayPins;

/// SPI clock for the panel. 40 MHz, mode 0 is stable with short wires.
pub const SPI_FREQUENCY_HZ: u32 = 40_000_000;

// This matches wiring: Spi<'a, Blocking> + CS pin + NoDelay
pub type SpiDev<'a> = ExclusiveDevice<Spi<'a, Blocking>, Output<'a>, NoDelay>;

/// D/C line installed as the transport's pre-transfer hook.
pub type DcLine<'a> = ControlLine<Output<'a>>;

pub type PanelInitError = InitError<DeviceError<esp_hal::spi::Error, Infallible>, Infallible>;

#[derive(Debug)]
pub enum SetupError {
    Spi(ConfigError),
    Init(PanelInitError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Spi(e) => write!(f, "spi config rejected: {:?}", e),
            SetupError::Init(e) => write!(f, "panel init failed: {}", e),
        }
    }
}

/// Initialized panel. Reset and backlight are kept so their levels hold.
pub struct Panel<'a> {
    pub spi: SpiDev<'a>,
    pub dc: DcLine<'a>,
    pub rst: Output<'a>,
    pub bl: Output<'a>,
}

pub fn setup_display<'a>(pins: DisplayPins<'a>) -> Result<Panel<'a>, SetupError> {
    let DisplayPins {
        spi2,
        sck,
        mosi,
        miso,
        cs,
        mut dc,
        mut rst,
        mut bl,
    } = pins;

    let spi = Spi::new(
        spi2,
        Config::default()
            .with_frequency(Rate::from_hz(SPI_FREQUENCY_HZ))
            .with_mode(Mode::_0),
    )
    .map_err(SetupError::Spi)?
    .with_sck(sck)
    .with_mosi(mosi)
    .with_miso(miso);

    // Output CS cannot fail
    let Ok(mut spi_dev) = ExclusiveDevice::new(spi, cs, NoDelay);

    let mut delay = Delay::new();
    init::init_panel(&mut spi_dev, &mut dc, &mut rst, &mut bl, &mut delay)
        .map_err(SetupError::Init)?;

    Ok(Panel {
        spi: spi_dev,
        dc: ControlLine::new(dc),
        rst,
        bl,
    })
}
