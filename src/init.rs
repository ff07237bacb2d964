// ILI9341 power-up over a plain blocking SPI device.
//
// The panel has a D/C pin: low while a command byte is clocked, high for
// arguments. Init runs before the queued transport takes over the bus, so it
// drives D/C directly and waits for each write to finish.
//
// Init table layout (one entry per command):
//   cmd        command byte
//   data       up to 16 argument bytes
//   databytes  argument count in bits 0..4
//              bit 7 set  -> wait 100 ms after the command
//              0xFF       -> end of table

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::error::InitError;

pub const ILI9341_WIDTH: u16 = 320;
pub const ILI9341_HEIGHT: u16 = 240;

pub const DATABYTES_LEN_MASK: u8 = 0x1F;
pub const DATABYTES_DELAY: u8 = 0x80;
pub const END_OF_TABLE: u8 = 0xFF;

const POST_COMMAND_DELAY_MS: u32 = 100;
const RESET_PULSE_MS: u32 = 100;

/// One command/argument entry of an init table.
#[derive(Copy, Clone, Debug)]
pub struct InitCmd {
    pub cmd: u8,
    pub data: [u8; 16],
    pub databytes: u8,
}

impl InitCmd {
    const fn new(cmd: u8, args: &[u8], databytes: u8) -> Self {
        let mut data = [0u8; 16];
        let mut i = 0;
        while i < args.len() {
            data[i] = args[i];
            i += 1;
        }
        Self { cmd, data, databytes }
    }

    #[inline]
    pub const fn is_end(&self) -> bool {
        self.databytes == END_OF_TABLE
    }

    #[inline]
    pub fn args(&self) -> &[u8] {
        &self.data[..(self.databytes & DATABYTES_LEN_MASK) as usize]
    }

    #[inline]
    pub const fn wants_delay(&self) -> bool {
        self.databytes & DATABYTES_DELAY != 0
    }
}

/// Power control, gamma and a landscape 320x240 RGB565 window, then sleep out
/// and display on.
pub static ILI9341_INIT: [InitCmd; 25] = [
    InitCmd::new(0xCF, &[0x00, 0x83, 0x30], 3),
    InitCmd::new(0xED, &[0x64, 0x03, 0x12, 0x81], 4),
    InitCmd::new(0xE8, &[0x85, 0x01, 0x79], 3),
    InitCmd::new(0xCB, &[0x39, 0x2C, 0x00, 0x34, 0x02], 5),
    InitCmd::new(0xF7, &[0x20], 1),
    InitCmd::new(0xEA, &[0x00, 0x00], 2),
    InitCmd::new(0xC0, &[0x26], 1),       // power control 1
    InitCmd::new(0xC1, &[0x11], 1),       // power control 2
    InitCmd::new(0xC5, &[0x35, 0x3E], 2), // VCOM control 1
    InitCmd::new(0xC7, &[0xBE], 1),       // VCOM control 2
    InitCmd::new(0x36, &[0xE8], 1),       // MADCTL: landscape, BGR
    InitCmd::new(0x3A, &[0x55], 1),       // 16 bpp
    InitCmd::new(0xB1, &[0x00, 0x1B], 2), // frame rate
    InitCmd::new(0xF2, &[0x08], 1),
    InitCmd::new(0x26, &[0x01], 1),       // gamma curve
    InitCmd::new(
        0xE0,
        &[0x1F, 0x1A, 0x18, 0x0A, 0x0F, 0x06, 0x45, 0x87, 0x32, 0x0A, 0x07, 0x02, 0x07, 0x05, 0x00],
        15,
    ),
    InitCmd::new(
        0xE1,
        &[0x00, 0x25, 0x27, 0x05, 0x10, 0x09, 0x3A, 0x78, 0x4D, 0x05, 0x18, 0x0D, 0x38, 0x3A, 0x1F],
        15,
    ),
    InitCmd::new(0x2A, &[0x00, 0x00, 0x00, 0xEF], 4),
    InitCmd::new(0x2B, &[0x00, 0x00, 0x01, 0x3F], 4),
    InitCmd::new(0x2C, &[], 0),
    InitCmd::new(0xB7, &[0x07], 1),
    InitCmd::new(0xB6, &[0x0A, 0x82, 0x27, 0x00], 4),
    InitCmd::new(0x11, &[], DATABYTES_DELAY), // sleep out
    InitCmd::new(0x29, &[], DATABYTES_DELAY), // display on
    InitCmd::new(0x00, &[], END_OF_TABLE),
];

/// Send one command byte with D/C low. Blocks until it is on the wire.
pub fn send_command<SPI, DC>(
    spi: &mut SPI,
    dc: &mut DC,
    cmd: u8,
) -> Result<(), InitError<SPI::Error, DC::Error>>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    dc.set_low().map_err(InitError::Gpio)?;
    spi.write(&[cmd]).map_err(InitError::Spi)
}

/// Send argument bytes with D/C high. Nothing is sent for an empty slice.
pub fn send_data<SPI, DC>(
    spi: &mut SPI,
    dc: &mut DC,
    data: &[u8],
) -> Result<(), InitError<SPI::Error, DC::Error>>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    if data.is_empty() {
        return Ok(());
    }
    dc.set_high().map_err(InitError::Gpio)?;
    spi.write(data).map_err(InitError::Spi)
}

/// Play `table` up to its end marker. Returns how many commands were sent.
pub fn run_init_table<SPI, DC>(
    spi: &mut SPI,
    dc: &mut DC,
    delay: &mut impl DelayNs,
    table: &[InitCmd],
) -> Result<usize, InitError<SPI::Error, DC::Error>>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    let mut sent = 0;
    for entry in table.iter().take_while(|e| !e.is_end()) {
        send_command(spi, dc, entry.cmd)?;
        send_data(spi, dc, entry.args())?;
        if entry.wants_delay() {
            delay.delay_ms(POST_COMMAND_DELAY_MS);
        }
        sent += 1;
    }
    Ok(sent)
}

/// Hard reset, run [`ILI9341_INIT`] and switch the (active low) backlight on.
pub fn init_panel<SPI, DC, RST, BL>(
    spi: &mut SPI,
    dc: &mut DC,
    rst: &mut RST,
    bl: &mut BL,
    delay: &mut impl DelayNs,
) -> Result<(), InitError<SPI::Error, DC::Error>>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
    RST: OutputPin<Error = DC::Error>,
    BL: OutputPin<Error = DC::Error>,
{
    rst.set_low().map_err(InitError::Gpio)?;
    delay.delay_ms(RESET_PULSE_MS);
    rst.set_high().map_err(InitError::Gpio)?;
    delay.delay_ms(RESET_PULSE_MS);

    let sent = run_init_table(spi, dc, delay, &ILI9341_INIT)?;
    log::info!("ili9341: {} init commands sent", sent);

    bl.set_low().map_err(InitError::Gpio)
}
