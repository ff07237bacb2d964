//! ILI9341 queued drawing demo
//! ========================================
//! Pro core: builds frames and queues draws.
//! App core: clocks queued transactions out and reaps completions.
//! ========================================
//!
//! Fills the panel with colour bands and bounces a checkerboard sprite
//! across it.

//% CHIPS: esp32
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Define the application description, which is placed in a special section of the binary.
// This is used by the bootloader to verify the application.
// The macro automatically fills in the fields.
esp_bootloader_esp_idf::esp_app_desc!();

use core::ptr::addr_of_mut;

use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    main,
    system::{CpuControl, Stack},
    Config,
};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::RgbColor;
use embedded_hal::delay::DelayNs;

use ili9341_queued::{
    display::{setup_display, DcLine, Panel, SpiDev},
    init::{ILI9341_HEIGHT, ILI9341_WIDTH},
    pipeline::{draw_region, fill_region, wire_color, PixelBuffer, Region},
    queue::QueuedBus,
    reaper::Reaper,
    wiring::{init_board_pins, BoardPins},
};

extern crate alloc;

// 16 slots: a full band draw (5 control + 5 chunks) plus a sprite in flight
static BUS: QueuedBus<16> = QueuedBus::new();

static mut APP_CORE_STACK: Stack<8192> = Stack::new();

const BAND_HEIGHT: u16 = 16;
const SPRITE: usize = 32;

static CHECKER: [u16; SPRITE * SPRITE] = checker();

const fn checker() -> [u16; SPRITE * SPRITE] {
    let mut px = [0u16; SPRITE * SPRITE];
    let mut i = 0;
    while i < px.len() {
        let (x, y) = (i % SPRITE, i / SPRITE);
        // black and white read the same in either byte order
        px[i] = if (x / 8 + y / 8) % 2 == 0 { 0xFFFF } else { 0x0000 };
        i += 1;
    }
    px
}

// Transport + reaper, never returns
fn app_core_loop(mut spi: SpiDev<'static>, mut dc: DcLine<'static>) -> ! {
    let mut reaper = Reaper::new();
    loop {
        let sent = BUS
            .service(&mut spi, &mut dc)
            .unwrap_or_else(|e| panic!("transport dispatch failed: {}", e));
        let reaped = reaper.poll(&BUS).unwrap_or_else(|e| panic!("{}", e));
        if !sent && reaped.is_none() {
            core::hint::spin_loop();
        }
    }
}

#[main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    // Initialize peripherals
    let peripherals = esp_hal::init(Config::default());

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let BoardPins { display_pins, cpu_ctrl } = init_board_pins(peripherals);

    let Panel { spi, dc, rst: _rst, bl: _bl } =
        setup_display(display_pins).unwrap_or_else(|e| panic!("display setup: {}", e));

    let mut cpu_control = CpuControl::new(cpu_ctrl);
    let _app_core = cpu_control
        .start_app_core(unsafe { &mut *addr_of_mut!(APP_CORE_STACK) }, move || {
            app_core_loop(spi, dc);
        })
        .unwrap_or_else(|e| panic!("app core start: {:?}", e));

    let colors = [
        Rgb565::RED,
        Rgb565::GREEN,
        Rgb565::BLUE,
        Rgb565::YELLOW,
        Rgb565::CYAN,
        Rgb565::MAGENTA,
    ];
    let mut delay = Delay::new();
    let (mut sx, mut sy) = (0i32, 0i32);
    let (mut dx, mut dy) = (3i32, 2i32);
    let mut frame: u32 = 0;

    // Main loop: one full-screen fill in bands, then a sprite, per frame
    loop {
        for band in 0..ILI9341_HEIGHT / BAND_HEIGHT {
            let color = colors[(band as usize + frame as usize) % colors.len()];
            let region = Region::new(0, band * BAND_HEIGHT, ILI9341_WIDTH, BAND_HEIGHT);
            fill_region(&BUS, region, wire_color(color))
                .unwrap_or_else(|e| panic!("band draw: {}", e));
        }

        let max_x = (ILI9341_WIDTH as usize - SPRITE) as i32;
        let max_y = (ILI9341_HEIGHT as usize - SPRITE) as i32;
        sx += dx;
        sy += dy;
        if sx <= 0 || sx >= max_x {
            dx = -dx;
            sx = sx.clamp(0, max_x);
        }
        if sy <= 0 || sy >= max_y {
            dy = -dy;
            sy = sy.clamp(0, max_y);
        }

        let sprite = Region::new(sx as u16, sy as u16, SPRITE as u16, SPRITE as u16);
        draw_region(&BUS, sprite, PixelBuffer::Retained(&CHECKER))
            .unwrap_or_else(|e| panic!("sprite draw: {}", e));

        frame = frame.wrapping_add(1);
        if frame % 100 == 0 {
            log::info!("frame {}, {} transactions outstanding", frame, BUS.outstanding());
        }

        delay.delay_ms(20);
    }
}
