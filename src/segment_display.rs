//! Bit-banged driver for the TM1637 4 digit seven segment modules.
//!
//! The TM1637 bus looks like I2C but is not: no address, LSB first, and the chip acks every byte
//! by pulling DIO low on the ninth clock. Both lines must therefore be open drain (the modules
//! carry their own pull-ups). The ack is not checked.

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::OutputPin;

pub const DIGITS: usize = 4;

/// Largest value that fits on the display
pub const MAX_DISPLAY_VALUE: u16 = 9999;

/// Brightness used at start-up, 0..=7
pub const DEFAULT_BRIGHTNESS: u8 = 7;

/// Half clock period. The chip is specified up to 250kHz, this stays well below.
const BIT_DELAY_US: u32 = 5;

const CMD_DATA_AUTO_INCREMENT: u8 = 0x40;
const CMD_ADDRESS_FIRST_DIGIT: u8 = 0xC0;
const CMD_DISPLAY_ON: u8 = 0x88;
const CMD_DISPLAY_OFF: u8 = 0x80;

/// segments a..g for 0-9
const DIGIT_SEGMENTS: [u8; 10] = [0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f];

pub const SEGMENTS_BLANK: u8 = 0x00;
pub const SEGMENTS_DASH: u8 = 0x40;

/// Segment pattern for a single decimal digit, values above 9 show as a dash
pub fn digit_segments(digit: u8) -> u8 {
    DIGIT_SEGMENTS.get(digit as usize).copied().unwrap_or(SEGMENTS_DASH)
}

/// Segments for an rpm reading: truncated to an integer, clamped to 0..=9999, leading zeros shown.
/// NaN reads as zero.
pub fn encode_rpm(rpm: f32) -> [u8; DIGITS] {
    // `as` saturates and maps NaN to 0
    let value = (rpm as u16).min(MAX_DISPLAY_VALUE);
    encode_number(value)
}

pub fn encode_number(value: u16) -> [u8; DIGITS] {
    let value = value.min(MAX_DISPLAY_VALUE);
    let mut segments = [SEGMENTS_BLANK; DIGITS];
    let mut rest = value;
    for slot in segments.iter_mut().rev() {
        *slot = digit_segments((rest % 10) as u8);
        rest /= 10;
    }
    segments
}

pub struct Tm1637<CLK, DIO, D> {
    clk: CLK,
    dio: DIO,
    delay: D,
    brightness: u8,
}

impl<CLK, DIO, D, E> Tm1637<CLK, DIO, D>
where
    CLK: OutputPin<Error = E>,
    DIO: OutputPin<Error = E>,
    D: DelayNs,
{
    pub fn new(clk: CLK, dio: DIO, delay: D) -> Self {
        Self {
            clk,
            dio,
            delay,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    /// 0..=7, larger values are clamped. Takes effect with the next write.
    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness.min(7);
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Clear all digits and switch the display on
    pub fn init(&mut self) -> Result<(), E> {
        self.clk.set_high()?;
        self.dio.set_high()?;
        self.write_segments(&[SEGMENTS_BLANK; DIGITS])
    }

    pub fn show_rpm(&mut self, rpm: f32) -> Result<(), E> {
        self.write_segments(&encode_rpm(rpm))
    }

    pub fn write_segments(&mut self, segments: &[u8; DIGITS]) -> Result<(), E> {
        self.start()?;
        self.write_byte(CMD_DATA_AUTO_INCREMENT)?;
        self.stop()?;

        self.start()?;
        self.write_byte(CMD_ADDRESS_FIRST_DIGIT)?;
        for &segment in segments {
            self.write_byte(segment)?;
        }
        self.stop()?;

        self.start()?;
        self.write_byte(CMD_DISPLAY_ON | self.brightness)?;
        self.stop()
    }

    pub fn display_off(&mut self) -> Result<(), E> {
        self.start()?;
        self.write_byte(CMD_DISPLAY_OFF)?;
        self.stop()
    }

    pub fn release(self) -> (CLK, DIO, D) {
        (self.clk, self.dio, self.delay)
    }

    fn start(&mut self) -> Result<(), E> {
        self.dio.set_high()?;
        self.clk.set_high()?;
        self.delay.delay_us(BIT_DELAY_US);
        self.dio.set_low()?;
        self.delay.delay_us(BIT_DELAY_US);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), E> {
        self.clk.set_low()?;
        self.dio.set_low()?;
        self.delay.delay_us(BIT_DELAY_US);
        self.clk.set_high()?;
        self.delay.delay_us(BIT_DELAY_US);
        self.dio.set_high()?;
        self.delay.delay_us(BIT_DELAY_US);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), E> {
        for bit in 0..8 {
            self.clk.set_low()?;
            if byte & (1 << bit) != 0 {
                self.dio.set_high()?;
            } else {
                self.dio.set_low()?;
            }
            self.delay.delay_us(BIT_DELAY_US);
            self.clk.set_high()?;
            self.delay.delay_us(BIT_DELAY_US);
        }

        // ack clock, DIO released so the chip can pull it down
        self.clk.set_low()?;
        self.dio.set_high()?;
        self.delay.delay_us(BIT_DELAY_US);
        self.clk.set_high()?;
        self.delay.delay_us(BIT_DELAY_US);
        self.clk.set_low()?;
        Ok(())
    }
}
