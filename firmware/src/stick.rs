//! Analog stick on the RP2040 ADC.

use embassy_rp::adc::{self, Adc, Async, Channel};
use embassy_rp::gpio::Input;
use mowbot_core::{InputError, RawStick, StickSource};

/// Two ADC channels and an active-low push button.
///
/// Readings are widened from the 12-bit converter to the 16-bit scale the
/// sampler expects, so a centred stick reads close to 32768.
pub struct AdcStick<'d> {
    adc: Adc<'d, Async>,
    x: Channel<'d>,
    y: Channel<'d>,
    button: Input<'d>,
}

impl<'d> AdcStick<'d> {
    pub fn new(adc: Adc<'d, Async>, x: Channel<'d>, y: Channel<'d>, button: Input<'d>) -> Self {
        Self { adc, x, y, button }
    }

    async fn read_axis(adc: &mut Adc<'d, Async>, ch: &mut Channel<'d>) -> Result<u16, InputError> {
        adc.read(ch)
            .await
            .map(widen)
            .map_err(|_: adc::Error| InputError::Adc)
    }
}

/// 12-bit sample to 16-bit scale, full scale maps to 0xFFFF.
#[inline]
const fn widen(v: u16) -> u16 {
    let v = v & 0x0FFF;
    (v << 4) | (v >> 8)
}

impl StickSource for AdcStick<'_> {
    async fn read(&mut self) -> Result<RawStick, InputError> {
        let x = Self::read_axis(&mut self.adc, &mut self.x).await?;
        let y = Self::read_axis(&mut self.adc, &mut self.y).await?;
        Ok(RawStick {
            x,
            y,
            button: self.button.is_low(),
        })
    }
}
