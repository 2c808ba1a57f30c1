//! Scripted collaborators for host tests.

extern crate std;

use core::future::Future;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use mowbot_proto::ConnectTarget;

use crate::alert::{Alert, AlertSink};
use crate::error::TransportFault;
use crate::sampler::{InputError, RawStick, StickSource};
use crate::transport::{PayloadKind, Received, Transport};

/// Transport whose results are scripted up front.
///
/// `connect` pops `connects` (empty means success). `receive` pops `inbound`
/// and never resolves once the script is exhausted.
#[derive(Default)]
pub struct MockTransport {
    pub connects: VecDeque<Result<(), TransportFault>>,
    pub inbound: VecDeque<Result<(PayloadKind, Vec<u8>), TransportFault>>,
    pub send_error: Option<TransportFault>,
    pub sent: Vec<String>,
    pub connect_calls: usize,
    pub closes: usize,
}

impl MockTransport {
    pub fn push_text(&mut self, text: &str) {
        self.inbound
            .push_back(Ok((PayloadKind::Text, text.as_bytes().to_vec())));
    }

    pub fn push_binary(&mut self, data: &[u8]) {
        self.inbound.push_back(Ok((PayloadKind::Binary, data.to_vec())));
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _target: &ConnectTarget<'_>,
    ) -> impl Future<Output = Result<(), TransportFault>> {
        self.connect_calls += 1;
        core::future::ready(self.connects.pop_front().unwrap_or(Ok(())))
    }

    fn send_text(&mut self, text: &str) -> impl Future<Output = Result<(), TransportFault>> {
        let result = match self.send_error {
            Some(fault) => Err(fault),
            None => {
                self.sent.push(String::from(text));
                Ok(())
            }
        };
        core::future::ready(result)
    }

    fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<Received, TransportFault>> {
        let next = self.inbound.pop_front();
        async move {
            match next {
                Some(Ok((kind, data))) => {
                    if data.len() > buf.len() {
                        return match kind {
                            PayloadKind::Binary => Ok(Received {
                                kind: PayloadKind::Oversized,
                                len: data.len(),
                            }),
                            _ => Err(TransportFault::Protocol(
                                mowbot_proto::FrameError::TooLarge,
                            )),
                        };
                    }
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(Received {
                        kind,
                        len: data.len(),
                    })
                }
                Some(Err(fault)) => Err(fault),
                None => core::future::pending().await,
            }
        }
    }

    fn close(&mut self) -> impl Future<Output = ()> {
        self.closes += 1;
        core::future::ready(())
    }
}

/// Alert sink that remembers everything.
#[derive(Default)]
pub struct RecordingAlerts {
    pub raised: Vec<Alert>,
    pub clears: usize,
}

impl AlertSink for RecordingAlerts {
    fn raise(&mut self, alert: &Alert) -> impl Future<Output = ()> {
        self.raised.push(alert.clone());
        core::future::ready(())
    }

    fn clear(&mut self) -> impl Future<Output = ()> {
        self.clears += 1;
        core::future::ready(())
    }
}

/// Stick that replays readings, then rests centred.
#[derive(Default)]
pub struct ScriptedStick {
    pub readings: VecDeque<Result<RawStick, InputError>>,
}

/// Centred stick, button released.
pub const CENTRED: RawStick = RawStick {
    x: 32768,
    y: 32768,
    button: false,
};

impl StickSource for ScriptedStick {
    fn read(&mut self) -> impl Future<Output = Result<RawStick, InputError>> {
        core::future::ready(self.readings.pop_front().unwrap_or(Ok(CENTRED)))
    }
}
