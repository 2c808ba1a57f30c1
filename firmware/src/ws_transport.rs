//! WebSocket client transport over an embassy-net TCP socket.

use defmt::{debug, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, IpEndpoint, Ipv4Address, Stack};
use embassy_time::{with_timeout, Duration, Instant};
use mowbot_core::{PayloadKind, Received, Transport, TransportFault};
use mowbot_proto::{
    check_upgrade_response, decode_frame_with_capacity, decode_header, encode_frame,
    write_upgrade_request, ConnectTarget, FrameError, Opcode, MAX_CONTROL_PAYLOAD,
    MAX_HEADER_LEN,
};

/// Bound on name resolution, TCP connect and the upgrade exchange together.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound scratch space, large enough for the upgrade request.
const TX_LEN: usize = 384;

const PONG_LEN: usize = MAX_HEADER_LEN + MAX_CONTROL_PAYLOAD;

/// One reusable socket speaking RFC 6455 as a client.
///
/// Inbound bytes accumulate in `rx` until a complete frame is present, so
/// dropping a pending [`receive`](Transport::receive) loses nothing. A
/// camera image that does not fit is skipped as it arrives. A pong
/// owed to the robot is written incrementally and its progress survives
/// cancellation too.
pub struct WsTransport {
    stack: Stack<'static>,
    socket: TcpSocket<'static>,
    rx: &'static mut [u8],
    filled: usize,
    /// Bytes of an oversized frame still to be read and dropped.
    skip: usize,
    tx: [u8; TX_LEN],
    pong: heapless::Vec<u8, PONG_LEN>,
    pong_sent: usize,
    rng: u32,
}

impl WsTransport {
    /// `rx` bounds the largest image that is delivered; larger ones are skipped.
    pub fn new(stack: Stack<'static>, socket: TcpSocket<'static>, rx: &'static mut [u8]) -> Self {
        Self {
            stack,
            socket,
            rx,
            filled: 0,
            skip: 0,
            tx: [0; TX_LEN],
            pong: heapless::Vec::new(),
            pong_sent: 0,
            rng: 0,
        }
    }

    /// xorshift32; masking keys and nonces need not be cryptographic.
    fn next_u32(&mut self) -> u32 {
        if self.rng == 0 {
            self.rng = (Instant::now().as_ticks() as u32) | 1;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }

    fn mask(&mut self) -> [u8; 4] {
        self.next_u32().to_le_bytes()
    }

    fn consume(&mut self, n: usize) {
        self.rx.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, TransportFault> {
        if let Ok(addr) = host.parse::<Ipv4Address>() {
            return Ok(IpAddress::Ipv4(addr));
        }
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("dns lookup for {} failed: {:?}", host, e);
                TransportFault::Connect
            })?;
        addrs.first().copied().ok_or(TransportFault::Connect)
    }

    async fn open(&mut self, target: &ConnectTarget<'_>) -> Result<(), TransportFault> {
        let addr = self.resolve(target.host).await?;
        self.socket
            .connect(IpEndpoint::new(addr, target.port))
            .await
            .map_err(|e| {
                warn!("tcp connect failed: {:?}", e);
                TransportFault::Connect
            })?;

        let mut key = [0u8; 16];
        for chunk in key.chunks_mut(4) {
            chunk.copy_from_slice(&self.next_u32().to_le_bytes());
        }
        let len = write_upgrade_request(target, &key, &mut self.tx)?;
        write_all(&mut self.socket, &self.tx[..len]).await?;

        loop {
            if self.filled == self.rx.len() {
                return Err(TransportFault::HandshakeMalformed);
            }
            let n = self
                .socket
                .read(&mut self.rx[self.filled..])
                .await
                .map_err(|_| TransportFault::Read)?;
            if n == 0 {
                return Err(TransportFault::Closed);
            }
            self.filled += n;
            if let Some(end) = check_upgrade_response(&self.rx[..self.filled])? {
                // anything after the headers is already frame data
                self.consume(end);
                return Ok(());
            }
        }
    }

    /// Continue writing the owed pong, if any.
    async fn drain_pong(&mut self) -> Result<(), TransportFault> {
        while self.pong_sent < self.pong.len() {
            let n = self
                .socket
                .write(&self.pong[self.pong_sent..])
                .await
                .map_err(|_| TransportFault::Write)?;
            if n == 0 {
                return Err(TransportFault::Closed);
            }
            self.pong_sent += n;
        }
        self.pong.clear();
        self.pong_sent = 0;
        Ok(())
    }

    fn queue_pong(&mut self, ping: core::ops::Range<usize>) -> Result<(), TransportFault> {
        if !self.pong.is_empty() {
            // the earlier pong still answers the robot
            return Ok(());
        }
        let mask = self.mask();
        let mut frame = [0u8; PONG_LEN];
        let len = encode_frame(Opcode::Pong, &self.rx[ping], mask, &mut frame)?;
        self.pong
            .extend_from_slice(&frame[..len])
            .map_err(|_| TransportFault::Protocol(FrameError::BufferTooSmall))
    }

    /// Take the next data message out of `rx`, if one is complete.
    ///
    /// Control frames are handled here. A binary frame that fits neither
    /// `rx` nor `buf` starts a skip of its remaining bytes.
    fn next_message(&mut self, buf: &mut [u8]) -> Result<Option<Received>, TransportFault> {
        loop {
            let Some(header) = decode_header(&self.rx[..self.filled])? else {
                return Ok(None);
            };

            if header.opcode == Opcode::Binary
                && (header.frame_len() > self.rx.len() || header.payload_len > buf.len())
            {
                let buffered = header.frame_len().min(self.filled);
                self.consume(buffered);
                self.skip = header.frame_len() - buffered;
                warn!("ws: skipping {} byte image", header.payload_len);
                return Ok(Some(Received {
                    kind: PayloadKind::Oversized,
                    len: header.payload_len,
                }));
            }

            let capacity = self.rx.len();
            let Some(frame) = decode_frame_with_capacity(&mut self.rx[..self.filled], capacity)?
            else {
                return Ok(None);
            };

            let kind = match frame.opcode {
                Opcode::Text => PayloadKind::Text,
                Opcode::Binary => PayloadKind::Binary,
                Opcode::Ping => {
                    self.queue_pong(frame.payload_offset..frame.end())?;
                    self.consume(frame.end());
                    continue;
                }
                Opcode::Close => return Err(TransportFault::Closed),
                Opcode::Pong | Opcode::Continuation => {
                    self.consume(frame.end());
                    continue;
                }
            };

            let payload = frame.payload(&self.rx[..]);
            if payload.len() > buf.len() {
                return Err(TransportFault::Protocol(FrameError::TooLarge));
            }
            buf[..payload.len()].copy_from_slice(payload);
            let received = Received {
                kind,
                len: payload.len(),
            };
            self.consume(frame.end());
            return Ok(Some(received));
        }
    }

    async fn reset(&mut self) {
        self.socket.abort();
        let _ = self.socket.flush().await;
        self.filled = 0;
        self.skip = 0;
        self.pong.clear();
        self.pong_sent = 0;
    }
}

async fn write_all(socket: &mut TcpSocket<'_>, mut data: &[u8]) -> Result<(), TransportFault> {
    while !data.is_empty() {
        let n = socket.write(data).await.map_err(|_| TransportFault::Write)?;
        if n == 0 {
            return Err(TransportFault::Closed);
        }
        data = &data[n..];
    }
    Ok(())
}

impl Transport for WsTransport {
    async fn connect(&mut self, target: &ConnectTarget<'_>) -> Result<(), TransportFault> {
        self.reset().await;
        self.socket.set_timeout(Some(Duration::from_secs(10)));
        match with_timeout(HANDSHAKE_TIMEOUT, self.open(target)).await {
            Ok(result) => result,
            Err(_) => Err(TransportFault::Timeout),
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<(), TransportFault> {
        self.drain_pong().await?;
        let mask = self.mask();
        let len = encode_frame(Opcode::Text, text.as_bytes(), mask, &mut self.tx)?;
        write_all(&mut self.socket, &self.tx[..len]).await
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<Received, TransportFault> {
        loop {
            self.drain_pong().await?;

            if self.skip == 0 {
                if let Some(received) = self.next_message(buf)? {
                    return Ok(received);
                }
            }

            let n = self
                .socket
                .read(&mut self.rx[self.filled..])
                .await
                .map_err(|_| TransportFault::Read)?;
            if n == 0 {
                return Err(TransportFault::Closed);
            }
            if self.skip > 0 {
                // nothing else is buffered while a payload is being skipped
                let dropped = n.min(self.skip);
                self.skip -= dropped;
                self.rx.copy_within(dropped..n, 0);
                self.filled = n - dropped;
            } else {
                self.filled += n;
            }
            debug!("ws: {} bytes buffered", self.filled);
        }
    }

    async fn close(&mut self) {
        self.reset().await;
    }
}
